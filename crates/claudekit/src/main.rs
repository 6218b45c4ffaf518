//! Send a completion request to the Messages API and print the response.
//!
//! Reads the API key from the `ANTHROPIC_API_KEY` environment variable (or a
//! config file passed with `--config`).
//!
//! # Examples
//!
//! ```sh
//! # Basic request
//! claudekit --user "What is the capital of France?"
//!
//! # With system prompt and model selection
//! claudekit --system "You are a helpful assistant." \
//!   --user "Explain exponential backoff in one paragraph." \
//!   --model claude-3-haiku-20240307
//!
//! # Pipe content from stdin
//! cat notes.md | claudekit --system "Summarize these notes." --stdin
//!
//! # Tool round trip with the built-in demo tools
//! claudekit --user "What's the weather in Tokyo, and what is 1.5 + 2.5?" --demo-tools
//! ```

use std::io::{self, Read};
use std::process;

use clap::Parser;
use claudekit::api::{Client, RetryConfig};
use claudekit::config::{ClientConfig, check_temperature};
use claudekit::conversation::Conversation;
use claudekit::tools::{LocalFn, Param, ToolArgs, ToolRunner, tool};
use claudekit::{CompletionResponse, Error};
use serde_json::json;
use tracing_subscriber::EnvFilter;

/// Send a completion request to the Messages API and print the response.
///
/// Reads the API key from the ANTHROPIC_API_KEY environment variable.
#[derive(Parser)]
#[command(name = "claudekit", version)]
struct Cli {
    // ── Message content ────────────────────────────────────────
    /// System prompt to set the assistant's behavior
    #[arg(long)]
    system: Option<String>,

    /// User message to send
    #[arg(long)]
    user: Option<String>,

    /// Read user content from stdin
    #[arg(long)]
    stdin: bool,

    // ── Request parameters ─────────────────────────────────────
    /// Model to use (default from config, else claude-3-sonnet-20240229)
    #[arg(long)]
    model: Option<String>,

    /// Maximum tokens in the response
    #[arg(long)]
    max_tokens: Option<u32>,

    /// Sampling temperature (0.0 to 1.0)
    #[arg(long)]
    temperature: Option<f32>,

    /// Maximum retries on rate limits, server and connection errors
    #[arg(long)]
    max_retries: Option<u32>,

    /// Path to a JSON client config file
    #[arg(long)]
    config: Option<String>,

    // ── Tool use ───────────────────────────────────────────────
    /// Register the demo tools (get_weather, calculate_sum) and run tool calls
    #[arg(long)]
    demo_tools: bool,

    /// Maximum completions in a tool round trip
    #[arg(long, default_value_t = 5)]
    max_rounds: u32,

    // ── Output ─────────────────────────────────────────────────
    /// Print the full API JSON response
    #[arg(long)]
    raw: bool,

    /// Enable debug logging on stderr
    #[arg(short, long)]
    verbose: bool,
}

// ── Helpers ────────────────────────────────────────────────────────

fn read_stdin_content() -> Result<String, Error> {
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(buf)
}

fn build_user_content(cli: &Cli) -> Result<String, Error> {
    let stdin_text = if cli.stdin {
        Some(read_stdin_content()?)
    } else {
        None
    };

    match (&cli.user, stdin_text) {
        (Some(msg), Some(piped)) => Ok(format!("{msg}\n\n{piped}")),
        (Some(msg), None) => Ok(msg.clone()),
        (None, Some(piped)) => Ok(piped),
        (None, None) => Err(Error::Config("provide --user, --stdin, or both".to_string())),
    }
}

fn build_config(cli: &Cli) -> Result<ClientConfig, Error> {
    let mut config = match &cli.config {
        Some(path) => ClientConfig::load(path)?,
        None => ClientConfig::from_env(),
    };
    if let Some(model) = &cli.model {
        config = config.with_model(model.clone());
    }
    if let Some(max_tokens) = cli.max_tokens {
        config = config.with_max_tokens(max_tokens);
    }
    if let Some(temperature) = cli.temperature {
        config = config.with_temperature(check_temperature(temperature)?);
    }
    if let Some(retries) = cli.max_retries {
        let retry = RetryConfig {
            max_retries: retries,
            ..config.retry.clone()
        };
        config = config.with_retry(retry);
    }
    Ok(config)
}

/// The demo tools: a canned weather lookup and a number summer.
fn demo_tools() -> Result<ToolRunner, Error> {
    let weather = LocalFn::new("get_weather", |args: ToolArgs| async move {
        let city: String = args.get("city")?;
        let units: String = args.get("units")?;
        let temperature = if units == "celsius" { 22 } else { 72 };
        Ok(json!({
            "city": city,
            "temperature": temperature,
            "units": units,
            "condition": "sunny",
        }))
    })
    .param(Param::new("city").typed("str"))
    .param(Param::new("units").typed("str").default("celsius"))
    .doc("Get the current weather for a city.");

    let sum = LocalFn::new("calculate_sum", |args: ToolArgs| async move {
        let numbers: Vec<f64> = args.get("numbers")?;
        Ok(numbers.iter().sum::<f64>())
    })
    .param(Param::new("numbers").typed("list"))
    .doc("Add up a list of numbers.");

    ToolRunner::new()
        .with_arg_validation(true)
        .with(tool().declare(weather))?
        .with(tool().declare(sum))
}

fn render(cli: &Cli, response: &CompletionResponse) -> Result<String, Error> {
    if cli.raw
        && let Some(raw) = &response.raw
    {
        return Ok(serde_json::to_string_pretty(raw)?);
    }
    Ok(response.content.clone())
}

async fn send_request(cli: &Cli) -> Result<String, Error> {
    let user_content = build_user_content(cli)?;
    let client = Client::from_config(build_config(cli)?)?;

    let mut conversation = Conversation::new();
    if let Some(sys) = &cli.system {
        conversation = conversation.with_system(sys.clone());
    }
    conversation.add_user(user_content);

    let response = if cli.demo_tools {
        let runner = demo_tools()?;
        eprintln!("  Registered {} demo tool(s)", runner.len());
        client
            .run_with_tools(&mut conversation, &runner, cli.max_rounds)
            .await?
    } else {
        client.complete_conversation(&conversation, None).await?
    };

    eprintln!(
        "  [usage] input={} output={} total={}",
        response.usage.input_tokens,
        response.usage.output_tokens,
        response.usage.total_tokens()
    );
    render(cli, &response)
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(io::stderr)
        .init();

    match send_request(&cli).await {
        Ok(response) => println!("{response}"),
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(1);
        }
    }
}
