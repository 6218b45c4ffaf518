//! Tool use: declare local functions as tools and answer the model's tool calls.
//!
//! Demonstrates:
//! - Named parameters with defaults via `LocalFn::new` + `Param`
//! - A typed argument struct via `LocalFn::typed`
//! - One manual tool round trip with `ToolRunner::execute_all`
//!
//! # Usage
//!
//! ```bash
//! ANTHROPIC_API_KEY=sk-... cargo run --example tools
//! ```

use claudekit::prelude::*;
use claudekit::schemars::{self, JsonSchema};
use serde::Deserialize;
use serde_json::json;

// ── Tool constructors ───────────────────────────────────────────────

/// Simulated weather lookup.
fn get_weather() -> FnTool {
    let func = LocalFn::new("get_weather", |args: ToolArgs| async move {
        let city: String = args.get("city")?;
        let units: String = args.get("units")?;
        let temperature = if units == "celsius" { 22 } else { 72 };
        Ok(json!({
            "city": city,
            "temperature": temperature,
            "units": units,
            "condition": "partly cloudy",
        }))
    })
    .param(Param::new("city").typed("str"))
    .param(Param::new("units").typed("str").default("celsius"));

    tool()
        .description("Get the current weather for a city")
        .declare(func)
}

/// Arguments for `calculate_sum`.
#[derive(Deserialize, JsonSchema)]
struct SumArgs {
    /// Numbers to add up.
    numbers: Vec<f64>,
}

fn calculate_sum() -> FnTool {
    let func = LocalFn::typed("calculate_sum", |args: SumArgs| async move {
        let total: f64 = args.numbers.iter().sum();
        Ok(json!({"numbers": args.numbers, "sum": total}))
    });
    tool()
        .description("Calculate the sum of a list of numbers")
        .declare(func)
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    let client = Client::from_env()?;

    let runner = ToolRunner::new()
        .with(get_weather())?
        .with(calculate_sum())?;

    let mut conv = Conversation::new().with_system("Use tools when needed.");
    conv.add_user("What is the weather in Tokyo?");

    let response = client.complete_conversation(&conv, Some(&runner)).await?;

    if response.has_tool_calls() {
        let names: Vec<_> = response.tool_calls.iter().map(|c| c.name.as_str()).collect();
        println!("Tool calls: {names:?}");
        let results = runner.execute_all(&response.tool_calls).await;
        for r in &results {
            println!("  {}", r.content);
        }

        // Send tool results back.
        conv.add_response(&response).add_tool_results(&results);
        let last = client.complete_conversation(&conv, Some(&runner)).await?;
        println!("{}", last.content);
    } else {
        println!("{}", response.content);
    }
    Ok(())
}
