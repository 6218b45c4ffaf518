//! Retrying client over any [`CompletionProvider`].

use tracing::{debug, info, warn};

use super::http::MessagesClient;
use super::provider::CompletionProvider;
use super::retry::retry_with_backoff;
use crate::config::ClientConfig;
use crate::conversation::Conversation;
use crate::error::Result;
use crate::tools::ToolRunner;
use crate::{CompletionRequest, CompletionResponse, Message};

/// Fills request defaults from a [`ClientConfig`] and sends every request
/// through [`retry_with_backoff`] with `config.retry`.
pub struct Client<P = MessagesClient> {
    provider: P,
    config: ClientConfig,
}

impl Client<MessagesClient> {
    /// HTTP client for the given config.
    pub fn from_config(config: ClientConfig) -> Result<Self> {
        let provider = MessagesClient::new(&config)?;
        Ok(Self { provider, config })
    }

    /// HTTP client configured from `ANTHROPIC_API_KEY` / `ANTHROPIC_BASE_URL`.
    pub fn from_env() -> Result<Self> {
        Self::from_config(ClientConfig::from_env())
    }
}

impl<P: CompletionProvider> Client<P> {
    pub fn new(provider: P, config: ClientConfig) -> Self {
        Self { provider, config }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// A request for `messages` with model, max_tokens and temperature taken
    /// from the config.
    pub fn request(&self, messages: Vec<Message>) -> CompletionRequest {
        CompletionRequest::new(messages)
            .with_model(self.config.model.clone())
            .with_max_tokens(self.config.max_tokens)
            .with_temperature(self.config.temperature)
    }

    /// Send one completion request, retrying transient failures.
    ///
    /// Empty `model`, zero `max_tokens` and unset `temperature` are filled in
    /// from the config before the first attempt.
    pub async fn complete(&self, mut request: CompletionRequest) -> Result<CompletionResponse> {
        if request.model.is_empty() {
            request.model = self.config.model.clone();
        }
        if request.max_tokens == 0 {
            request.max_tokens = self.config.max_tokens;
        }
        if request.temperature.is_none() {
            request.temperature = Some(self.config.temperature);
        }

        debug!(
            "Completion via {}: model={}, messages={}, tools={}",
            self.provider.name(),
            request.model,
            request.messages.len(),
            request.tools.len(),
        );

        let request = &request;
        let response =
            retry_with_backoff(&self.config.retry, || self.provider.complete(request)).await?;
        Ok(response)
    }

    /// Complete the conversation's current window with its system prompt.
    pub async fn complete_conversation(
        &self,
        conversation: &Conversation,
        runner: Option<&ToolRunner>,
    ) -> Result<CompletionResponse> {
        let mut request = self.request(conversation.messages().to_vec());
        if let Some(system) = conversation.system() {
            request = request.with_system(system);
        }
        if let Some(runner) = runner {
            request = request.with_tools(runner.definitions());
        }
        self.complete(request).await
    }

    /// Drive a tool loop: complete, run any requested tools, feed the
    /// results back, and repeat until the model answers without tool calls
    /// or `max_rounds` completions have been made.
    ///
    /// Every assistant turn and tool-result turn is appended to
    /// `conversation`. Returns the last response.
    pub async fn run_with_tools(
        &self,
        conversation: &mut Conversation,
        runner: &ToolRunner,
        max_rounds: u32,
    ) -> Result<CompletionResponse> {
        let max_rounds = max_rounds.max(1);
        let mut round = 0;
        loop {
            round += 1;
            let response = self.complete_conversation(conversation, Some(runner)).await?;
            conversation.add_response(&response);

            if !response.has_tool_calls() {
                info!("Finished after {round} round(s)");
                return Ok(response);
            }

            let results = runner.execute_all(&response.tool_calls).await;
            conversation.add_tool_results(&results);

            if round >= max_rounds {
                warn!(
                    "Stopping after {round} round(s) with {} tool call(s) still pending a reply",
                    response.tool_calls.len()
                );
                return Ok(response);
            }
        }
    }
}
