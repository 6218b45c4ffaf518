//! API interaction layer: retry, the provider seam, HTTP transport, and the client.
//!
//! - [`retry`]: failure classification and exponential backoff with jitter.
//!   Only rate limits, server errors and connection failures are retried.
//! - [`provider`]: the [`CompletionProvider`] trait a backend implements.
//! - [`http`]: [`MessagesClient`], the reqwest-based provider.
//! - [`client`]: [`Client`], which fills request defaults and wraps every
//!   provider call in the retry executor.

pub mod client;
pub mod http;
pub mod provider;
pub mod retry;

pub use client::Client;
pub use http::MessagesClient;
pub use provider::{CompletionProvider, ProviderFuture};
pub use retry::{Classify, FailureKind, RetryConfig, RetryError, retry_with_backoff};
