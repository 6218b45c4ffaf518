//! The seam between [`Client`](super::Client) and a completion backend.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use crate::error::ApiError;
use crate::{CompletionRequest, CompletionResponse};

/// Boxed future returned by [`CompletionProvider::complete`].
pub type ProviderFuture<'a> =
    Pin<Box<dyn Future<Output = Result<CompletionResponse, ApiError>> + Send + 'a>>;

/// A backend that turns one request into one normalized completion.
///
/// Implementations perform a single attempt; retries are layered on top by
/// [`Client`](super::Client). Failures must be reported as a classified
/// [`ApiError`] so the retry policy can tell transient from fatal.
pub trait CompletionProvider: Send + Sync {
    fn complete<'a>(&'a self, request: &'a CompletionRequest) -> ProviderFuture<'a>;

    /// Short label used in log lines.
    fn name(&self) -> &str {
        "provider"
    }
}

impl<P: CompletionProvider + ?Sized> CompletionProvider for Box<P> {
    fn complete<'a>(&'a self, request: &'a CompletionRequest) -> ProviderFuture<'a> {
        (**self).complete(request)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

impl<P: CompletionProvider + ?Sized> CompletionProvider for Arc<P> {
    fn complete<'a>(&'a self, request: &'a CompletionRequest) -> ProviderFuture<'a> {
        (**self).complete(request)
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}
