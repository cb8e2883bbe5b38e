//! The HTTP transport seam.

use async_trait::async_trait;

use crate::error::Result;
use crate::request::HttpRequest;
use crate::response::HttpResponse;

/// Executes one HTTP request and returns the raw response.
///
/// Implementations must not interpret non-2xx statuses: classifying a
/// response belongs to the caller, which knows the status it expects.
/// An `Err` means no usable response was obtained (connection failure,
/// timeout, exhausted retries).
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        (**self).send(request).await
    }
}
