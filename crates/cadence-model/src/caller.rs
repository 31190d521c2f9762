use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ModelError;
use crate::types::ModelRequest;

/// Sends one request to a language model and returns the generated text.
///
/// Implementations must be thread-safe; a single caller is shared by the
/// prompt queue and the immediate dispatch path.
#[async_trait]
pub trait ModelCaller: Send + Sync {
  async fn call(&self, request: ModelRequest) -> Result<String, ModelError>;
}

#[async_trait]
impl<T: ModelCaller + ?Sized> ModelCaller for Arc<T> {
  async fn call(&self, request: ModelRequest) -> Result<String, ModelError> {
    (**self).call(request).await
  }
}
