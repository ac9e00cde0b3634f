//! Extension point for constructing model backends by name.

use crate::config::CredentialContext;
use crate::error::Result;

use super::ModelHandle;

/// Builds a model backend for a model name.
///
/// Factories read their credential from `credentials` under the key the
/// resolver was told to use; they never consult the process environment.
pub trait ModelProviderFactory: Send + Sync {
    fn create(&self, model: &str, credentials: &CredentialContext) -> Result<ModelHandle>;
}

impl<F> ModelProviderFactory for F
where
    F: Fn(&str, &CredentialContext) -> Result<ModelHandle> + Send + Sync,
{
    fn create(&self, model: &str, credentials: &CredentialContext) -> Result<ModelHandle> {
        self(model, credentials)
    }
}
