//! Resolve a declarative [`ModelConfig`] to a model backend.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use crate::config::CredentialContext;
use crate::error::{OgentError, Result};

use super::builtin::builtin_factories;
use super::config::{ModelConfig, ProviderKind};
use super::factory::ModelProviderFactory;
use super::ModelHandle;

/// Table of provider name to factory.
///
/// Built-in providers are registered at construction according to enabled
/// features. Custom providers register under their `customProvider.name`.
#[derive(Clone)]
pub struct ProviderRegistry {
    builtins: HashMap<ProviderKind, Arc<dyn ModelProviderFactory>>,
    custom: HashMap<String, Arc<dyn ModelProviderFactory>>,
    base: CredentialContext,
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ProviderRegistry {
    /// A registry with every compiled-in provider.
    pub fn new() -> Self {
        Self {
            builtins: builtin_factories().into_iter().collect(),
            custom: HashMap::new(),
            base: CredentialContext::new(),
        }
    }

    /// A registry with no providers at all.
    pub fn empty() -> Self {
        Self {
            builtins: HashMap::new(),
            custom: HashMap::new(),
            base: CredentialContext::new(),
        }
    }

    /// Non-secret settings (base URLs, Azure resource) every factory sees.
    ///
    /// The resolved credential is layered on top of this per resolution.
    pub fn with_base_context(mut self, base: CredentialContext) -> Self {
        self.base = base;
        self
    }

    /// Replace or add the factory for a built-in provider.
    pub fn register_builtin(&mut self, kind: ProviderKind, factory: Arc<dyn ModelProviderFactory>) {
        self.builtins.insert(kind, factory);
    }

    /// Register a factory for `customProvider.name == name`.
    pub fn register_custom(&mut self, name: impl Into<String>, factory: Arc<dyn ModelProviderFactory>) {
        self.custom.insert(name.into(), factory);
    }

    /// Resolve `config` with `credential` into a model handle.
    ///
    /// Fails with [`OgentError::UnsupportedProvider`] when the provider is
    /// unknown, or custom without a usable `customProvider`, before anything
    /// else is checked. Fails with [`OgentError::UnconfiguredProvider`] when a
    /// credential is required and `credential` is empty. Neither failure
    /// touches the network.
    pub fn resolve(&self, config: &ModelConfig, credential: &str) -> Result<ModelHandle> {
        let handle = match config.kind() {
            Some(ProviderKind::Custom) => self.resolve_custom(config, credential)?,
            None if config.custom_provider.is_some() => self.resolve_custom(config, credential)?,
            None => return Err(OgentError::UnsupportedProvider(config.provider.clone())),
            Some(kind) => self.resolve_builtin(kind, config, credential)?,
        };

        info!(
            provider = handle.provider_name(),
            model = handle.model_id(),
            "resolved model provider"
        );
        Ok(handle)
    }

    fn resolve_builtin(
        &self,
        kind: ProviderKind,
        config: &ModelConfig,
        credential: &str,
    ) -> Result<ModelHandle> {
        let factory = self.builtins.get(&kind).ok_or_else(|| {
            OgentError::UnsupportedProvider(format!("{kind} (not enabled in this build)"))
        })?;

        let credentials = match kind.credential_key() {
            Some(key) => {
                if credential.trim().is_empty() {
                    return Err(OgentError::UnconfiguredProvider {
                        provider: kind.to_string(),
                    });
                }
                self.base.with(key, credential)
            }
            None => self.base.clone(),
        };

        factory.create(&config.name, &credentials)
    }

    fn resolve_custom(&self, config: &ModelConfig, credential: &str) -> Result<ModelHandle> {
        let custom = config
            .custom_provider
            .as_ref()
            .filter(|custom| !custom.name.trim().is_empty())
            .ok_or_else(|| {
                OgentError::UnsupportedProvider(format!(
                    "{}: customProvider.name is required",
                    config.provider
                ))
            })?;
        if custom.credential_key.trim().is_empty() {
            return Err(OgentError::UnsupportedProvider(format!(
                "{}: customProvider.credentialKey must not be empty",
                custom.name
            )));
        }
        let factory = self.custom.get(&custom.name).ok_or_else(|| {
            OgentError::UnsupportedProvider(format!(
                "custom provider '{}' is not registered",
                custom.name
            ))
        })?;

        if credential.trim().is_empty() {
            return Err(OgentError::UnconfiguredProvider {
                provider: custom.name.clone(),
            });
        }

        let credentials = self.base.with(custom.credential_key.as_str(), credential);
        factory.create(&config.name, &credentials)
    }
}

impl std::fmt::Debug for ProviderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut builtins: Vec<_> = self.builtins.keys().map(|k| k.as_str()).collect();
        builtins.sort_unstable();
        let mut custom: Vec<_> = self.custom.keys().collect();
        custom.sort_unstable();
        f.debug_struct("ProviderRegistry")
            .field("builtins", &builtins)
            .field("custom", &custom)
            .finish()
    }
}
