//! Built-in provider factories, registered at compile time per feature.

use std::sync::Arc;

use crate::config::CredentialContext;
use crate::error::{OgentError, Result};

use super::chat_completions::ChatCompletionsProvider;
use super::config::ProviderKind;
use super::factory::ModelProviderFactory;
use super::http::Auth;
use super::ModelHandle;

pub(crate) const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub(crate) const GOOGLE_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai";
pub(crate) const ANTHROPIC_BASE_URL: &str = "https://api.anthropic.com/v1";
pub(crate) const ANTHROPIC_VERSION: &str = "2023-06-01";
pub(crate) const AZURE_API_VERSION: &str = "2024-10-21";
pub(crate) const OLLAMA_BASE_URL: &str = "http://localhost:11434/v1";

/// The compile-time provider table.
pub(crate) fn builtin_factories() -> Vec<(ProviderKind, Arc<dyn ModelProviderFactory>)> {
    let mut table: Vec<(ProviderKind, Arc<dyn ModelProviderFactory>)> = Vec::new();
    #[cfg(feature = "openai")]
    table.push((ProviderKind::OpenAi, Arc::new(openai)));
    #[cfg(feature = "google")]
    table.push((ProviderKind::Google, Arc::new(google)));
    #[cfg(feature = "anthropic")]
    table.push((ProviderKind::Anthropic, Arc::new(anthropic)));
    #[cfg(feature = "azure")]
    table.push((ProviderKind::Azure, Arc::new(azure)));
    #[cfg(feature = "ollama")]
    table.push((ProviderKind::Ollama, Arc::new(ollama)));
    table
}

fn credential(kind: ProviderKind, ctx: &CredentialContext) -> Result<String> {
    kind.credential_key()
        .and_then(|key| ctx.get(key))
        .map(str::to_string)
        .ok_or_else(|| OgentError::UnconfiguredProvider {
            provider: kind.to_string(),
        })
}

#[cfg(feature = "openai")]
fn openai(model: &str, ctx: &CredentialContext) -> Result<ModelHandle> {
    let key = credential(ProviderKind::OpenAi, ctx)?;
    let base = ctx.get("OPENAI_BASE_URL").unwrap_or(OPENAI_BASE_URL);
    Ok(Arc::new(ChatCompletionsProvider::new(
        "openai",
        model,
        base,
        Auth::Bearer(key),
    )))
}

#[cfg(feature = "google")]
fn google(model: &str, ctx: &CredentialContext) -> Result<ModelHandle> {
    let key = credential(ProviderKind::Google, ctx)?;
    let base = ctx.get("GOOGLE_BASE_URL").unwrap_or(GOOGLE_BASE_URL);
    Ok(Arc::new(ChatCompletionsProvider::new(
        "google",
        model,
        base,
        Auth::Bearer(key),
    )))
}

#[cfg(feature = "anthropic")]
fn anthropic(model: &str, ctx: &CredentialContext) -> Result<ModelHandle> {
    let key = credential(ProviderKind::Anthropic, ctx)?;
    let base = ctx.get("ANTHROPIC_BASE_URL").unwrap_or(ANTHROPIC_BASE_URL);
    let provider = ChatCompletionsProvider::new(
        "anthropic",
        model,
        base,
        Auth::Header {
            name: "x-api-key",
            value: key,
        },
    )
    .with_header("anthropic-version", ANTHROPIC_VERSION);
    Ok(Arc::new(provider))
}

/// Azure routes by deployment; the model name is the deployment name.
#[cfg(feature = "azure")]
fn azure(model: &str, ctx: &CredentialContext) -> Result<ModelHandle> {
    let key = credential(ProviderKind::Azure, ctx)?;
    let root = match (ctx.get("AZURE_BASE_URL"), ctx.get("AZURE_RESOURCE_NAME")) {
        (Some(base), _) => base.trim_end_matches('/').to_string(),
        (None, Some(resource)) => format!("https://{resource}.openai.azure.com/openai"),
        (None, None) => {
            return Err(OgentError::Configuration(
                "azure requires AZURE_RESOURCE_NAME or AZURE_BASE_URL".into(),
            ))
        }
    };
    let provider = ChatCompletionsProvider::new(
        "azure",
        model,
        &format!("{root}/deployments/{model}"),
        Auth::Header {
            name: "api-key",
            value: key,
        },
    )
    .with_query("api-version", AZURE_API_VERSION);
    Ok(Arc::new(provider))
}

#[cfg(feature = "ollama")]
fn ollama(model: &str, ctx: &CredentialContext) -> Result<ModelHandle> {
    let base = ctx
        .get("OLLAMA_BASE_URL")
        .map(|url| {
            let url = url.trim_end_matches('/');
            if url.ends_with("/v1") {
                url.to_string()
            } else {
                format!("{url}/v1")
            }
        })
        .unwrap_or_else(|| OLLAMA_BASE_URL.to_string());
    Ok(Arc::new(ChatCompletionsProvider::new(
        "ollama",
        model,
        &base,
        Auth::None,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_has_every_enabled_builtin() {
        let kinds: Vec<_> = builtin_factories().into_iter().map(|(k, _)| k).collect();
        #[cfg(feature = "openai")]
        assert!(kinds.contains(&ProviderKind::OpenAi));
        #[cfg(feature = "ollama")]
        assert!(kinds.contains(&ProviderKind::Ollama));
        assert!(!kinds.contains(&ProviderKind::Custom));
    }

    #[cfg(feature = "azure")]
    #[test]
    fn azure_needs_a_resource() {
        let ctx = CredentialContext::new().with("AZURE_API_KEY", "k");
        assert!(matches!(azure("gpt-4o", &ctx), Err(OgentError::Configuration(_))));

        let ctx = ctx.with("AZURE_RESOURCE_NAME", "acme");
        let handle = azure("gpt-4o", &ctx).unwrap();
        assert_eq!(handle.provider_name(), "azure");
        assert_eq!(handle.model_id(), "gpt-4o");
    }

    #[cfg(feature = "ollama")]
    #[test]
    fn ollama_needs_no_credential() {
        let handle = ollama("llama3.2", &CredentialContext::new()).unwrap();
        assert_eq!(handle.provider_name(), "ollama");
    }

    #[cfg(feature = "openai")]
    #[test]
    fn missing_credential_is_unconfigured() {
        let err = openai("gpt-4o", &CredentialContext::new()).err().unwrap();
        assert!(matches!(err, OgentError::UnconfiguredProvider { ref provider } if provider == "openai"));
    }
}
