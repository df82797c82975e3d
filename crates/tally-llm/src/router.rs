//! Router - model-id based provider routing
//!
//! Model identifiers are opaque, provider-namespaced strings: `gemini/`
//! and `groq/` prefixed for those providers, `claude-*` for Anthropic,
//! everything else OpenAI. The router resolves the identifier to a
//! configured provider and strips the namespace before the wire call;
//! accounting always sees the full identifier.

use crate::anthropic::{AnthropicConfig, AnthropicProvider};
use crate::completion::{CompletionRequest, CompletionResponse};
use crate::error::{Error, Result};
use crate::gemini::{GeminiConfig, GeminiProvider};
use crate::groq::{GroqConfig, GroqProvider};
use crate::openai::{OpenAiConfig, OpenAiProvider};
use crate::provider::LlmProvider;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument};

/// Configuration for a single provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Whether the provider is enabled
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// API key; falls back to the provider's environment variable
    #[serde(default)]
    pub api_key: Option<String>,
    /// Base URL override
    #[serde(default)]
    pub base_url: Option<String>,
    /// Request timeout in seconds
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

fn default_enabled() -> bool {
    true
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_key: None,
            base_url: None,
            timeout_secs: None,
        }
    }
}

impl ProviderConfig {
    fn resolve_key(&self, env_var: &str) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var(env_var).ok())
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs.unwrap_or(60))
    }
}

/// Configuration for all providers
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RouterConfig {
    /// OpenAI settings
    #[serde(default)]
    pub openai: ProviderConfig,
    /// Anthropic settings
    #[serde(default)]
    pub anthropic: ProviderConfig,
    /// Gemini settings
    #[serde(default)]
    pub gemini: ProviderConfig,
    /// Groq settings
    #[serde(default)]
    pub groq: ProviderConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProviderKind {
    OpenAi,
    Anthropic,
    Gemini,
    Groq,
}

impl ProviderKind {
    fn name(self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
            Self::Gemini => "gemini",
            Self::Groq => "groq",
        }
    }
}

/// Resolve a model identifier to a provider and the model name sent on
/// the wire.
fn route_model(model: &str) -> (ProviderKind, &str) {
    if let Some(rest) = model.strip_prefix("gemini/") {
        (ProviderKind::Gemini, rest)
    } else if let Some(rest) = model.strip_prefix("groq/") {
        (ProviderKind::Groq, rest)
    } else if model.starts_with("claude") {
        (ProviderKind::Anthropic, model)
    } else {
        (ProviderKind::OpenAi, model)
    }
}

/// Routes completion requests to the provider named by the model id
#[derive(Default)]
pub struct LlmRouter {
    openai: Option<Arc<dyn LlmProvider>>,
    anthropic: Option<Arc<dyn LlmProvider>>,
    gemini: Option<Arc<dyn LlmProvider>>,
    groq: Option<Arc<dyn LlmProvider>>,
}

impl LlmRouter {
    /// Create an empty router with no providers
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the OpenAI provider
    #[must_use]
    pub fn with_openai(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.openai = Some(provider);
        self
    }

    /// Set the Anthropic provider
    #[must_use]
    pub fn with_anthropic(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.anthropic = Some(provider);
        self
    }

    /// Set the Gemini provider
    #[must_use]
    pub fn with_gemini(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.gemini = Some(provider);
        self
    }

    /// Set the Groq provider
    #[must_use]
    pub fn with_groq(mut self, provider: Arc<dyn LlmProvider>) -> Self {
        self.groq = Some(provider);
        self
    }

    /// Build a router from configuration. Providers without a usable API
    /// key are left unconfigured; calls routed to them fail with
    /// `NotConfigured`.
    pub fn from_config(config: &RouterConfig) -> Result<Self> {
        let mut router = Self::new();

        if config.openai.enabled {
            if let Some(api_key) = config.openai.resolve_key("OPENAI_API_KEY") {
                let mut provider_config =
                    OpenAiConfig::new(api_key).with_timeout(config.openai.timeout());
                if let Some(url) = &config.openai.base_url {
                    provider_config = provider_config.with_base_url(url);
                }
                router = router.with_openai(Arc::new(OpenAiProvider::new(provider_config)?));
            } else {
                debug!("OpenAI provider not configured (no API key)");
            }
        }

        if config.anthropic.enabled {
            if let Some(api_key) = config.anthropic.resolve_key("ANTHROPIC_API_KEY") {
                let mut provider_config =
                    AnthropicConfig::new(api_key).with_timeout(config.anthropic.timeout());
                if let Some(url) = &config.anthropic.base_url {
                    provider_config = provider_config.with_base_url(url);
                }
                router = router.with_anthropic(Arc::new(AnthropicProvider::new(provider_config)?));
            } else {
                debug!("Anthropic provider not configured (no API key)");
            }
        }

        if config.gemini.enabled {
            if let Some(api_key) = config.gemini.resolve_key("GOOGLE_API_KEY") {
                let mut provider_config =
                    GeminiConfig::new(api_key).with_timeout(config.gemini.timeout());
                if let Some(url) = &config.gemini.base_url {
                    provider_config = provider_config.with_base_url(url);
                }
                router = router.with_gemini(Arc::new(GeminiProvider::new(provider_config)?));
            } else {
                debug!("Gemini provider not configured (no API key)");
            }
        }

        if config.groq.enabled {
            if let Some(api_key) = config.groq.resolve_key("GROQ_API_KEY") {
                let mut provider_config =
                    GroqConfig::new(api_key).with_timeout(config.groq.timeout());
                if let Some(url) = &config.groq.base_url {
                    provider_config = provider_config.with_base_url(url);
                }
                router = router.with_groq(Arc::new(GroqProvider::new(provider_config)?));
            } else {
                debug!("Groq provider not configured (no API key)");
            }
        }

        Ok(router)
    }

    /// Names of the providers that are configured
    #[must_use]
    pub fn configured(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.openai.is_some() {
            names.push("openai");
        }
        if self.anthropic.is_some() {
            names.push("anthropic");
        }
        if self.gemini.is_some() {
            names.push("gemini");
        }
        if self.groq.is_some() {
            names.push("groq");
        }
        names
    }

    fn provider_for(&self, kind: ProviderKind) -> Option<&Arc<dyn LlmProvider>> {
        match kind {
            ProviderKind::OpenAi => self.openai.as_ref(),
            ProviderKind::Anthropic => self.anthropic.as_ref(),
            ProviderKind::Gemini => self.gemini.as_ref(),
            ProviderKind::Groq => self.groq.as_ref(),
        }
    }
}

#[async_trait::async_trait]
impl LlmProvider for LlmRouter {
    fn name(&self) -> &str {
        "router"
    }

    #[instrument(skip(self, request), fields(model = %request.model))]
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let (kind, effective_model) = route_model(&request.model);
        let effective_model = effective_model.to_string();

        let provider = self.provider_for(kind).ok_or_else(|| {
            Error::NotConfigured(format!(
                "no {} provider configured for model '{}'",
                kind.name(),
                request.model
            ))
        })?;

        debug!(provider = provider.name(), "Routing completion request");
        provider.complete(request.with_model(effective_model)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Message;

    /// Echoes the wire model name back, for routing assertions
    struct EchoProvider {
        name: &'static str,
    }

    #[async_trait::async_trait]
    impl LlmProvider for EchoProvider {
        fn name(&self) -> &str {
            self.name
        }

        async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
            Ok(CompletionResponse {
                content: format!("{}:{}", self.name, request.model),
                usage: None,
                finish_reason: None,
                model: request.model,
            })
        }
    }

    fn echo_router() -> LlmRouter {
        LlmRouter::new()
            .with_openai(Arc::new(EchoProvider { name: "openai" }))
            .with_anthropic(Arc::new(EchoProvider { name: "anthropic" }))
            .with_gemini(Arc::new(EchoProvider { name: "gemini" }))
            .with_groq(Arc::new(EchoProvider { name: "groq" }))
    }

    #[test]
    fn test_route_model() {
        assert_eq!(
            route_model("gemini/gemini-1.5-flash"),
            (ProviderKind::Gemini, "gemini-1.5-flash")
        );
        assert_eq!(
            route_model("groq/llama-3.1-8b-instant"),
            (ProviderKind::Groq, "llama-3.1-8b-instant")
        );
        assert_eq!(
            route_model("claude-3-5-sonnet-20241022"),
            (ProviderKind::Anthropic, "claude-3-5-sonnet-20241022")
        );
        assert_eq!(route_model("gpt-4o"), (ProviderKind::OpenAi, "gpt-4o"));
        assert_eq!(
            route_model("some-unknown-model"),
            (ProviderKind::OpenAi, "some-unknown-model")
        );
    }

    #[tokio::test]
    async fn test_router_strips_namespace_prefix() {
        let router = echo_router();
        let response = router
            .complete(
                CompletionRequest::new("gemini/gemini-1.5-flash")
                    .with_message(Message::user("hi")),
            )
            .await
            .unwrap();
        assert_eq!(response.content, "gemini:gemini-1.5-flash");
    }

    #[tokio::test]
    async fn test_router_keeps_bare_model_names() {
        let router = echo_router();
        let response = router
            .complete(CompletionRequest::new("claude-3-opus-20240229"))
            .await
            .unwrap();
        assert_eq!(response.content, "anthropic:claude-3-opus-20240229");

        let response = router
            .complete(CompletionRequest::new("gpt-4o-mini"))
            .await
            .unwrap();
        assert_eq!(response.content, "openai:gpt-4o-mini");
    }

    #[tokio::test]
    async fn test_unconfigured_provider_errors() {
        let router = LlmRouter::new();
        let err = router
            .complete(CompletionRequest::new("gpt-4o"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotConfigured(_)));
        assert!(err.to_string().contains("openai"));
    }

    #[test]
    fn test_configured_lists_present_providers() {
        let router = LlmRouter::new().with_groq(Arc::new(EchoProvider { name: "groq" }));
        assert_eq!(router.configured(), vec!["groq"]);
    }
}
