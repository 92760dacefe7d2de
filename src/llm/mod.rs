//! LLM integration for turnloop.
//!
//! Supports:
//! - **OpenAI-compatible**: streaming `/chat/completions` over reqwest
//! - **Scripted**: replayed responses for tests and offline use
//!
//! Agents never talk to a provider directly; they pick a [`ModelType`] and
//! [`LanguageModels`] resolves it to a provider.

pub mod models;
pub mod openai_compat;
pub mod provider;
pub mod scripted;

pub use models::{LanguageModels, ModelType};
pub use openai_compat::OpenAiCompatProvider;
pub use provider::*;
pub use scripted::{ScriptStep, ScriptedProvider};

use std::sync::Arc;

use crate::config::{ModelConfig, SearchConfig};

/// Create a provider for one model of the configured endpoint.
pub fn create_provider(config: &ModelConfig, model: &str) -> Arc<dyn LlmProvider> {
    Arc::new(OpenAiCompatProvider::new(
        "openai",
        config.base_url.clone(),
        config.api_key.clone(),
        model,
        config.max_tokens,
    ))
}

/// Build every model slot from configuration.
pub fn language_models(config: &ModelConfig) -> LanguageModels {
    let mut models = LanguageModels::new(create_provider(config, &config.core_model));
    let slots = [
        (ModelType::Editor, &config.editor_model),
        (ModelType::Reasoner, &config.reasoner_model),
        (ModelType::Router, &config.router_model),
    ];
    for (model_type, model) in slots {
        if let Some(model) = model {
            models = models.with(model_type, create_provider(config, model));
        }
    }
    tracing::info!("Using OpenAI-compatible endpoint {} ({:?})", config.base_url, models);
    models
}

/// Create the web search provider.
pub fn create_search_provider(config: &SearchConfig) -> Arc<dyn LlmProvider> {
    tracing::info!("Web search enabled (model: {})", config.model);
    Arc::new(OpenAiCompatProvider::new(
        "perplexity",
        config.base_url.clone(),
        config.api_key.clone(),
        config.model.clone(),
        crate::config::DEFAULT_MAX_TOKENS,
    ))
}
