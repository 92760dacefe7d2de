//! Model slots an agent can stream from.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::LlmProvider;

/// Which configured model a call should use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelType {
    #[default]
    Core,
    Editor,
    Reasoner,
    Router,
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ModelType::Core => "core",
            ModelType::Editor => "editor",
            ModelType::Reasoner => "reasoner",
            ModelType::Router => "router",
        };
        f.write_str(s)
    }
}

/// Providers keyed by [`ModelType`]. Unset slots fall back to core.
#[derive(Clone)]
pub struct LanguageModels {
    core: Arc<dyn LlmProvider>,
    overrides: HashMap<ModelType, Arc<dyn LlmProvider>>,
}

impl LanguageModels {
    pub fn new(core: Arc<dyn LlmProvider>) -> Self {
        Self {
            core,
            overrides: HashMap::new(),
        }
    }

    /// Assign a provider to a slot.
    pub fn with(mut self, model_type: ModelType, provider: Arc<dyn LlmProvider>) -> Self {
        if model_type == ModelType::Core {
            self.core = provider;
        } else {
            self.overrides.insert(model_type, provider);
        }
        self
    }

    pub fn get(&self, model_type: ModelType) -> Arc<dyn LlmProvider> {
        self.overrides
            .get(&model_type)
            .cloned()
            .unwrap_or_else(|| Arc::clone(&self.core))
    }

    pub fn core(&self) -> Arc<dyn LlmProvider> {
        Arc::clone(&self.core)
    }
}

impl fmt::Debug for LanguageModels {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        map.entry(&ModelType::Core, &self.core.model_id());
        for (k, v) in &self.overrides {
            map.entry(k, &v.model_id());
        }
        map.finish()
    }
}
