use serde::{Deserialize, Serialize};

use crate::language::LanguageDirection;

/// Server-side model profile to run the session against (e.g. "standard", "premium").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelProfile(String);

impl ModelProfile {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl Default for ModelProfile {
    fn default() -> Self {
        Self("standard".to_string())
    }
}

/// Configuration for one translation session
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionSettings {
    /// Source/target language pair
    pub direction: LanguageDirection,

    /// Model profile requested from the control plane
    pub model: ModelProfile,

    /// Whether the server may hand the session to the on-device fallback
    pub offline_fallback: bool,
}
