use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

/// A translation language, identified by its BCP-47-style code (e.g. "en", "ja").
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Language(String);

impl Language {
    pub fn new(code: impl Into<String>) -> Self {
        Self(code.into())
    }

    pub fn code(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Source/target language pair for a translation session.
///
/// `source == None` means the server auto-detects the spoken language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageDirection {
    pub source: Option<Language>,
    pub target: Language,
}

impl LanguageDirection {
    /// Create a direction. Rejects identical source and target.
    pub fn new(source: Option<Language>, target: Language) -> Result<Self> {
        if let Some(src) = &source {
            if *src == target {
                bail!("source and target language must differ: {}", src);
            }
        }
        Ok(Self { source, target })
    }

    /// Auto-detect source, fixed target.
    pub fn auto(target: Language) -> Self {
        Self {
            source: None,
            target,
        }
    }

    /// Stable identifier, usable as a map/history key ("auto-en", "ja-en").
    pub fn id(&self) -> String {
        let source = self.source.as_ref().map(Language::code).unwrap_or("auto");
        format!("{}-{}", source, self.target.code())
    }
}

impl Default for LanguageDirection {
    fn default() -> Self {
        Self::auto(Language::new("en"))
    }
}
