//! Settings/history facade.
//!
//! Storage mechanics live outside this crate; coordinators only need to load
//! and save user settings and append finished segments to history.

use anyhow::Result;
use tokio::sync::Mutex;

use crate::session::SessionSettings;
use crate::translation::TranslationContent;

/// Stored form of the user's session preferences.
pub type UserSettings = SessionSettings;

/// Read/write facade over local persistence.
#[async_trait::async_trait]
pub trait Repository: Send + Sync {
    /// Load the current user settings, falling back to defaults when nothing
    /// has been saved yet.
    async fn load_settings(&self) -> Result<UserSettings>;

    /// Persist updated user settings.
    async fn save_settings(&self, settings: UserSettings) -> Result<()>;

    /// Append one finalized segment to the translation history.
    async fn append_history(&self, content: TranslationContent) -> Result<()>;
}

/// In-memory repository, used by tests and the demo binary.
#[derive(Default)]
pub struct MemoryRepository {
    settings: Mutex<UserSettings>,
    history: Mutex<Vec<TranslationContent>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the appended history, oldest first.
    pub async fn history(&self) -> Vec<TranslationContent> {
        self.history.lock().await.clone()
    }
}

#[async_trait::async_trait]
impl Repository for MemoryRepository {
    async fn load_settings(&self) -> Result<UserSettings> {
        Ok(self.settings.lock().await.clone())
    }

    async fn save_settings(&self, settings: UserSettings) -> Result<()> {
        *self.settings.lock().await = settings;
        Ok(())
    }

    async fn append_history(&self, content: TranslationContent) -> Result<()> {
        self.history.lock().await.push(content);
        Ok(())
    }
}
