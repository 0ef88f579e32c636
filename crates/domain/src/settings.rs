//! Settings key/tier vocabulary.

use castellan_core::{AppError, AppResult};

/// Which layer a settings value belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsTier {
    /// Built-in system default, not user-editable.
    System,
    /// Deployment-level override.
    Custom,
}

/// A validated, non-empty settings key.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SettingsKey(String);

impl SettingsKey {
    /// Validates a settings key: non-empty, no surrounding whitespace.
    pub fn new(value: impl Into<String>) -> AppResult<Self> {
        let value = value.into();
        if value.trim().is_empty() || value != value.trim() {
            return Err(AppError::Validation(
                "settings key must not be empty or have surrounding whitespace".to_owned(),
            ));
        }
        Ok(Self(value))
    }

    /// Returns the key string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}
