//! Settings file (`banktap.yaml`) for the binary.
//!
//! Everything has a default so a missing file or an empty file is a valid
//! configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use intercept_session::SessionConfig;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("cannot read settings file: {0}")]
    Io(#[from] std::io::Error),
    #[error("cannot parse settings file: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// Account display names stamped on normalized records, one per plugin.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountNames {
    pub rbc: String,
    pub scotiabank_credit: String,
    pub scotiabank_chequing: String,
    pub rogers_bank: String,
}

impl Default for AccountNames {
    fn default() -> Self {
        Self {
            rbc: "RBC Chequing".into(),
            scotiabank_credit: "Scotiabank Scene+ Visa".into(),
            scotiabank_chequing: "Scotiabank Chequing".into(),
            rogers_bank: "Rogers Bank Mastercard".into(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub accounts: AccountNames,
    /// How long attach waits for a tab to finish loading, in seconds.
    pub tab_load_timeout_secs: u64,
    /// Poll interval while waiting, in milliseconds.
    pub load_poll_interval_ms: u64,
    /// Capacity of the captured-response channel.
    pub capture_buffer: usize,
}

impl Default for Settings {
    fn default() -> Self {
        let session = SessionConfig::default();
        Self {
            accounts: AccountNames::default(),
            tab_load_timeout_secs: session.tab_load_timeout.as_secs(),
            load_poll_interval_ms: session.load_poll_interval.as_millis() as u64,
            capture_buffer: session.capture_buffer,
        }
    }
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let raw = std::fs::read_to_string(path)?;
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(&raw)?)
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            tab_load_timeout: Duration::from_secs(self.tab_load_timeout_secs),
            load_poll_interval: Duration::from_millis(self.load_poll_interval_ms),
            capture_buffer: self.capture_buffer,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn partial_settings_file_fills_in_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "accounts:\n  rbc: Joint Chequing\ntab_load_timeout_secs: 3").unwrap();

        let settings = Settings::load(file.path()).unwrap();
        assert_eq!(settings.accounts.rbc, "Joint Chequing");
        assert_eq!(settings.accounts.rogers_bank, "Rogers Bank Mastercard");
        assert_eq!(
            settings.session_config().tab_load_timeout,
            Duration::from_secs(3)
        );
        assert_eq!(
            settings.session_config().load_poll_interval,
            Duration::from_millis(500)
        );
    }

    #[test]
    fn empty_file_is_the_default_configuration() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let settings = Settings::load(file.path()).unwrap();
        assert_eq!(settings.capture_buffer, Settings::default().capture_buffer);
    }
}
