use std::fmt;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Bearer credential, read once at startup from a small JSON file.
#[derive(Clone, Serialize, Deserialize)]
pub struct Credentials {
    api_token: String,
}

impl Credentials {
    pub fn new(api_token: impl Into<String>) -> Result<Self> {
        let api_token = api_token.into().trim().to_string();
        if api_token.is_empty() {
            anyhow::bail!("API token is empty");
        }
        Ok(Self { api_token })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("credentials not found at {}", path.display()))?;
        let creds: Credentials = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse credentials in {}", path.display()))?;
        Self::new(creds.api_token)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("failed to write credentials to {}", path.display()))
    }

    pub fn token(&self) -> &str {
        &self.api_token
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_token", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        Credentials::new(" abc-123 \n").unwrap().save(&path).unwrap();
        assert_eq!(Credentials::load(&path).unwrap().token(), "abc-123");
    }

    #[test]
    fn missing_or_malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        assert!(Credentials::load(&path).is_err());

        std::fs::write(&path, r#"{"token": "wrong-field"}"#).unwrap();
        assert!(Credentials::load(&path).is_err());

        std::fs::write(&path, r#"{"api_token": ""}"#).unwrap();
        assert!(Credentials::load(&path).is_err());
    }

    #[test]
    fn debug_hides_token() {
        let creds = Credentials::new("secret").unwrap();
        assert!(!format!("{creds:?}").contains("secret"));
    }
}
