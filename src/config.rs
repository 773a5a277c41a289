use crate::error::ConfigError;
use image::imageops::FilterType;
use kornia_image::ImageSize;
use std::{fmt, time::Duration};

/// Default edge length of the square image handed to the model.
pub const DEFAULT_TARGET_EDGE: usize = 224;

/// Environment variable holding the model provider user name.
pub const USERNAME_VAR: &str = "KAGGLE_USERNAME";
/// Environment variable holding the model provider API key.
pub const KEY_VAR: &str = "KAGGLE_KEY";

/// Runtime settings for the analysis pipeline.
#[derive(Clone, Debug)]
pub struct AnalyzerConfig {
    /// Size every uploaded image is normalized to.
    pub target_size: ImageSize,
    /// Resampling filter used for the single resize pass.
    pub filter: FilterType,
    /// Upper bound for a single generation call. `None` waits forever.
    pub generation_timeout: Option<Duration>,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            target_size: ImageSize {
                width: DEFAULT_TARGET_EDGE,
                height: DEFAULT_TARGET_EDGE,
            },
            filter: FilterType::CatmullRom,
            generation_timeout: None,
        }
    }
}

impl AnalyzerConfig {
    /// Sets a square target size with the given edge length.
    pub fn with_target_edge(mut self, edge: usize) -> Self {
        self.target_size = ImageSize {
            width: edge,
            height: edge,
        };
        self
    }

    pub fn with_generation_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.generation_timeout = timeout;
        self
    }
}

/// Credentials required by the model hosting provider.
///
/// These are read once at startup; a missing value is fatal.
#[derive(Clone)]
pub struct ProviderCredentials {
    pub username: String,
    pub key: String,
}

impl ProviderCredentials {
    /// Reads the credentials from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads the credentials through `lookup`, treating empty values as missing.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &'static str| {
            lookup(name)
                .filter(|value| !value.is_empty())
                .ok_or(ConfigError::MissingCredential(name))
        };

        Ok(Self {
            username: read(USERNAME_VAR)?,
            key: read(KEY_VAR)?,
        })
    }
}

impl fmt::Debug for ProviderCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderCredentials")
            .field("username", &self.username)
            .field("key", &"<redacted>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn default_config_targets_224_square() {
        let config = AnalyzerConfig::default();
        assert_eq!(config.target_size.width, 224);
        assert_eq!(config.target_size.height, 224);
        assert!(config.generation_timeout.is_none());
    }

    #[test]
    fn credentials_require_both_values() {
        let creds =
            ProviderCredentials::from_lookup(lookup_from(&[(USERNAME_VAR, "ada"), (KEY_VAR, "k")]))
                .unwrap();
        assert_eq!(creds.username, "ada");
        assert_eq!(creds.key, "k");

        let err = ProviderCredentials::from_lookup(lookup_from(&[(USERNAME_VAR, "ada")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::MissingCredential(KEY_VAR)));
    }

    #[test]
    fn empty_credentials_are_missing() {
        let err =
            ProviderCredentials::from_lookup(lookup_from(&[(USERNAME_VAR, ""), (KEY_VAR, "k")]))
                .unwrap_err();
        assert!(matches!(err, ConfigError::MissingCredential(USERNAME_VAR)));
    }

    #[test]
    fn debug_redacts_key() {
        let creds = ProviderCredentials {
            username: "ada".into(),
            key: "secret".into(),
        };
        let printed = format!("{creds:?}");
        assert!(printed.contains("ada"));
        assert!(!printed.contains("secret"));
    }
}
