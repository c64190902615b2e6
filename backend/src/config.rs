use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Invalid config file: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
    #[error("Unknown detection provider: {0}")]
    UnknownProvider(String),
    #[error("Provider listed more than once: {0}")]
    DuplicateProvider(String),
    #[error("Invalid URL for {key}: {source}")]
    Url {
        key: &'static str,
        source: url::ParseError,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    AiOrNot,
    Hive,
    Sightengine,
}

impl ProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::AiOrNot => "aiornot",
            ProviderKind::Hive => "hive",
            ProviderKind::Sightengine => "sightengine",
        }
    }
}

impl FromStr for ProviderKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "aiornot" => Ok(ProviderKind::AiOrNot),
            "hive" => Ok(ProviderKind::Hive),
            "sightengine" => Ok(ProviderKind::Sightengine),
            other => Err(ConfigError::UnknownProvider(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub providers: ProvidersConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    /// Externally reachable origin, used to build public links to stored uploads.
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub upload_dir: PathBuf,
    pub upload_ttl_secs: u64,
    pub sweep_interval_secs: u64,
    pub max_upload_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub order: Vec<ProviderKind>,
    pub timeout_secs: u64,
    pub aiornot: AiOrNotConfig,
    pub hive: HiveConfig,
    pub sightengine: SightengineConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AiOrNotConfig {
    pub api_key: Option<String>,
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HiveConfig {
    pub api_key: Option<String>,
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SightengineConfig {
    pub api_user: Option<String>,
    pub api_secret: Option<String>,
    pub base_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8081,
            base_url: "http://localhost:8081".to_string(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            upload_dir: std::env::temp_dir().join("ai-detector-uploads"),
            upload_ttl_secs: 3600,
            sweep_interval_secs: 300,
            max_upload_bytes: 50 * 1024 * 1024,
        }
    }
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            order: vec![
                ProviderKind::AiOrNot,
                ProviderKind::Hive,
                ProviderKind::Sightengine,
            ],
            timeout_secs: 30,
            aiornot: AiOrNotConfig::default(),
            hive: HiveConfig::default(),
            sightengine: SightengineConfig::default(),
        }
    }
}

impl Default for AiOrNotConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.aiornot.com".to_string(),
        }
    }
}

impl Default for HiveConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.thehive.ai".to_string(),
        }
    }
}

impl Default for SightengineConfig {
    fn default() -> Self {
        Self {
            api_user: None,
            api_secret: None,
            base_url: "https://api.sightengine.com".to_string(),
        }
    }
}

impl AppConfig {
    /// Reads `.env`, the optional YAML file named by `DETECTOR_CONFIG`, then
    /// the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        let mut config = match std::env::var("DETECTOR_CONFIG") {
            Ok(path) if !path.trim().is_empty() => Self::from_yaml_file(Path::new(&path))?,
            _ => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: &Path) -> Result<Self, ConfigError> {
        let config_str = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&config_str)
    }

    pub fn from_yaml_str(config_str: &str) -> Result<Self, ConfigError> {
        Ok(serde_yaml::from_str(config_str)?)
    }

    /// Overrides fields from `lookup`. Empty values count as unset.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("AIORNOT_API_KEY") {
            self.providers.aiornot.api_key = Some(v);
        }
        if let Some(v) = get("AIORNOT_API_BASE_URL") {
            self.providers.aiornot.base_url = v;
        }
        if let Some(v) = get("HIVE_API_KEY") {
            self.providers.hive.api_key = Some(v);
        }
        if let Some(v) = get("HIVE_API_BASE_URL") {
            self.providers.hive.base_url = v;
        }
        if let Some(v) = get("SIGHTENGINE_API_USER") {
            self.providers.sightengine.api_user = Some(v);
        }
        if let Some(v) = get("SIGHTENGINE_API_SECRET") {
            self.providers.sightengine.api_secret = Some(v);
        }
        if let Some(v) = get("SIGHTENGINE_API_BASE_URL") {
            self.providers.sightengine.base_url = v;
        }
        if let Some(v) = get("DETECTION_PROVIDERS") {
            self.providers.order = v
                .split(',')
                .filter(|name| !name.trim().is_empty())
                .map(ProviderKind::from_str)
                .collect::<Result<_, _>>()?;
        }
        if let Some(v) = get("PROVIDER_TIMEOUT_SECS") {
            self.providers.timeout_secs = parse_number("PROVIDER_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = get("BASE_URL") {
            self.server.base_url = v;
        }
        if let Some(v) = get("PORT") {
            self.server.port = parse_number("PORT", &v)?;
        }
        if let Some(v) = get("UPLOAD_DIR") {
            self.storage.upload_dir = PathBuf::from(v);
        }
        if let Some(v) = get("UPLOAD_TTL_SECS") {
            self.storage.upload_ttl_secs = parse_number("UPLOAD_TTL_SECS", &v)?;
        }
        if let Some(v) = get("SWEEP_INTERVAL_SECS") {
            self.storage.sweep_interval_secs = parse_number("SWEEP_INTERVAL_SECS", &v)?;
        }
        if let Some(v) = get("MAX_UPLOAD_BYTES") {
            self.storage.max_upload_bytes = parse_number("MAX_UPLOAD_BYTES", &v)?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.public_base_url()?;
        for (key, value) in [
            ("providers.aiornot.base_url", &self.providers.aiornot.base_url),
            ("providers.hive.base_url", &self.providers.hive.base_url),
            ("providers.sightengine.base_url", &self.providers.sightengine.base_url),
        ] {
            Url::parse(value).map_err(|source| ConfigError::Url { key, source })?;
        }

        let mut seen = Vec::with_capacity(self.providers.order.len());
        for kind in &self.providers.order {
            if seen.contains(kind) {
                return Err(ConfigError::DuplicateProvider(kind.as_str().to_string()));
            }
            seen.push(*kind);
        }

        if self.storage.sweep_interval_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "storage.sweep_interval_secs".to_string(),
                value: "0".to_string(),
            });
        }
        Ok(())
    }

    /// Base URL with a trailing slash so relative joins keep any path prefix.
    pub fn public_base_url(&self) -> Result<Url, ConfigError> {
        let mut raw = self.server.base_url.trim().to_string();
        if !raw.ends_with('/') {
            raw.push('/');
        }
        Url::parse(&raw).map_err(|source| ConfigError::Url {
            key: "server.base_url",
            source,
        })
    }
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn missing_credentials_are_not_an_error() {
        let mut config = AppConfig::default();
        config.apply_env(lookup(&[])).unwrap();
        config.validate().unwrap();
        assert!(config.providers.aiornot.api_key.is_none());
        assert_eq!(
            config.providers.order,
            vec![
                ProviderKind::AiOrNot,
                ProviderKind::Hive,
                ProviderKind::Sightengine
            ]
        );
    }

    #[test]
    fn env_overrides_credentials_and_order() {
        let mut config = AppConfig::default();
        config
            .apply_env(lookup(&[
                ("AIORNOT_API_KEY", "key-1"),
                ("SIGHTENGINE_API_USER", "user"),
                ("SIGHTENGINE_API_SECRET", "secret"),
                ("HIVE_API_KEY", "  "),
                ("DETECTION_PROVIDERS", "sightengine, aiornot"),
                ("UPLOAD_TTL_SECS", "60"),
            ]))
            .unwrap();

        assert_eq!(config.providers.aiornot.api_key.as_deref(), Some("key-1"));
        assert!(config.providers.hive.api_key.is_none());
        assert_eq!(
            config.providers.order,
            vec![ProviderKind::Sightengine, ProviderKind::AiOrNot]
        );
        assert_eq!(config.storage.upload_ttl_secs, 60);
    }

    #[test]
    fn rejects_unknown_provider_and_bad_numbers() {
        let mut config = AppConfig::default();
        let err = config
            .apply_env(lookup(&[("DETECTION_PROVIDERS", "aiornot,illuminarty")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownProvider(name) if name == "illuminarty"));

        let err = config
            .apply_env(lookup(&[("PORT", "eighty")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn duplicate_provider_fails_validation() {
        let mut config = AppConfig::default();
        config.providers.order = vec![ProviderKind::Hive, ProviderKind::Hive];
        assert!(matches!(
            config.validate(),
            Err(ConfigError::DuplicateProvider(_))
        ));
    }

    #[test]
    fn example_config_is_valid() {
        let config =
            AppConfig::from_yaml_str(include_str!("../../config/detector.example.yaml")).unwrap();
        config.validate().unwrap();
        assert_eq!(config.providers.order.len(), 3);
        assert_eq!(config.storage.max_upload_bytes, 50 * 1024 * 1024);
    }

    #[test]
    fn yaml_file_fills_partial_sections() {
        let config = AppConfig::from_yaml_str(
            r#"
server:
  base_url: "https://detector.example.com/app"
providers:
  order: [hive]
  hive:
    api_key: "hive-key"
"#,
        )
        .unwrap();

        assert_eq!(config.server.port, 8081);
        assert_eq!(config.providers.order, vec![ProviderKind::Hive]);
        assert_eq!(config.providers.hive.base_url, "https://api.thehive.ai");
        assert_eq!(
            config.public_base_url().unwrap().as_str(),
            "https://detector.example.com/app/"
        );
    }
}
