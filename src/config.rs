use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use crate::pipeline::DEFAULT_CONFIDENCE_THRESHOLD;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{name} must be {expected}, got '{value}'")]
    Invalid {
        name: &'static str,
        value: String,
        expected: &'static str,
    },
}

/// Process settings, read once from the environment at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub port: u16,
    pub body_limit_bytes: usize,
    pub model_path: PathBuf,
    pub model_input_op: String,
    pub model_output_op: String,
    pub class_list_path: Option<PathBuf>,
    pub disease_info_path: PathBuf,
    pub upload_dir: PathBuf,
    pub confidence_threshold: f64,
    pub inference_timeout: Duration,
    pub model_url: Option<String>,
    pub disease_info_url: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 5000,
            body_limit_bytes: 16 * 1024 * 1024,
            model_path: PathBuf::from("./models/plant_disease_recog_model_pwp.pb"),
            model_input_op: "x".to_string(),
            model_output_op: "Identity".to_string(),
            class_list_path: None,
            disease_info_path: PathBuf::from("./plant_disease.json"),
            upload_dir: PathBuf::from("./uploadimages"),
            confidence_threshold: DEFAULT_CONFIDENCE_THRESHOLD,
            inference_timeout: Duration::from_secs(30),
            model_url: None,
            disease_info_url: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds a config from any variable source; unset or empty variables keep
    /// their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let mut config = Config::default();

        if let Some(port) = parse(&get, "PORT", "a valid number between 0 and 65535")? {
            config.port = port;
        }
        if let Some(mb) = parse::<usize, _>(&get, "BODY_LIMIT_MB", "a valid integer")? {
            config.body_limit_bytes =
                mb.checked_mul(1024 * 1024)
                    .ok_or_else(|| ConfigError::Invalid {
                        name: "BODY_LIMIT_MB",
                        value: mb.to_string(),
                        expected: "a size in megabytes that fits in memory",
                    })?;
        }
        if let Some(threshold) = parse::<f64, _>(&get, "CONFIDENCE_THRESHOLD", "a percentage")? {
            if !(0.0..=100.0).contains(&threshold) {
                return Err(ConfigError::Invalid {
                    name: "CONFIDENCE_THRESHOLD",
                    value: threshold.to_string(),
                    expected: "a percentage",
                });
            }
            config.confidence_threshold = threshold;
        }
        if let Some(secs) = parse(&get, "INFERENCE_TIMEOUT_SECS", "a whole number of seconds")? {
            config.inference_timeout = Duration::from_secs(secs);
        }

        if let Some(path) = get("MODEL_PATH") {
            config.model_path = path.into();
        }
        if let Some(op) = get("MODEL_INPUT_OP") {
            config.model_input_op = op;
        }
        if let Some(op) = get("MODEL_OUTPUT_OP") {
            config.model_output_op = op;
        }
        if let Some(path) = get("DISEASE_INFO_PATH") {
            config.disease_info_path = path.into();
        }
        if let Some(dir) = get("UPLOAD_DIR") {
            config.upload_dir = dir.into();
        }
        config.class_list_path = get("CLASS_LIST_PATH").map(PathBuf::from);
        config.model_url = get("MODEL_URL");
        config.disease_info_url = get("DISEASE_INFO_URL");

        Ok(config)
    }
}

fn parse<T, G>(get: &G, name: &'static str, expected: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    G: Fn(&str) -> Option<String>,
{
    match get(name) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid {
                name,
                value,
                expected,
            }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn from_pairs(pairs: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_when_unset() {
        assert_eq!(from_pairs(&[]).unwrap(), Config::default());
    }

    #[test]
    fn reads_overrides() {
        let config = from_pairs(&[
            ("PORT", "8080"),
            ("BODY_LIMIT_MB", "2"),
            ("CONFIDENCE_THRESHOLD", "45.5"),
            ("INFERENCE_TIMEOUT_SECS", "3"),
            ("UPLOAD_DIR", "/tmp/uploads"),
            ("CLASS_LIST_PATH", "labels.txt"),
            ("MODEL_URL", "https://example.com/model.pb"),
        ])
        .unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.body_limit_bytes, 2 * 1024 * 1024);
        assert_eq!(config.confidence_threshold, 45.5);
        assert_eq!(config.inference_timeout, Duration::from_secs(3));
        assert_eq!(config.upload_dir, PathBuf::from("/tmp/uploads"));
        assert_eq!(config.class_list_path, Some(PathBuf::from("labels.txt")));
        assert_eq!(config.model_url.as_deref(), Some("https://example.com/model.pb"));
        assert_eq!(config.disease_info_url, None);
    }

    #[test]
    fn empty_values_keep_defaults() {
        let config = from_pairs(&[("PORT", ""), ("MODEL_URL", "  ")]).unwrap();
        assert_eq!(config.port, 5000);
        assert_eq!(config.model_url, None);
    }

    #[test]
    fn bad_port_is_error() {
        let err = from_pairs(&[("PORT", "99999")]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "PORT must be a valid number between 0 and 65535, got '99999'"
        );
    }

    #[test]
    fn oversized_body_limit_is_error() {
        let huge = usize::MAX.to_string();
        let err = from_pairs(&[("BODY_LIMIT_MB", huge.as_str())]).unwrap_err();
        assert!(err.to_string().starts_with("BODY_LIMIT_MB must be"));
    }

    #[test]
    fn threshold_out_of_range_is_error() {
        assert!(from_pairs(&[("CONFIDENCE_THRESHOLD", "150")]).is_err());
        assert!(from_pairs(&[("CONFIDENCE_THRESHOLD", "abc")]).is_err());
    }
}
