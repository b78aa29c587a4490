use std::{net::SocketAddr, path::PathBuf};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    /// Email domain whose holders may create rooms and post.
    pub institution_domain: String,
    pub upload_dir: PathBuf,
    pub upload_url_prefix: String,
    pub max_upload_bytes: usize,
    pub summarizer_url: Option<String>,
}

const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8080";
const DEFAULT_DOMAIN: &str = "ietdavv.edu.in";
const DEFAULT_MAX_UPLOAD: usize = 10 * 1024 * 1024;

impl Config {
    /// Loads `.env` if present, then reads the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenv::dotenv();
        Self::from_lookup(|key| dotenv::var(key).ok())
    }

    pub fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let database_url = get("DATABASE_URL").ok_or(ConfigError::Missing("DATABASE_URL"))?;

        let bind_raw = get("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_owned());
        let bind_addr = bind_raw.parse().map_err(|_| ConfigError::Invalid {
            name: "BIND_ADDR",
            value: bind_raw.clone(),
        })?;

        let institution_domain = get("INSTITUTION_DOMAIN")
            .unwrap_or_else(|| DEFAULT_DOMAIN.to_owned())
            .trim_start_matches('@')
            .to_ascii_lowercase();

        let max_upload_bytes = match get("MAX_UPLOAD_BYTES") {
            Some(raw) => raw.parse().map_err(|_| ConfigError::Invalid {
                name: "MAX_UPLOAD_BYTES",
                value: raw,
            })?,
            None => DEFAULT_MAX_UPLOAD,
        };

        let prefix_raw = get("UPLOAD_URL_PREFIX").unwrap_or_else(|| "/uploads".to_owned());
        let upload_url_prefix = prefix_raw.trim_end_matches('/').to_owned();
        if !upload_url_prefix.starts_with('/') {
            return Err(ConfigError::Invalid {
                name: "UPLOAD_URL_PREFIX",
                value: prefix_raw,
            });
        }

        Ok(Config {
            database_url,
            bind_addr,
            institution_domain,
            upload_dir: get("UPLOAD_DIR").unwrap_or_else(|| "uploads".to_owned()).into(),
            upload_url_prefix,
            max_upload_bytes,
            summarizer_url: get("SUMMARIZER_URL").filter(|url| !url.trim().is_empty()),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply() {
        let config = Config::from_lookup(lookup(&[("DATABASE_URL", "sqlite::memory:")])).unwrap();
        assert_eq!(config.bind_addr.port(), 8080);
        assert_eq!(config.institution_domain, "ietdavv.edu.in");
        assert_eq!(config.upload_url_prefix, "/uploads");
        assert!(config.summarizer_url.is_none());
    }

    #[test]
    fn database_url_is_required() {
        let err = Config::from_lookup(lookup(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("DATABASE_URL")));
    }

    #[test]
    fn bad_values_are_rejected() {
        let err = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "sqlite::memory:"),
            ("MAX_UPLOAD_BYTES", "lots"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "MAX_UPLOAD_BYTES", .. }));

        let err = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "sqlite::memory:"),
            ("UPLOAD_URL_PREFIX", "/"),
        ]))
        .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "UPLOAD_URL_PREFIX", .. }));
    }

    #[test]
    fn domain_is_normalized() {
        let config = Config::from_lookup(lookup(&[
            ("DATABASE_URL", "sqlite::memory:"),
            ("INSTITUTION_DOMAIN", "@Example.EDU"),
            ("SUMMARIZER_URL", "  "),
        ]))
        .unwrap();
        assert_eq!(config.institution_domain, "example.edu");
        assert!(config.summarizer_url.is_none());
    }
}
