use std::path::PathBuf;
use std::time::Duration;

use docdesk_core::params::DEFAULT_INV_RATIO;
use docdesk_pipeline::harvest::{HarvestConfig, DEFAULT_ENDPOINT, DEFAULT_LINK_BASE};

/// Server configuration loaded from environment variables.
///
/// All fields have defaults suitable for local development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (default: `0.0.0.0`).
    pub host: String,
    /// Bind port (default: `5000`).
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS` env var.
    pub cors_origins: Vec<String>,
    /// HTTP request timeout in seconds (default: `300`).
    pub request_timeout_secs: u64,
    /// Largest accepted request body, in bytes.
    pub max_upload_bytes: usize,
    /// Parent directory of per-job workspaces.
    pub work_root: PathBuf,
    /// Directory for artifacts of kinds that dispose their workspace.
    pub output_dir: PathBuf,
    /// Front-end assets served for unmatched routes, if set.
    pub static_dir: Option<PathBuf>,
    /// Merge `inv_ratio` used when the request omits it.
    pub default_inv_ratio: f64,
    pub harvest: HarvestConfig,
}

/// A configuration value that could not be used.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} must be {expected}, got '{value}'")]
    Invalid {
        name: &'static str,
        value: String,
        expected: &'static str,
    },
}

impl ServerConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                 | Default                      |
    /// |-------------------------|------------------------------|
    /// | `HOST`                  | `0.0.0.0`                    |
    /// | `PORT`                  | `5000`                       |
    /// | `CORS_ORIGINS`          | `http://localhost:5000`      |
    /// | `REQUEST_TIMEOUT_SECS`  | `300`                        |
    /// | `MAX_UPLOAD_MB`         | `512`                        |
    /// | `WORK_ROOT`             | `<tmp>/docdesk/work`         |
    /// | `OUTPUT_DIR`            | `<tmp>/docdesk/output`       |
    /// | `STATIC_DIR`            | unset                        |
    /// | `DEFAULT_INV_RATIO`     | `0.75`                       |
    /// | `HARVEST_ENDPOINT`      | public-resource search URL   |
    /// | `HARVEST_LINK_BASE`     | `https://ggzyjy.sc.gov.cn`   |
    /// | `HARVEST_PAGE_DELAY_MS` | `400`                        |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let var = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let tmp = std::env::temp_dir().join("docdesk");

        let host = var("HOST").unwrap_or_else(|| "0.0.0.0".into());
        let port: u16 = parse(&var, "PORT", 5000, "a valid port number")?;

        let cors_origins: Vec<String> = var("CORS_ORIGINS")
            .unwrap_or_else(|| "http://localhost:5000".into())
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();

        let request_timeout_secs: u64 =
            parse(&var, "REQUEST_TIMEOUT_SECS", 300, "a whole number of seconds")?;
        let max_upload_mb: usize =
            parse(&var, "MAX_UPLOAD_MB", 512, "a whole number of megabytes")?;

        let work_root = var("WORK_ROOT").map(PathBuf::from).unwrap_or_else(|| tmp.join("work"));
        let output_dir = var("OUTPUT_DIR").map(PathBuf::from).unwrap_or_else(|| tmp.join("output"));
        let static_dir = var("STATIC_DIR").map(PathBuf::from);

        let default_inv_ratio: f64 =
            parse(&var, "DEFAULT_INV_RATIO", DEFAULT_INV_RATIO, "a number between 0 and 1")?;
        if !(default_inv_ratio > 0.0 && default_inv_ratio < 1.0) {
            return Err(ConfigError::Invalid {
                name: "DEFAULT_INV_RATIO",
                value: default_inv_ratio.to_string(),
                expected: "a number between 0 and 1",
            });
        }

        let page_delay_ms: u64 =
            parse(&var, "HARVEST_PAGE_DELAY_MS", 400, "a whole number of milliseconds")?;
        let harvest = HarvestConfig {
            endpoint: var("HARVEST_ENDPOINT").unwrap_or_else(|| DEFAULT_ENDPOINT.into()),
            link_base: var("HARVEST_LINK_BASE").unwrap_or_else(|| DEFAULT_LINK_BASE.into()),
            page_delay: Duration::from_millis(page_delay_ms),
        };

        Ok(Self {
            host,
            port,
            cors_origins,
            request_timeout_secs,
            max_upload_bytes: max_upload_mb.saturating_mul(1024 * 1024),
            work_root,
            output_dir,
            static_dir,
            default_inv_ratio,
            harvest,
        })
    }
}

fn parse<T: std::str::FromStr>(
    var: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
    expected: &'static str,
) -> Result<T, ConfigError> {
    match var(name) {
        None => Ok(default),
        Some(value) => value.parse().map_err(|_| ConfigError::Invalid {
            name,
            value,
            expected,
        }),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use assert_matches::assert_matches;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<ServerConfig, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|name| map.get(name).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = load(&[]).unwrap();

        assert_eq!(config.port, 5000);
        assert_eq!(config.cors_origins, vec!["http://localhost:5000"]);
        assert_eq!(config.max_upload_bytes, 512 * 1024 * 1024);
        assert!(config.work_root.ends_with("docdesk/work"));
        assert!(config.static_dir.is_none());
        assert_eq!(config.default_inv_ratio, 0.75);
        assert_eq!(config.harvest.page_delay, Duration::from_millis(400));
    }

    #[test]
    fn overrides_are_parsed() {
        let config = load(&[
            ("PORT", "8080"),
            ("CORS_ORIGINS", "http://a, http://b ,"),
            ("WORK_ROOT", "/srv/work"),
            ("STATIC_DIR", "/srv/web"),
            ("HARVEST_PAGE_DELAY_MS", "0"),
        ])
        .unwrap();

        assert_eq!(config.port, 8080);
        assert_eq!(config.cors_origins, vec!["http://a", "http://b"]);
        assert_eq!(config.work_root, PathBuf::from("/srv/work"));
        assert_eq!(config.static_dir, Some(PathBuf::from("/srv/web")));
        assert!(config.harvest.page_delay.is_zero());
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert_matches!(
            load(&[("PORT", "http")]),
            Err(ConfigError::Invalid { name: "PORT", .. })
        );
        assert_matches!(
            load(&[("DEFAULT_INV_RATIO", "1.5")]),
            Err(ConfigError::Invalid { name: "DEFAULT_INV_RATIO", .. })
        );
    }
}
