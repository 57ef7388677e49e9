//! Run configuration.
//!
//! [`Config`] is the single value that carries every tunable of a run. It is
//! built from defaults, then overlaid by the TOML config files (platform
//! config dir, then `./.crossref-ris.toml`), and finally by command-line
//! flags in the binary.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ResolverError, Result};
use crate::skip::SkipPatterns;

/// Default Crossref works search endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.crossref.org/works";
/// Default output file name.
pub const DEFAULT_OUTPUT_FILE: &str = "output.ris";
/// Default log file name.
pub const DEFAULT_LOG_FILE: &str = "crossref-ris.log";
/// Environment variable supplying the polite-pool contact address.
pub const MAILTO_ENV: &str = "CROSSREF_MAILTO";
/// Slowest accepted request rate (one request every ~17 minutes).
pub const MIN_RATE_PER_SECOND: f64 = 0.001;

/// Everything a run needs to know.
#[derive(Debug, Clone)]
pub struct Config {
    /// Works search endpoint.
    pub base_url: String,
    /// Contact address for the API's polite pool.
    pub mailto: Option<String>,
    /// Hits requested per search.
    pub rows: u32,
    /// Per-attempt timeout.
    pub timeout: Duration,
    /// Attempts per title before giving up.
    pub max_retries: u32,
    /// Upper bound on a single backoff wait.
    pub max_backoff: Duration,
    /// Token refill rate of the shared limiter.
    pub rate_per_second: f64,
    /// Token bucket capacity.
    pub burst: u32,
    /// Concurrent resolution tasks.
    pub workers: usize,
    /// Successful completions between checkpoints.
    pub batch_size: usize,
    pub skip_patterns: SkipPatterns,
    pub default_output: PathBuf,
    pub log_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            mailto: None,
            rows: 5,
            timeout: Duration::from_secs(20),
            max_retries: 3,
            max_backoff: Duration::from_secs(60),
            rate_per_second: 1.0,
            burst: 3,
            workers: 3,
            batch_size: 3,
            skip_patterns: SkipPatterns::default(),
            default_output: PathBuf::from(DEFAULT_OUTPUT_FILE),
            log_file: Some(PathBuf::from(DEFAULT_LOG_FILE)),
        }
    }
}

impl Config {
    /// Defaults overlaid by the config files and `CROSSREF_MAILTO`.
    ///
    /// `explicit` is a config file named on the command line; unlike the
    /// implicit locations it must exist and parse.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut file = load_config_files();
        if let Some(path) = explicit {
            let overlay = load_from_path(path)?.ok_or_else(|| {
                ResolverError::Config(format!("config file not found: {}", path.display()))
            })?;
            file = merge(file, overlay);
        }

        let mut config = Config::default();
        config.apply(file);
        if config.mailto.is_none() {
            config.mailto = std::env::var(MAILTO_ENV).ok().filter(|m| !m.trim().is_empty());
        }
        config.validate()?;
        Ok(config)
    }

    /// Overlay the values present in a config file.
    pub fn apply(&mut self, file: ConfigFile) {
        if let Some(api) = file.api {
            if let Some(url) = api.base_url {
                self.base_url = url;
            }
            if let Some(mailto) = api.mailto {
                self.mailto = Some(mailto);
            }
            if let Some(rows) = api.rows {
                self.rows = rows;
            }
            if let Some(secs) = api.timeout_secs {
                self.timeout = Duration::from_secs(secs);
            }
            if let Some(retries) = api.max_retries {
                self.max_retries = retries;
            }
            if let Some(secs) = api.max_backoff_secs {
                self.max_backoff = Duration::from_secs(secs);
            }
        }
        if let Some(rl) = file.rate_limit {
            if let Some(rate) = rl.per_second {
                self.rate_per_second = rate;
            }
            if let Some(burst) = rl.burst {
                self.burst = burst;
            }
        }
        if let Some(p) = file.pipeline {
            if let Some(workers) = p.workers {
                self.workers = workers;
            }
            if let Some(batch) = p.batch_size {
                self.batch_size = batch;
            }
            if let Some(output) = p.default_output {
                self.default_output = PathBuf::from(output);
            }
        }
        if let Some(skip) = file.skip {
            if let Some(patterns) = skip.patterns {
                self.skip_patterns = SkipPatterns::new(patterns);
            }
            if let Some(extra) = skip.extra_patterns {
                self.skip_patterns.extend(extra);
            }
        }
        if let Some(logging) = file.logging {
            if let Some(path) = logging.file {
                self.log_file = if path.trim().is_empty() {
                    None
                } else {
                    Some(PathBuf::from(path))
                };
            }
        }
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(ResolverError::Config("base URL must not be empty".into()));
        }
        if url::Url::parse(&self.base_url).is_err() {
            return Err(ResolverError::Config(format!(
                "base URL is not a valid URL: {}",
                self.base_url
            )));
        }
        if self.workers == 0 {
            return Err(ResolverError::Config("workers must be at least 1".into()));
        }
        if self.batch_size == 0 {
            return Err(ResolverError::Config("batch size must be at least 1".into()));
        }
        if self.rows == 0 {
            return Err(ResolverError::Config("rows must be at least 1".into()));
        }
        if self.max_retries == 0 {
            return Err(ResolverError::Config("max retries must be at least 1".into()));
        }
        if !(self.rate_per_second.is_finite() && self.rate_per_second >= MIN_RATE_PER_SECOND) {
            return Err(ResolverError::Config(format!(
                "rate must be a number of at least {} requests per second",
                MIN_RATE_PER_SECOND
            )));
        }
        if self.burst == 0 {
            return Err(ResolverError::Config("burst must be at least 1".into()));
        }
        Ok(())
    }

    /// The User-Agent sent with every request.
    pub fn user_agent(&self) -> String {
        let version = env!("CARGO_PKG_VERSION");
        match self.mailto.as_deref() {
            Some(mailto) => format!("crossref-ris/{} (mailto:{})", version, mailto),
            None => format!("crossref-ris/{}", version),
        }
    }
}

/// On-disk TOML configuration structure.
/// All fields are optional so partial configs work (merge with defaults).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    pub api: Option<ApiConfig>,
    pub rate_limit: Option<RateLimitConfig>,
    pub pipeline: Option<PipelineConfig>,
    pub skip: Option<SkipConfig>,
    pub logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiConfig {
    pub base_url: Option<String>,
    pub mailto: Option<String>,
    pub rows: Option<u32>,
    pub timeout_secs: Option<u64>,
    pub max_retries: Option<u32>,
    pub max_backoff_secs: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub per_second: Option<f64>,
    pub burst: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub workers: Option<usize>,
    pub batch_size: Option<usize>,
    pub default_output: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SkipConfig {
    /// Replaces the built-in label list.
    pub patterns: Option<Vec<String>>,
    /// Appended to the label list.
    pub extra_patterns: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log file path; empty disables file logging.
    pub file: Option<String>,
}

/// Platform config directory path: `<config_dir>/crossref-ris/config.toml`.
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("crossref-ris").join("config.toml"))
}

/// Load config by cascading CWD `.crossref-ris.toml` over platform config.
///
/// Unreadable or invalid implicit files are logged and ignored.
pub fn load_config_files() -> ConfigFile {
    let candidates = [config_path(), Some(PathBuf::from(".crossref-ris.toml"))];
    candidates
        .into_iter()
        .flatten()
        .filter_map(|path| match load_from_path(&path) {
            Ok(file) => file,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring config file");
                None
            }
        })
        .fold(ConfigFile::default(), merge)
}

/// Load a config from a specific path. `Ok(None)` if the file doesn't exist.
pub fn load_from_path(path: &Path) -> Result<Option<ConfigFile>> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    toml::from_str(&content)
        .map(Some)
        .map_err(|e| ResolverError::Config(format!("{}: {}", path.display(), e)))
}

/// Merge two configs: `overlay` values take precedence over `base`.
pub fn merge(base: ConfigFile, overlay: ConfigFile) -> ConfigFile {
    let api = match (base.api, overlay.api) {
        (Some(b), Some(o)) => Some(ApiConfig {
            base_url: o.base_url.or(b.base_url),
            mailto: o.mailto.or(b.mailto),
            rows: o.rows.or(b.rows),
            timeout_secs: o.timeout_secs.or(b.timeout_secs),
            max_retries: o.max_retries.or(b.max_retries),
            max_backoff_secs: o.max_backoff_secs.or(b.max_backoff_secs),
        }),
        (b, o) => o.or(b),
    };
    let rate_limit = match (base.rate_limit, overlay.rate_limit) {
        (Some(b), Some(o)) => Some(RateLimitConfig {
            per_second: o.per_second.or(b.per_second),
            burst: o.burst.or(b.burst),
        }),
        (b, o) => o.or(b),
    };
    let pipeline = match (base.pipeline, overlay.pipeline) {
        (Some(b), Some(o)) => Some(PipelineConfig {
            workers: o.workers.or(b.workers),
            batch_size: o.batch_size.or(b.batch_size),
            default_output: o.default_output.or(b.default_output),
        }),
        (b, o) => o.or(b),
    };
    let skip = match (base.skip, overlay.skip) {
        (Some(b), Some(o)) => Some(SkipConfig {
            patterns: o.patterns.or(b.patterns),
            extra_patterns: match (b.extra_patterns, o.extra_patterns) {
                (Some(mut b), Some(o)) => {
                    b.extend(o);
                    Some(b)
                }
                (b, o) => o.or(b),
            },
        }),
        (b, o) => o.or(b),
    };
    let logging = match (base.logging, overlay.logging) {
        (Some(b), Some(o)) => Some(LoggingConfig {
            file: o.file.or(b.file),
        }),
        (b, o) => o.or(b),
    };

    ConfigFile {
        api,
        rate_limit,
        pipeline,
        skip,
        logging,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        config.validate().unwrap();
        assert_eq!(config.rows, 5);
        assert_eq!(config.skip_patterns, SkipPatterns::default());
        assert_eq!(config.user_agent(), format!("crossref-ris/{}", env!("CARGO_PKG_VERSION")));
    }

    #[test]
    fn test_user_agent_includes_mailto() {
        let config = Config {
            mailto: Some("me@example.org".into()),
            ..Config::default()
        };
        assert!(config.user_agent().ends_with("(mailto:me@example.org)"));
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let bad = [
            Config {
                workers: 0,
                ..Config::default()
            },
            Config {
                batch_size: 0,
                ..Config::default()
            },
            Config {
                rate_per_second: 0.0,
                ..Config::default()
            },
            Config {
                rate_per_second: f64::NAN,
                ..Config::default()
            },
            Config {
                rate_per_second: 1e-20,
                ..Config::default()
            },
            Config {
                burst: 0,
                ..Config::default()
            },
            Config {
                base_url: "not a url".into(),
                ..Config::default()
            },
        ];
        for config in bad {
            assert!(matches!(config.validate(), Err(ResolverError::Config(_))));
        }
    }

    #[test]
    fn test_validate_accepts_minimum_rate() {
        let config = Config {
            rate_per_second: MIN_RATE_PER_SECOND,
            ..Config::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_apply_file() {
        let file: ConfigFile = toml::from_str(
            r#"
            [api]
            mailto = "lab@example.org"
            timeout_secs = 5

            [rate_limit]
            per_second = 2.5

            [pipeline]
            workers = 8

            [skip]
            extra_patterns = ["Erratum"]

            [logging]
            file = ""
            "#,
        )
        .unwrap();

        let mut config = Config::default();
        config.apply(file);
        assert_eq!(config.mailto.as_deref(), Some("lab@example.org"));
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.rate_per_second, 2.5);
        assert_eq!(config.workers, 8);
        assert_eq!(config.batch_size, 3);
        assert!(config.skip_patterns.matches_title("Erratum"));
        assert!(config.skip_patterns.matches_title("SI"));
        assert_eq!(config.log_file, None);
    }

    #[test]
    fn test_skip_patterns_replace() {
        let file: ConfigFile = toml::from_str(
            r#"
            [skip]
            patterns = ["Only This"]
            "#,
        )
        .unwrap();
        let mut config = Config::default();
        config.apply(file);
        assert_eq!(config.skip_patterns.len(), 1);
        assert!(!config.skip_patterns.matches_title("SI"));
    }

    #[test]
    fn test_merge_overlay_wins() {
        let base: ConfigFile = toml::from_str(
            r#"
            [api]
            rows = 10
            mailto = "base@example.org"
            [skip]
            extra_patterns = ["A"]
            "#,
        )
        .unwrap();
        let overlay: ConfigFile = toml::from_str(
            r#"
            [api]
            rows = 2
            [skip]
            extra_patterns = ["B"]
            "#,
        )
        .unwrap();

        let merged = merge(base, overlay);
        let api = merged.api.unwrap();
        assert_eq!(api.rows, Some(2));
        assert_eq!(api.mailto.as_deref(), Some("base@example.org"));
        assert_eq!(
            merged.skip.unwrap().extra_patterns,
            Some(vec!["A".to_string(), "B".to_string()])
        );
    }

    #[test]
    fn test_load_from_path() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.toml");
        assert!(load_from_path(&missing).unwrap().is_none());

        let broken = dir.path().join("broken.toml");
        std::fs::write(&broken, "[api\nrows = ").unwrap();
        assert!(matches!(load_from_path(&broken), Err(ResolverError::Config(_))));

        let good = dir.path().join("good.toml");
        std::fs::write(&good, "[pipeline]\nbatch_size = 7\n").unwrap();
        let file = load_from_path(&good).unwrap().unwrap();
        assert_eq!(file.pipeline.unwrap().batch_size, Some(7));
    }

    #[test]
    fn test_explicit_missing_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Config::load(Some(&dir.path().join("nope.toml"))).unwrap_err();
        assert!(matches!(err, ResolverError::Config(_)));
    }
}
