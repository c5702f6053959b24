use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info, warn};
use serde::Deserialize;

use super::types::*;
use crate::error_handling::types::ConfigError;
use crate::path_resolution::types::validate_segment;
use crate::path_resolution::RemoteLayout;
use crate::remote::SourceDescriptor;

/// Environment variable naming the configuration file when none is given on
/// the command line.
pub const CONFIG_ENV: &str = "KILLFEED_CONFIG";

/// Application configuration structure that defines all runtime parameters.
///
/// Loaded from a TOML file. Every section is optional and falls back to its
/// defaults, except `[[sources]]` which lists the servers to poll.
///
/// # Examples
///
/// ```
/// use killfeed::configuration::config::Config;
///
/// let text = r#"
/// [transport]
/// kind = "local"
/// root = "/srv/mirror"
///
/// [[sources]]
/// id = "1"
/// host = "10.0.0.1"
/// "#;
/// let config: Config = text.parse().unwrap();
/// assert_eq!(config.sources.len(), 1);
/// assert_eq!(config.ingest.tick_interval_secs, 60);
/// ```
///
/// # Fields Overview
///
/// - `ingest`: tick interval, scan timeout and read cap of the coordinator
/// - `connection`: timeouts, retry policy and maintenance interval of the pool
/// - `layout`: where servers keep their log and data files
/// - `storage`: backend receiving events and watermarks
/// - `web`: operator API
/// - `transport`: how remote files are reached
/// - `sources`: the servers to poll
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub ingest: IngestSection,
    pub connection: ConnectionSection,
    pub layout: RemoteLayout,
    pub storage: StorageSection,
    pub web: WebSection,
    pub transport: TransportSection,
    pub sources: Vec<SourceEntry>,
}

impl Config {
    /// Reads and validates the configuration file at `path`.
    pub fn from_file(path: &Path) -> Result<Config, ConfigError> {
        info!("Loading configuration from {}", path.display());
        let content = fs::read_to_string(path)?;
        content.parse()
    }

    /// Path from `KILLFEED_CONFIG`, if set and non-empty.
    pub fn path_from_env() -> Option<PathBuf> {
        std::env::var(CONFIG_ENV)
            .ok()
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from)
    }

    /// Checks ranges, identifiers and paths.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ingest.tick_interval_secs == 0 {
            return Err(ConfigError::NotInRange(
                "ingest.tick_interval_secs must be at least 1".to_string(),
            ));
        }
        if self.ingest.scan_timeout_secs == 0 {
            return Err(ConfigError::NotInRange(
                "ingest.scan_timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.ingest.max_read_bytes == Some(0) {
            return Err(ConfigError::NotInRange(
                "ingest.max_read_bytes must be positive".to_string(),
            ));
        }

        let c = &self.connection;
        for (name, value) in [
            ("connect_timeout_secs", c.connect_timeout_secs),
            ("operation_timeout_secs", c.operation_timeout_secs),
            ("health_timeout_secs", c.health_timeout_secs),
            ("maintenance_interval_secs", c.maintenance_interval_secs),
        ] {
            if value == 0 {
                return Err(ConfigError::NotInRange(format!(
                    "connection.{} must be at least 1",
                    name
                )));
            }
        }
        if c.max_attempts == 0 || c.max_attempts > 20 {
            return Err(ConfigError::NotInRange(
                "connection.max_attempts must be between 1 and 20".to_string(),
            ));
        }
        if c.initial_delay_ms > c.max_delay_ms {
            return Err(ConfigError::NotInRange(
                "connection.initial_delay_ms exceeds max_delay_ms".to_string(),
            ));
        }

        self.layout
            .validate()
            .map_err(|e| ConfigError::BadPath(format!("layout: {}", e)))?;

        if self.web.enabled && self.web.port == 0 {
            return Err(ConfigError::NotInRange("web.port must not be 0".to_string()));
        }

        match self.transport.kind {
            TransportKind::Local if self.transport.root.is_none() => {
                return Err(ConfigError::BadPath(
                    "transport.root is required by the local transport".to_string(),
                ));
            }
            TransportKind::Sftp if !cfg!(feature = "sftp") => {
                return Err(ConfigError::UnsupportedTransport(
                    "sftp (built without the `sftp` feature)".to_string(),
                ));
            }
            _ => {}
        }

        self.validate_sources()
    }

    fn validate_sources(&self) -> Result<(), ConfigError> {
        let mut seen = HashSet::new();
        for source in &self.sources {
            if source.id.trim().is_empty() {
                return Err(ConfigError::SourcesInvalid("empty source id".to_string()));
            }
            if !seen.insert(source.id.as_str()) {
                return Err(ConfigError::SourcesInvalid(format!(
                    "duplicate source id {}",
                    source.id
                )));
            }
            if source.host.trim().is_empty() {
                return Err(ConfigError::SourcesInvalid(format!(
                    "source {} has no host",
                    source.id
                )));
            }
            if source.port == 0 {
                return Err(ConfigError::NotInRange(format!(
                    "source {} port must not be 0",
                    source.id
                )));
            }
            let descriptor = source.to_descriptor();
            validate_segment(descriptor.endpoint.bare_host())
                .and_then(|_| validate_segment(descriptor.path_id()))
                .map_err(|e| ConfigError::BadPath(format!("source {}: {}", source.id, e)))?;
            if descriptor.credentials.is_none() {
                warn!("Source {} has no usable credentials; it will start disabled", source.id);
            }
        }
        Ok(())
    }

    pub fn source_descriptors(&self) -> Vec<SourceDescriptor> {
        self.sources.iter().map(SourceEntry::to_descriptor).collect()
    }
}

impl std::str::FromStr for Config {
    type Err = ConfigError;

    /// Parses and validates TOML text.
    fn from_str(content: &str) -> Result<Self, Self::Err> {
        let config: Config =
            toml::from_str(content).map_err(|e| ConfigError::TomlError(e.to_string()))?;
        config.validate()?;
        debug!("Configuration has {} source(s)", config.sources.len());
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;
    use std::time::Duration;
    use tempfile::NamedTempFile;

    const LOCAL: &str = "[transport]\nkind = \"local\"\nroot = \"/srv/mirror\"\n";

    fn parse(extra: &str) -> Result<Config, ConfigError> {
        format!("{}{}", LOCAL, extra).parse()
    }

    #[test]
    fn test_full_file() {
        let config = parse(
            r#"
[ingest]
tick_interval_secs = 30
max_read_bytes = 1048576

[connection]
max_attempts = 5
initial_delay_ms = 10
max_delay_ms = 100

[layout]
data_subdir = "actual2/deathlogs"

[storage]
backend = "database"
path = "/var/lib/killfeed/events.sqlite3"

[web]
enabled = true
port = 9000

[[sources]]
id = "1"
host = "10.0.0.1:8822"
port = 8822
username = "admin"
password = "secret"
alt_id = "7020"

[[sources]]
id = "2"
host = "10.0.0.2"
"#,
        )
        .unwrap();

        assert_eq!(config.ingest.to_settings().tick_interval, Duration::from_secs(30));
        assert_eq!(config.ingest.max_read_bytes, Some(1_048_576));
        let settings = config.connection.to_settings();
        assert_eq!(settings.retry.max_attempts, 5);
        assert_eq!(settings.retry.max_delay, Duration::from_millis(100));
        assert_eq!(config.layout.data_subdir, "actual2/deathlogs");
        assert_eq!(config.layout.log_subpath, "Logs/Deadside.log");
        assert_eq!(config.storage.backend, crate::storage::types::StorageBackend::Database);
        assert_eq!(config.web.port, 9000);

        let sources = config.source_descriptors();
        assert_eq!(sources[0].path_id(), "7020");
        assert_eq!(sources[0].endpoint.bare_host(), "10.0.0.1");
        assert_eq!(sources[0].credentials.as_ref().unwrap().username, "admin");
        assert_eq!(sources[1].endpoint.port, 22);
        assert!(sources[1].credentials.is_none());
    }

    #[test]
    fn test_defaults() {
        let config = parse("").unwrap();
        assert_eq!(config.ingest, IngestSection::default());
        assert_eq!(config.connection, ConnectionSection::default());
        assert!(!config.web.enabled);
        assert!(config.sources.is_empty());
    }

    #[test]
    fn test_invalid_values() {
        assert!(matches!(
            parse("[ingest]\ntick_interval_secs = 0\n"),
            Err(ConfigError::NotInRange(_))
        ));
        assert!(matches!(
            parse("[connection]\ninitial_delay_ms = 5000\nmax_delay_ms = 10\n"),
            Err(ConfigError::NotInRange(_))
        ));
        assert!(matches!(
            parse("[layout]\ndata_subdir = \"../etc\"\n"),
            Err(ConfigError::BadPath(_))
        ));
        assert!(matches!(
            parse("[[sources]]\nid = \"1\"\nhost = \"h\"\n[[sources]]\nid = \"1\"\nhost = \"h\"\n"),
            Err(ConfigError::SourcesInvalid(_))
        ));
        assert!(matches!(
            parse("[[sources]]\nid = \"1\"\nhost = \"h\"\nalt_id = \"../x\"\n"),
            Err(ConfigError::BadPath(_))
        ));
        assert!(matches!(
            parse("[ingest]\nunknown = 1\n"),
            Err(ConfigError::TomlError(_))
        ));
        assert!(matches!(
            "[transport]\nkind = \"local\"\n".parse::<Config>(),
            Err(ConfigError::BadPath(_))
        ));
    }

    #[cfg(not(feature = "sftp"))]
    #[test]
    fn test_sftp_needs_the_feature() {
        assert!(matches!(
            "".parse::<Config>(),
            Err(ConfigError::UnsupportedTransport(_))
        ));
    }

    #[test]
    fn test_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{}[[sources]]\nid = \"1\"\nhost = \"h\"\n", LOCAL).unwrap();
        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.sources.len(), 1);

        assert!(matches!(
            Config::from_file(Path::new("/nonexistent/killfeed.toml")),
            Err(ConfigError::IoError(_))
        ));
    }

    #[test]
    #[serial]
    fn test_password_from_env() {
        std::env::set_var("KILLFEED_TEST_PASSWORD", "from-env");
        let config = parse(
            "[[sources]]\nid = \"1\"\nhost = \"h\"\nusername = \"u\"\npassword_env = \"KILLFEED_TEST_PASSWORD\"\n",
        )
        .unwrap();
        let credentials = config.source_descriptors()[0].credentials.clone().unwrap();
        assert_eq!(credentials.password, "from-env");

        std::env::remove_var("KILLFEED_TEST_PASSWORD");
        assert!(config.source_descriptors()[0].credentials.is_none());
    }

    #[test]
    #[serial]
    fn test_path_from_env() {
        std::env::set_var(CONFIG_ENV, "/etc/killfeed.toml");
        assert_eq!(Config::path_from_env(), Some(PathBuf::from("/etc/killfeed.toml")));
        std::env::set_var(CONFIG_ENV, " ");
        assert_eq!(Config::path_from_env(), None);
        std::env::remove_var(CONFIG_ENV);
        assert_eq!(Config::path_from_env(), None);
    }
}
