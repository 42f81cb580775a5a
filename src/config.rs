//! Configuring the network map service.

use std::fmt;
use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use jiff::Span;
use serde::{Deserialize, Serialize};

/// The daemon's configuration, as loaded from `--config` (TOML) and
/// overridden by command-line flags.
///
/// Every field and default here is named in `spec.md` §6; `username`/
/// `password`/`tls*`/`hostname`/`doorman`/`certman`/`pkix` are accepted and
/// stored even though the subsystems they'd configure (authentication,
/// TLS termination, doorman/certman/PKIX) are out of scope for this crate,
/// so that a config file written against the full specification still
/// loads cleanly.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub port: u16,
    pub db_dir: Utf8PathBuf,
    pub notary_dir: Utf8PathBuf,
    pub cache_timeout: Span,
    pub param_update_delay: Span,
    pub network_map_delay: Span,
    pub username: Option<String>,
    pub password: Option<String>,
    pub tls: bool,
    pub tls_cert_path: Option<Utf8PathBuf>,
    pub tls_key_path: Option<Utf8PathBuf>,
    pub hostname: String,
    pub doorman: bool,
    pub certman: bool,
    pub pkix: bool,
    /// Either the literal `embed` (the only backend this crate implements)
    /// or a real connection string, which is accepted by the config
    /// format but rejected at startup — see `DbBackend::resolve`.
    pub mongodb_connection_string: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            port: 8080,
            db_dir: Utf8PathBuf::from(".db"),
            notary_dir: Utf8PathBuf::from("notary-certificates"),
            cache_timeout: Span::new().seconds(2),
            param_update_delay: Span::new().seconds(10),
            network_map_delay: Span::new().seconds(1),
            username: None,
            password: None,
            tls: false,
            tls_cert_path: None,
            tls_key_path: None,
            hostname: hostname::get()
                .ok()
                .and_then(|h| h.into_string().ok())
                .unwrap_or_else(|| "localhost".to_string()),
            doorman: false,
            certman: false,
            pkix: false,
            mongodb_connection_string: "embed".to_string(),
        }
    }
}

/// The embedded-database backend the config resolves to.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DbBackend {
    /// The bundled `redb` database, rooted at `db_dir`.
    Embedded,
}

/// `mongodb.connectionString` named something other than the literal
/// `embed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnsupportedBackend(pub String);

impl fmt::Display for UnsupportedBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unsupported mongodb.connectionString '{}': only the literal 'embed' is implemented",
            self.0
        )
    }
}

impl Config {
    pub fn db_backend(&self) -> Result<DbBackend, UnsupportedBackend> {
        if self.mongodb_connection_string == "embed" {
            Ok(DbBackend::Embedded)
        } else {
            Err(UnsupportedBackend(self.mongodb_connection_string.clone()))
        }
    }

    /// Load a configuration file, applying its values on top of
    /// [`Config::default`]. Unset fields in the file fall back to the
    /// default rather than requiring every key to be present.
    pub fn load_from_file(path: &Utf8Path) -> Result<Self, String> {
        let text = fs::read_to_string(path).map_err(|e| format!("{path}: {e}"))?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self, String> {
        let raw: RawConfig = toml::from_str(text).map_err(|e| e.to_string())?;
        raw.resolve()
    }
}

/// The as-written TOML shape: every field optional, defaults supplied by
/// [`Config::default`] after parsing. Durations are accepted as ISO-8601
/// duration fragments (e.g. `"PT2S"`) or jiff's friendly form (`"2s"`).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RawConfig {
    port: Option<u16>,
    #[serde(rename = "db.dir")]
    db_dir: Option<Utf8PathBuf>,
    #[serde(rename = "notary.dir")]
    notary_dir: Option<Utf8PathBuf>,
    #[serde(rename = "cache.timeout")]
    cache_timeout: Option<String>,
    #[serde(rename = "paramUpdate.delay")]
    param_update_delay: Option<String>,
    #[serde(rename = "networkMap.delay")]
    network_map_delay: Option<String>,
    username: Option<String>,
    password: Option<String>,
    tls: Option<bool>,
    #[serde(rename = "tls.cert.path")]
    tls_cert_path: Option<Utf8PathBuf>,
    #[serde(rename = "tls.key.path")]
    tls_key_path: Option<Utf8PathBuf>,
    hostname: Option<String>,
    doorman: Option<bool>,
    certman: Option<bool>,
    pkix: Option<bool>,
    #[serde(rename = "mongodb.connectionString")]
    mongodb_connection_string: Option<String>,
}

impl RawConfig {
    fn resolve(self) -> Result<Config, String> {
        let defaults = Config::default();
        let parse_span = |field: &str, value: Option<String>, default: Span| -> Result<Span, String> {
            match value {
                None => Ok(default),
                Some(s) => s
                    .parse::<Span>()
                    .map_err(|e| format!("invalid duration for '{field}': {s} ({e})")),
            }
        };

        Ok(Config {
            port: self.port.unwrap_or(defaults.port),
            db_dir: self.db_dir.unwrap_or(defaults.db_dir),
            notary_dir: self.notary_dir.unwrap_or(defaults.notary_dir),
            cache_timeout: parse_span("cache.timeout", self.cache_timeout, defaults.cache_timeout)?,
            param_update_delay: parse_span(
                "paramUpdate.delay",
                self.param_update_delay,
                defaults.param_update_delay,
            )?,
            network_map_delay: parse_span(
                "networkMap.delay",
                self.network_map_delay,
                defaults.network_map_delay,
            )?,
            username: self.username.or(defaults.username),
            password: self.password.or(defaults.password),
            tls: self.tls.unwrap_or(defaults.tls),
            tls_cert_path: self.tls_cert_path.or(defaults.tls_cert_path),
            tls_key_path: self.tls_key_path.or(defaults.tls_key_path),
            hostname: self.hostname.unwrap_or(defaults.hostname),
            doorman: self.doorman.unwrap_or(defaults.doorman),
            certman: self.certman.unwrap_or(defaults.certman),
            pkix: self.pkix.unwrap_or(defaults.pkix),
            mongodb_connection_string: self
                .mongodb_connection_string
                .unwrap_or(defaults.mongodb_connection_string),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let config = Config::default();
        assert_eq!(config.port, 8080);
        assert_eq!(config.db_dir, Utf8PathBuf::from(".db"));
        assert_eq!(config.notary_dir, Utf8PathBuf::from("notary-certificates"));
        assert_eq!(config.cache_timeout, Span::new().seconds(2));
        assert_eq!(config.param_update_delay, Span::new().seconds(10));
        assert_eq!(config.network_map_delay, Span::new().seconds(1));
        assert_eq!(config.mongodb_connection_string, "embed");
    }

    #[test]
    fn parses_overrides_and_keeps_other_defaults() {
        let config = Config::parse(
            r#"
            port = 9090
            "paramUpdate.delay" = "PT1M"
            "#,
        )
        .unwrap();
        assert_eq!(config.port, 9090);
        assert_eq!(config.param_update_delay, Span::new().minutes(1));
        assert_eq!(config.network_map_delay, Span::new().seconds(1));
    }

    #[test]
    fn rejects_unsupported_backend() {
        let config = Config::parse(r#"mongodb.connectionString = "mongodb://example""#).unwrap();
        assert!(config.db_backend().is_err());
    }
}
