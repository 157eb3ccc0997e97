//! Configuration surface (SPEC_FULL.md §6). Replaces the dynamic
//! `DatabaseConfig` object of the reference implementation with an explicit
//! struct whose recognized options are fixed, loaded the way the teacher's
//! `control` crate layers `config::File` + `config::Environment`.

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::Deserialize;
use url::Url;

/// Characters that must survive unescaped in a Postgres DSN's password
/// segment; everything else in `NON_ALPHANUMERIC` is escaped.
const DSN_SAFE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_scheme")]
    pub scheme: String,
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub user: String,
    pub password: String,
    pub database: String,
    #[serde(default = "default_schema")]
    pub schema: String,
}

fn default_scheme() -> String {
    "postgres".to_string()
}

fn default_port() -> u16 {
    5432
}

fn default_schema() -> String {
    "public".to_string()
}

impl DatabaseConfig {
    /// Composes a connection DSN with the password percent-escaped, so a
    /// password containing `:`, `@`, or `/` cannot corrupt the URL shape.
    pub fn dsn(&self) -> String {
        let escaped_password = utf8_percent_encode(&self.password, DSN_SAFE);
        format!(
            "{}://{}:{}@{}:{}/{}?options=-c search_path={}",
            self.scheme, self.user, escaped_password, self.host, self.port, self.database, self.schema
        )
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct SourceApiKeys {
    pub openalex: Option<String>,
    pub scopus: Option<String>,
    pub wos: Option<String>,
    pub pubmed: Option<String>,
    pub dimensions: Option<String>,
    pub s2: Option<String>,
    pub lexisnexis: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    pub database: DatabaseConfig,
    pub solr_url: Option<Url>,
    #[serde(default)]
    pub api_keys: SourceApiKeys,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(transparent)]
    Load(#[from] config::ConfigError),
}

/// Loads [`Settings`] from an optional `config/<file>.yaml`/`.toml` plus
/// environment variables prefixed `CORPUSDB_`, with `__` as the nested-key
/// separator (e.g. `CORPUSDB_DATABASE__HOST`). Mirrors the teacher's
/// `config::Environment::with_prefix("CONTROL")` pattern.
pub fn load(config_file: Option<&str>) -> Result<Settings, ConfigError> {
    let mut builder = config::Config::builder();
    if let Some(path) = config_file {
        builder = builder.add_source(config::File::with_name(path).required(false));
    }
    builder = builder.add_source(
        config::Environment::with_prefix("CORPUSDB")
            .separator("__")
            .try_parsing(true),
    );
    Ok(builder.build()?.try_deserialize()?)
}
