//! Configuration loading from command line and disk.
//!
//! The command line describes the `"default"` domain only; a TOML config
//! file may describe any number of domains. When both are given, file
//! values take precedence over command-line values.

use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser;

use crate::config::schema::{Config, DomainConfig, DEFAULT_DOMAIN};
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", format_errors(.0))]
    Validation(Vec<ValidationError>),
}

fn format_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Command-line flags. Everything but `--conf` configures the default domain.
#[derive(Debug, Parser)]
#[command(name = "multihost", about = "A multi-tenant HTTP file server")]
pub struct Cli {
    /// Host to listen on.
    #[arg(long, default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on.
    #[arg(long, default_value_t = 8080)]
    pub port: u16,

    /// The directory to serve files from.
    #[arg(long, default_value = ".")]
    pub root: PathBuf,

    /// Timeout in seconds for read/write.
    #[arg(long, default_value_t = 240)]
    pub timeout: u64,

    /// Full path for a htpasswd file used for authentication.
    #[arg(long)]
    pub htpasswd: Option<PathBuf>,

    /// Path to upload files.
    #[arg(long, default_value = "/u/")]
    pub upath: String,

    /// Path to extract files.
    #[arg(long, default_value = "/e/")]
    pub epath: String,

    /// Max size for uploaded files.
    #[arg(long, default_value_t = 10 << 20)]
    pub maxupload: u64,

    /// Path for the tls certificate file.
    #[arg(long)]
    pub certfile: Option<PathBuf>,

    /// Path for the tls key file.
    #[arg(long)]
    pub keyfile: Option<PathBuf>,

    /// Returns the index.html instead of listing a directory.
    #[arg(long, default_value_t = false)]
    pub default_to_index: bool,

    /// Refuse uploads that would overwrite an existing file.
    #[arg(long, default_value_t = false)]
    pub prevent_overwrite: bool,

    /// Path for the configuration file.
    #[arg(long)]
    pub conf: Option<PathBuf>,
}

impl Cli {
    fn into_config(self) -> (Config, Option<PathBuf>) {
        let default_domain = DomainConfig {
            port: self.port,
            root_dir: self.root,
            upload_path: self.upath,
            extract_path: self.epath,
            max_upload_size: self.maxupload,
            timeout_secs: self.timeout,
            default_to_index: self.default_to_index,
            cert_file: self.certfile,
            key_file: self.keyfile,
            prevent_overwrite: self.prevent_overwrite,
            htpasswd_file: self.htpasswd,
            ..DomainConfig::default()
        };
        let mut config = Config {
            listen_host: self.host,
            ..Config::default()
        };
        config
            .domains
            .insert(DEFAULT_DOMAIN.to_string(), default_domain);
        (config, self.conf)
    }
}

/// Load and validate the configuration from the process command line,
/// merging in a TOML file when `--conf` is given.
pub fn load_config() -> Result<Config, ConfigError> {
    load_from_cli(Cli::parse())
}

/// Load and validate configuration from pre-parsed flags.
pub fn load_from_cli(cli: Cli) -> Result<Config, ConfigError> {
    let (mut config, conf_path) = cli.into_config();
    if let Some(path) = conf_path {
        let file_config = read_config_file(&path)?;
        merge_file_config(&mut config, file_config);
    }
    finalize(config)
}

/// Parse a TOML configuration file.
pub fn read_config_file(path: &Path) -> Result<Config, ConfigError> {
    let content = fs::read_to_string(path)?;
    let config: Config = toml::from_str(&content)?;
    Ok(config)
}

/// Overlay file-provided values onto the command-line config.
/// Domains defined in the file replace their command-line counterparts.
fn merge_file_config(config: &mut Config, file: Config) {
    if file.listen_host != Config::default().listen_host {
        config.listen_host = file.listen_host;
    }
    for (name, domain) in file.domains {
        config.domains.insert(name, domain);
    }
}

/// Fill derived fields and validate.
fn finalize(mut config: Config) -> Result<Config, ConfigError> {
    config
        .domains
        .entry(DEFAULT_DOMAIN.to_string())
        .or_default();
    for (name, domain) in config.domains.iter_mut() {
        domain.host = name.to_lowercase();
    }
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}
