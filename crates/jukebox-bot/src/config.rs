// Configuration loading and parsing (jury.toml, credentials.toml).

use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },
}

// ---------------------------------------------------------------------------
// Top-level assembled Config
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct Config {
    pub telegram: TelegramConfig,
    pub game: GameConfig,
    pub results: ResultsConfig,
    pub credentials: CredentialsConfig,
}

// ---------------------------------------------------------------------------
// jury.toml structs
// ---------------------------------------------------------------------------

/// Raw deserialization target for the entire jury.toml file.
#[derive(Debug, Clone, Deserialize)]
struct JuryFile {
    telegram: TelegramConfig,
    #[serde(default)]
    game: GameConfig,
    results: ResultsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TelegramConfig {
    /// Group chat the game is played in.
    pub chat_id: i64,
    #[serde(default = "default_poll_timeout_secs")]
    pub poll_timeout_secs: u64,
    #[serde(default = "default_api_url")]
    pub api_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GameConfig {
    /// Keep arrival order and skip reveal pacing.
    #[serde(default)]
    pub deterministic: bool,
    #[serde(default = "default_rating_scale")]
    pub rating_scale: u32,
    /// Upper bound of the random delay before each revealed review.
    #[serde(default = "default_review_pacing_max_ms")]
    pub review_pacing_max_ms: u64,
}

impl Default for GameConfig {
    fn default() -> Self {
        GameConfig {
            deterministic: false,
            rating_scale: default_rating_scale(),
            review_pacing_max_ms: default_review_pacing_max_ms(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultsSink {
    Directory,
    Stdout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultsFormat {
    Html,
    Csv,
    Json,
}

impl ResultsFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ResultsFormat::Html => "html",
            ResultsFormat::Csv => "csv",
            ResultsFormat::Json => "json",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResultsConfig {
    pub sink: ResultsSink,
    /// Where result files are written. Defaults to the user's home directory.
    #[serde(default)]
    pub directory: Option<String>,
    /// Base URL the results directory is served under.
    pub public_url: String,
    #[serde(default = "default_results_format")]
    pub format: ResultsFormat,
}

impl ResultsConfig {
    /// The configured directory, else the home directory, else the system
    /// temp directory.
    pub fn resolved_directory(&self) -> PathBuf {
        if let Some(dir) = &self.directory {
            return PathBuf::from(dir);
        }
        match directories::BaseDirs::new() {
            Some(dirs) => dirs.home_dir().to_path_buf(),
            None => {
                tracing::error!("Failed to get home directory, falling back to temp dir");
                std::env::temp_dir()
            }
        }
    }
}

fn default_poll_timeout_secs() -> u64 {
    30
}

fn default_api_url() -> String {
    "https://api.telegram.org".to_string()
}

fn default_rating_scale() -> u32 {
    10
}

fn default_review_pacing_max_ms() -> u64 {
    800
}

fn default_results_format() -> ResultsFormat {
    ResultsFormat::Html
}

// ---------------------------------------------------------------------------
// credentials.toml structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, Default)]
pub struct CredentialsConfig {
    pub bot_token: Option<String>,
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate configuration from `config/jury.toml` and (optionally)
/// `config/credentials.toml`, both relative to the given `base_dir`.
///
/// This is the lower-level loading primitive that does not auto-copy defaults.
/// Prefer `load_config()` which handles default initialization automatically.
pub(crate) fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let config_dir = base_dir.join("config");

    // --- jury.toml (required) ---
    let jury_path = config_dir.join("jury.toml");
    let jury_text = read_file(&jury_path)?;
    let jury_file: JuryFile = toml::from_str(&jury_text).map_err(|e| ConfigError::ParseError {
        path: jury_path.clone(),
        source: e,
    })?;

    // --- credentials.toml (optional file, token checked in validate) ---
    let credentials_path = config_dir.join("credentials.toml");
    let credentials = if credentials_path.exists() {
        let cred_text = read_file(&credentials_path)?;
        toml::from_str(&cred_text).map_err(|e| ConfigError::ParseError {
            path: credentials_path.clone(),
            source: e,
        })?
    } else {
        CredentialsConfig::default()
    };

    let config = Config {
        telegram: jury_file.telegram,
        game: jury_file.game,
        results: jury_file.results,
        credentials,
    };

    validate(&config)?;

    Ok(config)
}

const JURY_FILE: &str = "jury.toml";
const CREDENTIALS_FILE: &str = "credentials.toml";
const CREDENTIALS_TEMPLATE: &str = "credentials.toml.example";

/// What first-run initialization did to `config/`.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ConfigInit {
    /// `config/jury.toml`, when it was created from the shipped defaults.
    pub created_jury: Option<PathBuf>,
    /// The template to fill in, when `config/credentials.toml` is still
    /// missing. The token is never copied in automatically.
    pub credentials_template: Option<PathBuf>,
}

/// Create `config/jury.toml` from `defaults/` when it is missing and report
/// whether the credentials still have to be written by hand.
pub fn ensure_config_files(base_dir: &Path) -> Result<ConfigInit, ConfigError> {
    let defaults_dir = base_dir.join("defaults");
    let config_dir = base_dir.join("config");
    let jury_path = config_dir.join(JURY_FILE);
    let mut init = ConfigInit::default();

    if !jury_path.exists() {
        let default_jury = defaults_dir.join(JURY_FILE);
        if !default_jury.is_file() {
            return Err(ConfigError::DefaultsCopyError {
                message: format!(
                    "no config/{JURY_FILE} and no defaults/{JURY_FILE} in {}; \
                     pass the bot directory as the first argument",
                    base_dir.display()
                ),
            });
        }
        std::fs::create_dir_all(&config_dir).map_err(|e| ConfigError::DefaultsCopyError {
            message: format!("failed to create {}: {e}", config_dir.display()),
        })?;
        if copy_new(&default_jury, &jury_path)? {
            init.created_jury = Some(jury_path);
        }
    }

    if !config_dir.join(CREDENTIALS_FILE).exists() {
        let template = defaults_dir.join(CREDENTIALS_TEMPLATE);
        if template.is_file() {
            init.credentials_template = Some(template);
        }
    }

    Ok(init)
}

/// Copy `from` to `to` unless `to` already exists. Returns whether a copy
/// was made.
fn copy_new(from: &Path, to: &Path) -> Result<bool, ConfigError> {
    let copy_err = |e: std::io::Error| ConfigError::DefaultsCopyError {
        message: format!("failed to copy {} to {}: {e}", from.display(), to.display()),
    };

    let mut dest = match std::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(to)
    {
        Ok(dest) => dest,
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => return Ok(false),
        Err(e) => return Err(copy_err(e)),
    };
    let content = std::fs::read(from).map_err(copy_err)?;
    std::io::Write::write_all(&mut dest, &content).map_err(copy_err)?;
    Ok(true)
}

/// Create missing config from `base_dir/defaults/`, then load and validate.
pub fn load_config(base_dir: &Path) -> Result<Config, ConfigError> {
    let init = ensure_config_files(base_dir)?;
    if let Some(path) = &init.created_jury {
        info!("Created {} from defaults", path.display());
    }
    if let Some(template) = &init.credentials_template {
        warn!(
            "config/{CREDENTIALS_FILE} is missing; copy {} there and set bot_token",
            template.display()
        );
    }
    load_config_from(base_dir)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.telegram.chat_id == 0 {
        return Err(ConfigError::ValidationError {
            field: "telegram.chat_id".into(),
            message: "must be set to the group chat id".into(),
        });
    }

    let timeout = config.telegram.poll_timeout_secs;
    if !(1..=50).contains(&timeout) {
        return Err(ConfigError::ValidationError {
            field: "telegram.poll_timeout_secs".into(),
            message: format!("must be between 1 and 50 inclusive, got {timeout}"),
        });
    }

    if config.game.rating_scale == 0 {
        return Err(ConfigError::ValidationError {
            field: "game.rating_scale".into(),
            message: "must be greater than 0".into(),
        });
    }

    if config.results.public_url.trim().is_empty() {
        return Err(ConfigError::ValidationError {
            field: "results.public_url".into(),
            message: "must not be empty".into(),
        });
    }

    match config.credentials.bot_token.as_deref() {
        Some(token) if !token.trim().is_empty() => {}
        _ => {
            return Err(ConfigError::ValidationError {
                field: "credentials.bot_token".into(),
                message: "missing; copy defaults/credentials.toml.example to \
                          config/credentials.toml and fill it in"
                    .into(),
            });
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
