//! Service configuration loaded from environment variables.
//!
//! All values come from `CHATBOT_*` variables with sensible defaults. Invalid
//! values fall back to defaults without crashing. Relative paths resolve
//! against the working directory at startup.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |---|---|---|
//! | `CHATBOT_HOST` | 0.0.0.0 | Bind address |
//! | `CHATBOT_PORT` | 8000 | Bind port |
//! | `CHATBOT_API_PREFIX` | /api | Prefix for every route |
//! | `CHATBOT_PROJECT_NAME` | Chatbot WebUI | Reported by `/health` |
//! | `CHATBOT_DATA_DIR` | ./.state | State root |
//! | `CHATBOT_MODELS_DIR` | `<data_dir>/models` | Uploaded GGUF files |
//! | `CHATBOT_DATABASE_PATH` | `<data_dir>/chatbot.db` | SQLite database |
//! | `CHATBOT_FIXTURES_DIR` | ./fixtures | Mock chat fixtures |
//! | `CHATBOT_OPENAPI_SCHEMA_PATH` | ./openapi/schema.yaml | Served by `/spec` |
//! | `CHATBOT_RUNTIME_ROOT` | ./runtime | Runtime pack directory |
//! | `CHATBOT_VRAM_TOOL` | rocm-smi | Accelerator memory tool |
//! | `CHATBOT_RECONCILE_ON_STARTUP` | false | Clear stale active flags at boot |
//! | `CHATBOT_LOG_FORMAT` | pretty | `json` or `pretty` |
//! | `CHATBOT_LOG_LEVEL` | info | EnvFilter directive |
//! | `CHATBOT_UPLOAD_LIMIT_BYTES` | 68719476736 | Max upload request body |

use std::io;
use std::path::{Path, PathBuf};

use crate::runtime::DEFAULT_VRAM_TOOL;
use crate::telemetry::{LogConfig, LogFormat};

pub const ENV_PREFIX: &str = "CHATBOT_";

pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_UPLOAD_LIMIT: u64 = 64 * 1024 * 1024 * 1024;
const MIN_UPLOAD_LIMIT: u64 = 1024 * 1024;

/// Effective service settings.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub host: String,
    pub port: u16,
    /// Normalised: empty, or a leading slash with no trailing slash.
    pub api_prefix: String,
    pub project_name: String,
    pub data_dir: PathBuf,
    pub models_dir: PathBuf,
    pub database_path: PathBuf,
    pub fixtures_dir: PathBuf,
    pub openapi_schema_path: PathBuf,
    pub runtime_root: PathBuf,
    pub vram_tool: String,
    pub reconcile_on_startup: bool,
    pub log: LogConfig,
    pub upload_limit_bytes: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

fn parse_u16(raw: Option<String>, default: u16) -> u16 {
    raw.and_then(|v| v.trim().parse::<u16>().ok()).unwrap_or(default)
}

fn parse_u64(raw: Option<String>, default: u64) -> u64 {
    raw.and_then(|v| v.trim().parse::<u64>().ok()).unwrap_or(default)
}

fn parse_bool(raw: Option<String>, default: bool) -> bool {
    match raw.as_deref().map(|v| v.trim().to_ascii_lowercase()) {
        Some(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => true,
        Some(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => false,
        _ => default,
    }
}

fn non_empty(raw: Option<String>) -> Option<String> {
    raw.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// `"api/"` -> `"/api"`, `"/"` -> `""`.
pub fn normalize_prefix(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{trimmed}")
    }
}

fn absolutize(path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        return path;
    }
    match std::env::current_dir() {
        Ok(cwd) => cwd.join(path),
        Err(_) => path,
    }
}

/// Load settings from the process environment.
pub fn load() -> Settings {
    Settings::from_lookup(|key| std::env::var(key).ok())
}

impl Settings {
    /// Build settings from an arbitrary variable source, keyed by suffix
    /// (`"PORT"` is looked up as `CHATBOT_PORT`).
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |suffix: &str| lookup(&format!("{ENV_PREFIX}{suffix}"));
        let path_var = |suffix: &str, default: PathBuf| {
            absolutize(non_empty(var(suffix)).map(PathBuf::from).unwrap_or(default))
        };

        let data_dir = path_var("DATA_DIR", PathBuf::from(".state"));
        let models_dir = path_var("MODELS_DIR", data_dir.join("models"));
        let database_path = path_var("DATABASE_PATH", data_dir.join("chatbot.db"));

        let log_format = non_empty(var("LOG_FORMAT"))
            .and_then(|v| v.parse::<LogFormat>().ok())
            .unwrap_or_default();
        let log_level = non_empty(var("LOG_LEVEL")).unwrap_or_else(|| "info".to_string());

        let upload_limit_bytes =
            parse_u64(var("UPLOAD_LIMIT_BYTES"), DEFAULT_UPLOAD_LIMIT).max(MIN_UPLOAD_LIMIT);

        Self {
            host: non_empty(var("HOST")).unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_u16(var("PORT"), DEFAULT_PORT),
            api_prefix: normalize_prefix(&var("API_PREFIX").unwrap_or_else(|| "/api".into())),
            project_name: non_empty(var("PROJECT_NAME"))
                .unwrap_or_else(|| "Chatbot WebUI".to_string()),
            data_dir,
            models_dir,
            database_path,
            fixtures_dir: path_var("FIXTURES_DIR", PathBuf::from("fixtures")),
            openapi_schema_path: path_var(
                "OPENAPI_SCHEMA_PATH",
                PathBuf::from("openapi").join("schema.yaml"),
            ),
            runtime_root: path_var("RUNTIME_ROOT", PathBuf::from("runtime")),
            vram_tool: non_empty(var("VRAM_TOOL")).unwrap_or_else(|| DEFAULT_VRAM_TOOL.to_string()),
            reconcile_on_startup: parse_bool(var("RECONCILE_ON_STARTUP"), false),
            log: LogConfig { format: log_format, level: log_level },
            upload_limit_bytes,
        }
    }

    /// Settings rooted at `data_dir`, for tests and embedding.
    pub fn with_data_dir(data_dir: &Path) -> Self {
        let data_dir = absolutize(data_dir.to_path_buf());
        Self {
            models_dir: data_dir.join("models"),
            database_path: data_dir.join("chatbot.db"),
            runtime_root: data_dir.join("runtime"),
            data_dir,
            ..Self::default()
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Create the data, models and runtime directories.
    pub fn ensure_directories(&self) -> io::Result<()> {
        for dir in [&self.data_dir, &self.models_dir, &self.runtime_root] {
            std::fs::create_dir_all(dir)?;
        }
        if let Some(parent) = self.database_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        Ok(())
    }

    /// Every effective value as `(variable, value)` pairs.
    pub fn entries(&self) -> Vec<(String, String)> {
        let path = |p: &Path| p.display().to_string();
        [
            ("HOST", self.host.clone()),
            ("PORT", self.port.to_string()),
            ("API_PREFIX", self.api_prefix.clone()),
            ("PROJECT_NAME", self.project_name.clone()),
            ("DATA_DIR", path(&self.data_dir)),
            ("MODELS_DIR", path(&self.models_dir)),
            ("DATABASE_PATH", path(&self.database_path)),
            ("FIXTURES_DIR", path(&self.fixtures_dir)),
            ("OPENAPI_SCHEMA_PATH", path(&self.openapi_schema_path)),
            ("RUNTIME_ROOT", path(&self.runtime_root)),
            ("VRAM_TOOL", self.vram_tool.clone()),
            ("RECONCILE_ON_STARTUP", self.reconcile_on_startup.to_string()),
            ("LOG_FORMAT", self.log.format.to_string()),
            ("LOG_LEVEL", self.log.level.clone()),
            ("UPLOAD_LIMIT_BYTES", self.upload_limit_bytes.to_string()),
        ]
        .into_iter()
        .map(|(k, v)| (format!("{ENV_PREFIX}{k}"), v))
        .collect()
    }

    /// Likely misconfigurations. None of these stop the server from starting.
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.port == 0 {
            warnings.push(format!("{ENV_PREFIX}PORT is 0; the OS will pick a port"));
        }
        if !self.fixtures_dir.join("models.json").is_file() {
            warnings.push(format!(
                "{ENV_PREFIX}FIXTURES_DIR has no models.json ({}); /mock endpoints will fail",
                self.fixtures_dir.display()
            ));
        }
        if !self.openapi_schema_path.is_file() {
            warnings.push(format!(
                "{ENV_PREFIX}OPENAPI_SCHEMA_PATH does not exist ({}); /spec will fail",
                self.openapi_schema_path.display()
            ));
        }
        if which::which(&self.vram_tool).is_err() {
            warnings.push(format!(
                "{ENV_PREFIX}VRAM_TOOL '{}' not found on PATH; VRAM will not be reported",
                self.vram_tool
            ));
        }
        warnings
    }
}
