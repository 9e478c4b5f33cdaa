use std::collections::HashMap;
use std::path::{Path, PathBuf};

use wordwise_algo::{IntervalPolicy, SchedulerConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    JsonFile,
    Sqlite,
}

impl StoreBackend {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "memory" | "mem" => Some(StoreBackend::Memory),
            "json" | "file" | "json_file" => Some(StoreBackend::JsonFile),
            "sqlite" | "db" => Some(StoreBackend::Sqlite),
            _ => None,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            StoreBackend::Memory => "memory",
            StoreBackend::JsonFile => "json",
            StoreBackend::Sqlite => "sqlite",
        }
    }
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub backend: StoreBackend,
    /// Directory for the JSON backend, database file for SQLite
    pub data_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// `EnvFilter` directives
    pub level: String,
    /// Daily log files go here when set
    pub file_dir: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub storage: StorageConfig,
    pub scheduler: SchedulerConfig,
    pub daily_review_limit: Option<usize>,
    pub logging: LogConfig,
}

impl Config {
    /// Read the environment, with `.env` in the working directory as a fallback
    pub fn load() -> Self {
        Self::load_from(".env")
    }

    /// Read the environment, falling back to the pairs in the dotenv file at
    /// `path`. A missing or unreadable file counts as empty. The process
    /// environment itself is never modified.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Self {
        let file_vars: HashMap<String, String> = match dotenvy::from_path_iter(path.as_ref()) {
            Ok(pairs) => pairs.filter_map(Result::ok).collect(),
            Err(_) => HashMap::new(),
        };
        Self::from_vars(|key| std::env::var(key).ok().or_else(|| file_vars.get(key).cloned()))
    }

    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    pub fn from_vars<F>(var: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let backend = var("WORDWISE_STORE")
            .and_then(|value| StoreBackend::parse(&value))
            .unwrap_or(StoreBackend::Memory);

        let data_path = var("WORDWISE_DATA_PATH")
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| default_data_path(backend));

        let defaults = SchedulerConfig::default();
        let scheduler = SchedulerConfig {
            policy: var("WORDWISE_INTERVAL_POLICY")
                .and_then(|value| IntervalPolicy::parse(&value))
                .unwrap_or(defaults.policy),
            mastery_threshold: parse_var(&var, "WORDWISE_MASTERY_THRESHOLD")
                .filter(|&value: &u32| value > 0)
                .unwrap_or(defaults.mastery_threshold),
            mastery_interval_days: parse_var(&var, "WORDWISE_MASTERY_INTERVAL_DAYS")
                .filter(|&value: &u32| value > 0)
                .unwrap_or(defaults.mastery_interval_days),
            retirement_quarantine_days: parse_var(&var, "WORDWISE_RETIREMENT_DAYS")
                .unwrap_or(defaults.retirement_quarantine_days),
        };

        let daily_review_limit = parse_var(&var, "WORDWISE_DAILY_REVIEW_LIMIT");

        let file_logs = var("ENABLE_FILE_LOGS").is_some_and(|value| {
            let value = value.trim();
            value == "1" || value.eq_ignore_ascii_case("true")
        });
        let logging = LogConfig {
            level: var("RUST_LOG").unwrap_or_else(|| "info".to_string()),
            file_dir: file_logs.then(|| {
                var("LOG_DIR")
                    .filter(|value| !value.trim().is_empty())
                    .map_or_else(|| PathBuf::from("./logs"), PathBuf::from)
            }),
        };

        Self {
            storage: StorageConfig { backend, data_path },
            scheduler,
            daily_review_limit,
            logging,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::from_vars(|_| None)
    }
}

fn parse_var<F, T>(var: &F, key: &str) -> Option<T>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    var(key).and_then(|value| value.trim().parse::<T>().ok())
}

fn default_data_path(backend: StoreBackend) -> PathBuf {
    match backend {
        StoreBackend::Sqlite => PathBuf::from("./data/wordwise.db"),
        _ => PathBuf::from("./data"),
    }
}
