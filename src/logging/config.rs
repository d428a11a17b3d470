use std::{env, fmt, path::PathBuf, str::FromStr};

use serde::{Deserialize, Serialize};

use super::LoggingError;

/// Допустимые уровни логирования.
pub const LEVELS: [&str; 6] = ["trace", "debug", "info", "warn", "error", "off"];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
    #[default]
    Compact,
}

/// Настройки логирования.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Уровень для крейтов `aclstore` и `aclctl`.
    pub level: String,
    pub format: LogFormat,
    /// Писать ли в stderr.
    pub console_enabled: bool,
    pub with_ansi: bool,
    pub with_target: bool,
    /// Каталог для ежедневно ротируемого файла; `None`: без файла.
    pub log_dir: Option<PathBuf>,
    pub file_name: String,
}

impl LoggingConfig {
    /// Переопределения из окружения: `ACLSTORE_LOG_LEVEL`,
    /// `ACLSTORE_LOG_FORMAT`, `ACLSTORE_LOG_DIR`.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(level) = env::var("ACLSTORE_LOG_LEVEL") {
            self.level = level.to_lowercase();
        }
        if let Ok(format) = env::var("ACLSTORE_LOG_FORMAT") {
            if let Ok(format) = format.parse() {
                self.format = format;
            }
        }
        if let Ok(dir) = env::var("ACLSTORE_LOG_DIR") {
            self.log_dir = Some(PathBuf::from(dir));
        }
    }

    pub fn validate(&self) -> Result<(), LoggingError> {
        if !LEVELS.contains(&self.level.as_str()) {
            return Err(LoggingError::InvalidLevel(self.level.clone()));
        }
        if self.log_dir.is_some() && self.file_name.is_empty() {
            return Err(LoggingError::InvalidConfig("file_name is empty".into()));
        }
        Ok(())
    }

    /// Директива `EnvFilter`: чужие крейты: только `warn` и выше.
    pub fn build_filter_directive(&self) -> String {
        format!("warn,aclstore={0},aclctl={0}", self.level)
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::default(),
            console_enabled: true,
            with_ansi: true,
            with_target: false,
            log_dir: None,
            file_name: "aclstore.log".to_string(),
        }
    }
}

impl FromStr for LogFormat {
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "pretty" => Ok(Self::Pretty),
            "compact" => Ok(Self::Compact),
            other => Err(LoggingError::InvalidConfig(format!(
                "unknown log format '{other}'"
            ))),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let s = match self {
            Self::Json => "json",
            Self::Pretty => "pretty",
            Self::Compact => "compact",
        };
        f.write_str(s)
    }
}
