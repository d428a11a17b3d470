//! Настройки хранилища: значения по умолчанию, необязательный TOML-файл и
//! переменные окружения `ACLSTORE_*`.

use std::{path::Path, time::Duration};

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    auth::principal::{DEFAULT_LOCAL_REALM, REALM_SZ},
    engine::{CACHED_ACLS, POLL_INTERVAL, WAIT_TIME},
};

/// Префикс переменных окружения.
pub const ENV_PREFIX: &str = "ACLSTORE";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config source error: {0}")]
    Source(#[from] config::ConfigError),
    #[error("Invalid config value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Realm, подставляемый в принципалы без `@realm`.
    pub local_realm: String,
    /// Возраст, после которого чужая блокировка считается брошенной.
    pub stale_lock_secs: u64,
    pub poll_interval_ms: u64,
    /// Предел ожидания блокировки; `None`: ждать бесконечно.
    #[serde(default)]
    pub lock_timeout_ms: Option<u64>,
    pub cache_slots: usize,
}

#[derive(Debug, Default)]
pub struct StoreConfigBuilder {
    local_realm: Option<String>,
    stale_lock_secs: Option<u64>,
    poll_interval_ms: Option<u64>,
    lock_timeout_ms: Option<Option<u64>>,
    cache_slots: Option<usize>,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl StoreConfig {
    pub fn builder() -> StoreConfigBuilder {
        StoreConfigBuilder::default()
    }

    /// Загружает настройки из окружения поверх значений по умолчанию.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Загружает настройки: значения по умолчанию, затем файл `path`
    /// (если он есть), затем `ACLSTORE_*`.
    pub fn load_from(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder()
            .set_default("local_realm", DEFAULT_LOCAL_REALM)?
            .set_default("stale_lock_secs", WAIT_TIME.as_secs() as i64)?
            .set_default("poll_interval_ms", POLL_INTERVAL.as_millis() as i64)?
            .set_default("cache_slots", CACHED_ACLS as i64)?;

        if let Some(path) = path {
            builder = builder.add_source(File::from(path).required(false));
        }

        let cfg = builder
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?;

        let settings: Self = cfg.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.local_realm.is_empty() || self.local_realm.len() > REALM_SZ {
            return Err(ConfigError::Invalid {
                field: "local_realm",
                reason: format!("must be 1..={REALM_SZ} bytes"),
            });
        }
        if self.cache_slots == 0 {
            return Err(ConfigError::Invalid {
                field: "cache_slots",
                reason: "must be positive".into(),
            });
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "poll_interval_ms",
                reason: "must be positive".into(),
            });
        }
        Ok(())
    }

    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.stale_lock_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn lock_timeout(&self) -> Option<Duration> {
        self.lock_timeout_ms.map(Duration::from_millis)
    }
}

impl StoreConfigBuilder {
    pub fn local_realm(
        mut self,
        realm: impl Into<String>,
    ) -> Self {
        self.local_realm = Some(realm.into());
        self
    }

    pub fn stale_after(
        mut self,
        stale: Duration,
    ) -> Self {
        self.stale_lock_secs = Some(stale.as_secs());
        self
    }

    pub fn poll_interval(
        mut self,
        interval: Duration,
    ) -> Self {
        self.poll_interval_ms = Some(interval.as_millis() as u64);
        self
    }

    pub fn lock_timeout(
        mut self,
        timeout: Duration,
    ) -> Self {
        self.lock_timeout_ms = Some(Some(timeout.as_millis() as u64));
        self
    }

    pub fn wait_forever(mut self) -> Self {
        self.lock_timeout_ms = Some(None);
        self
    }

    pub fn cache_slots(
        mut self,
        slots: usize,
    ) -> Self {
        self.cache_slots = Some(slots);
        self
    }

    pub fn build(self) -> StoreConfig {
        let default = StoreConfig::default();
        StoreConfig {
            local_realm: self.local_realm.unwrap_or(default.local_realm),
            stale_lock_secs: self.stale_lock_secs.unwrap_or(default.stale_lock_secs),
            poll_interval_ms: self.poll_interval_ms.unwrap_or(default.poll_interval_ms),
            lock_timeout_ms: self.lock_timeout_ms.unwrap_or(default.lock_timeout_ms),
            cache_slots: self.cache_slots.unwrap_or(default.cache_slots),
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов
////////////////////////////////////////////////////////////////////////////////

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            local_realm: DEFAULT_LOCAL_REALM.to_string(),
            stale_lock_secs: WAIT_TIME.as_secs(),
            poll_interval_ms: POLL_INTERVAL.as_millis() as u64,
            lock_timeout_ms: None,
            cache_slots: CACHED_ACLS,
        }
    }
}
