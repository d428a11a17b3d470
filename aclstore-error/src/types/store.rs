use std::{io, path::PathBuf, time::Duration};

use thiserror::Error;

use crate::{ErrorExt, StatusCode};

/// Ошибка хранилища ACL-файлов.
///
/// Конкуренция за блокировку наружу не выходит: она переживается внутри
/// цикла ожидания. Сюда попадают только окончательные отказы.
#[derive(Debug, Error)]
pub enum AclStoreError {
    /// Имя принципала не приводится к канонической форме
    #[error("Invalid principal: '{principal}'")]
    InvalidPrincipal { principal: String },
    /// Принципал уже присутствует в ACL
    #[error("Principal {principal} already present in {}", .path.display())]
    PrincipalExists { path: PathBuf, principal: String },
    /// Принципал отсутствует в ACL
    #[error("Principal {principal} not present in {}", .path.display())]
    PrincipalNotFound { path: PathBuf, principal: String },
    /// Блокировку получить нельзя (файла нет, каталог недоступен и т.п.)
    #[error("Lock unavailable for {}: {reason}", .path.display())]
    LockUnavailable { path: PathBuf, reason: String },
    /// Истёк таймаут ожидания блокировки
    #[error("Timed out after {waited:?} waiting for lock on {}", .path.display())]
    LockTimeout { path: PathBuf, waited: Duration },
    /// Файл блокировки удалён другим процессом до commit/abort
    #[error("Lock file for {} was removed by another process", .path.display())]
    RaceDetected { path: PathBuf },
    /// ACL не удалось загрузить в кэш
    #[error("Failed to load ACL {}: {reason}", .path.display())]
    LoadFailure { path: PathBuf, reason: String },
    /// Ошибка ввода-вывода
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl AclStoreError {
    pub fn invalid_principal(principal: impl Into<String>) -> Self {
        Self::InvalidPrincipal {
            principal: principal.into(),
        }
    }

    pub fn load_failure(
        path: impl Into<PathBuf>,
        reason: impl ToString,
    ) -> Self {
        Self::LoadFailure {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    pub fn lock_unavailable(
        path: impl Into<PathBuf>,
        reason: impl ToString,
    ) -> Self {
        Self::LockUnavailable {
            path: path.into(),
            reason: reason.to_string(),
        }
    }
}

impl ErrorExt for AclStoreError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::InvalidPrincipal { .. } => StatusCode::InvalidPrincipal,
            Self::PrincipalExists { .. } => StatusCode::AlreadyExists,
            Self::PrincipalNotFound { .. } => StatusCode::NotFound,
            Self::LockUnavailable { .. } => StatusCode::LockError,
            Self::LockTimeout { .. } => StatusCode::Timeout,
            Self::RaceDetected { .. } => StatusCode::LockRace,
            Self::LoadFailure { .. } => StatusCode::CacheLoadFailed,
            Self::Io(err) => match err.kind() {
                io::ErrorKind::NotFound => StatusCode::NotFound,
                io::ErrorKind::PermissionDenied => StatusCode::PermissionDenied,
                io::ErrorKind::UnexpectedEof => StatusCode::UnexpectedEof,
                io::ErrorKind::TimedOut => StatusCode::Timeout,
                _ => StatusCode::Io,
            },
        }
    }

    fn as_any(&self) -> &dyn std::any::Any {
        self
    }
}
