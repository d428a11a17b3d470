use std::{
    ffi::OsString,
    fs::{self, File, Metadata, OpenOptions},
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
    sync::Arc,
    time::{Duration, SystemTime},
};

use tracing::{debug, info, trace, warn};

use super::clock::{Clock, SystemClock};
use crate::error::{AclResult, AclStoreError};

/// Суффикс файла-блокировки рядом с ACL: `<acl>.~NEWACL~`.
pub const LOCK_SUFFIX: &str = ".~NEWACL~";

/// Возраст, после которого файл блокировки считается брошенным.
pub const WAIT_TIME: Duration = Duration::from_secs(300);

/// Пауза между попытками захвата.
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Менеджер межпроцессных блокировок ACL-файлов.
///
/// Блокировка: это файл-сосед, созданный с `O_CREAT | O_EXCL`. Владелец
/// пишет в него новую версию ACL и либо атомарно переименовывает его
/// поверх оригинала ([`LockHandle::commit`]), либо удаляет
/// ([`LockHandle::abort`]).
#[derive(Debug, Clone)]
pub struct LockManager {
    stale_after: Duration,
    poll_interval: Duration,
    timeout: Option<Duration>,
    clock: Arc<dyn Clock>,
}

/// Захваченная блокировка: открытый на запись файл-сосед.
///
/// Если handle уничтожается без `commit`/`abort`, выполняется `abort`.
#[derive(Debug)]
pub struct LockHandle {
    acl_path: PathBuf,
    lock_path: PathBuf,
    writer: Option<BufWriter<File>>,
}

////////////////////////////////////////////////////////////////////////////////
// LockManager
////////////////////////////////////////////////////////////////////////////////

impl LockManager {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            stale_after: WAIT_TIME,
            poll_interval: POLL_INTERVAL,
            timeout: None,
            clock,
        }
    }

    pub fn with_stale_after(
        mut self,
        stale_after: Duration,
    ) -> Self {
        self.stale_after = stale_after;
        self
    }

    pub fn with_poll_interval(
        mut self,
        poll_interval: Duration,
    ) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Ограничивает ожидание. `None`: ждать бесконечно.
    pub fn with_timeout(
        mut self,
        timeout: Option<Duration>,
    ) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn stale_after(&self) -> Duration {
        self.stale_after
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Захватывает блокировку на `acl_path`.
    ///
    /// Требует существования самого ACL-файла (его права наследует файл
    /// блокировки) и права записи в каталог. Пока чужая блокировка свежая,
    /// вызывающий ждёт; брошенная блокировка (старше `stale_after`)
    /// удаляется. Любая другая ошибка создания возвращается сразу.
    pub fn lock(
        &self,
        acl_path: &Path,
    ) -> AclResult<LockHandle> {
        let meta =
            fs::metadata(acl_path).map_err(|e| AclStoreError::lock_unavailable(acl_path, e))?;
        let mode = permission_bits(&meta);
        let lock_path = lock_path(acl_path);
        let started = self.clock.now();

        loop {
            match create_exclusive(&lock_path, mode) {
                Ok(file) => {
                    debug!(acl = %acl_path.display(), "ACL lock acquired");
                    return Ok(LockHandle {
                        acl_path: acl_path.to_path_buf(),
                        lock_path,
                        writer: Some(BufWriter::new(file)),
                    });
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    let lock_meta = match fs::metadata(&lock_path) {
                        Ok(m) => m,
                        // Владелец успел завершиться между двумя вызовами.
                        Err(e) if e.kind() == io::ErrorKind::NotFound => continue,
                        Err(e) => return Err(AclStoreError::lock_unavailable(acl_path, e)),
                    };

                    let now = self.clock.now();
                    let age = now
                        .duration_since(lock_created_at(&lock_meta))
                        .unwrap_or_default();

                    if age > self.stale_after {
                        match fs::remove_file(&lock_path) {
                            Ok(()) => {}
                            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                            Err(e) => return Err(AclStoreError::lock_unavailable(acl_path, e)),
                        }
                        info!(
                            lock = %lock_path.display(),
                            age_secs = age.as_secs(),
                            "Reclaimed stale ACL lock"
                        );
                        continue;
                    }

                    if let Some(timeout) = self.timeout {
                        let waited = now.duration_since(started).unwrap_or_default();
                        if waited >= timeout {
                            return Err(AclStoreError::LockTimeout {
                                path: acl_path.to_path_buf(),
                                waited,
                            });
                        }
                    }

                    trace!(lock = %lock_path.display(), "ACL lock busy, waiting");
                    self.clock.sleep(self.poll_interval);
                }
                Err(e) => return Err(AclStoreError::lock_unavailable(acl_path, e)),
            }
        }
    }
}

impl Default for LockManager {
    fn default() -> Self {
        Self::new(Arc::new(SystemClock))
    }
}

////////////////////////////////////////////////////////////////////////////////
// LockHandle
////////////////////////////////////////////////////////////////////////////////

impl LockHandle {
    pub fn acl_path(&self) -> &Path {
        &self.acl_path
    }

    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }

    /// Пишет одну запись ACL (строка + `\n`).
    pub fn write_entry(
        &mut self,
        entry: &str,
    ) -> io::Result<()> {
        self.write_all(entry.as_bytes())?;
        self.write_all(b"\n")
    }

    /// Публикует записанное содержимое: `rename(lock, acl)`.
    ///
    /// Перед переименованием проверяет, что файл блокировки всё ещё
    /// существует (`st_nlink != 0`). Если его уже удалил другой процесс,
    /// возвращается [`AclStoreError::RaceDetected`], а ACL не меняется.
    pub fn commit(mut self) -> AclResult<()> {
        let Some(mut writer) = self.writer.take() else {
            return Ok(());
        };

        let synced = writer.flush().and_then(|_| writer.get_ref().sync_all());
        if let Err(e) = synced {
            self.discard(writer)?;
            return Err(e.into());
        }

        match link_count(writer.get_ref()) {
            Ok(0) => {
                warn!(lock = %self.lock_path.display(), "ACL lock removed before commit");
                return Err(AclStoreError::RaceDetected {
                    path: self.acl_path.clone(),
                });
            }
            Ok(_) => {}
            Err(e) => {
                self.discard(writer)?;
                return Err(e.into());
            }
        }

        let renamed = fs::rename(&self.lock_path, &self.acl_path);
        drop(writer);

        match renamed {
            Ok(()) => {
                debug!(acl = %self.acl_path.display(), "ACL update committed");
                Ok(())
            }
            Err(e) => {
                if let Err(unlink) = fs::remove_file(&self.lock_path) {
                    warn!(
                        lock = %self.lock_path.display(),
                        error = %unlink,
                        "Failed to remove ACL lock after rename error"
                    );
                }
                Err(e.into())
            }
        }
    }

    /// Отменяет изменение: удаляет файл блокировки.
    ///
    /// Если файла уже нет (`st_nlink == 0`), ничего не удаляется и
    /// возвращается [`AclStoreError::RaceDetected`].
    pub fn abort(mut self) -> AclResult<()> {
        match self.writer.take() {
            Some(writer) => self.discard(writer),
            None => Ok(()),
        }
    }

    /// Закрывает файл без сброса буфера и удаляет его, если он ещё наш.
    fn discard(
        &self,
        writer: BufWriter<File>,
    ) -> AclResult<()> {
        let (file, _unflushed) = writer.into_parts();

        match link_count(&file) {
            Ok(0) => {
                warn!(lock = %self.lock_path.display(), "ACL lock removed before abort");
                Err(AclStoreError::RaceDetected {
                    path: self.acl_path.clone(),
                })
            }
            Ok(_) => {
                fs::remove_file(&self.lock_path)?;
                debug!(acl = %self.acl_path.display(), "ACL update aborted");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl Write for LockHandle {
    fn write(
        &mut self,
        buf: &[u8],
    ) -> io::Result<usize> {
        match self.writer.as_mut() {
            Some(w) => w.write(buf),
            None => Err(io::Error::other("ACL lock already released")),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.writer.as_mut() {
            Some(w) => w.flush(),
            None => Ok(()),
        }
    }
}

impl Drop for LockHandle {
    fn drop(&mut self) {
        if let Some(writer) = self.writer.take() {
            if let Err(e) = self.discard(writer) {
                warn!(
                    lock = %self.lock_path.display(),
                    error = %e,
                    "Failed to release ACL lock"
                );
            }
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Вспомогательные функции
////////////////////////////////////////////////////////////////////////////////

/// Путь файла блокировки для `acl_path`.
pub fn lock_path(acl_path: &Path) -> PathBuf {
    let mut name = OsString::from(acl_path.as_os_str());
    name.push(LOCK_SUFFIX);
    PathBuf::from(name)
}

fn create_exclusive(
    path: &Path,
    mode: u32,
) -> io::Result<File> {
    let mut opts = OpenOptions::new();
    opts.write(true).create_new(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        opts.mode(mode);
    }
    #[cfg(not(unix))]
    let _ = mode;
    opts.open(path)
}

#[cfg(unix)]
fn permission_bits(meta: &Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    meta.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn permission_bits(_meta: &Metadata) -> u32 {
    0o600
}

/// Момент создания блокировки: st_ctime.
#[cfg(unix)]
fn lock_created_at(meta: &Metadata) -> SystemTime {
    use std::os::unix::fs::MetadataExt;
    let secs = meta.ctime().max(0) as u64;
    let nanos = meta.ctime_nsec().clamp(0, 999_999_999) as u32;
    SystemTime::UNIX_EPOCH + Duration::new(secs, nanos)
}

#[cfg(not(unix))]
fn lock_created_at(meta: &Metadata) -> SystemTime {
    meta.modified().unwrap_or_else(|_| SystemTime::now())
}

#[cfg(unix)]
fn link_count(file: &File) -> io::Result<u64> {
    use std::os::unix::fs::MetadataExt;
    Ok(file.metadata()?.nlink())
}

#[cfg(not(unix))]
fn link_count(file: &File) -> io::Result<u64> {
    file.metadata().map(|_| 1)
}
