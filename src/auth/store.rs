use std::{
    fs::OpenOptions,
    io,
    path::Path,
    sync::Arc,
};

use tracing::{debug, info, warn};

use super::principal::{CanonicalPrincipal, Canonicalizer};
use crate::{
    config::StoreConfig,
    engine::{is_line_space, AclCache, CacheStats, Clock, LockHandle, LockManager, SystemClock},
    error::{AclResult, AclStoreError, ErrorExt},
};

/// Хранилище ACL-файлов: канонизация, запросы и изменения.
///
/// Владеет кешем разобранных файлов, поэтому все операции берут
/// `&mut self`. Для работы из нескольких потоков есть
/// [`SharedAclStore`](super::SharedAclStore).
#[derive(Debug)]
pub struct AclStore {
    canonicalizer: Canonicalizer,
    cache: AclCache,
    locks: LockManager,
}

impl AclStore {
    pub fn new(config: &StoreConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Как [`new`](Self::new), но с собственным источником времени для
    /// цикла ожидания блокировки.
    pub fn with_clock(
        config: &StoreConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let canonicalizer = Canonicalizer::new(config.local_realm.clone());
        let locks = LockManager::new(clock)
            .with_stale_after(config.stale_after())
            .with_poll_interval(config.poll_interval())
            .with_timeout(config.lock_timeout());
        Self {
            cache: AclCache::new(config.cache_slots, canonicalizer.clone()),
            canonicalizer,
            locks,
        }
    }

    pub fn canonicalizer(&self) -> &Canonicalizer {
        &self.canonicalizer
    }

    pub fn cache(&self) -> &AclCache {
        &self.cache
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn lock_manager(&self) -> &LockManager {
        &self.locks
    }

    pub fn canonicalize(
        &self,
        raw: &str,
    ) -> Option<CanonicalPrincipal> {
        self.canonicalizer.canonicalize(raw)
    }

    /// Есть ли в ACL ровно строка `canonical`. Невозможность прочитать
    /// файл означает «нет».
    pub fn exact_match(
        &mut self,
        path: &Path,
        canonical: &str,
    ) -> bool {
        match self.cache.load_acl(path) {
            Ok(acl) => acl.contains(canonical),
            Err(e) => {
                debug!(status = %e.status_code(), error = %e, "ACL lookup treated as miss");
                false
            }
        }
    }

    /// Разрешён ли `principal` по ACL `path`.
    ///
    /// Проверяет точное совпадение, затем `name.*@realm`, `*.*@realm` и
    /// `*.*@*`. Некорректное имя и нечитаемый файл дают `false`.
    pub fn check(
        &mut self,
        path: &Path,
        principal: &str,
    ) -> bool {
        let Some(canon) = self.canonicalize(principal) else {
            debug!(principal, "ACL check on invalid principal");
            return false;
        };

        let acl = match self.cache.load_acl(path) {
            Ok(acl) => acl,
            Err(e) => {
                debug!(status = %e.status_code(), error = %e, "ACL check treated as miss");
                return false;
            }
        };

        if acl.contains(canon.as_str()) {
            debug!(principal = %canon, "ACL exact match");
            return true;
        }

        let matched = canon
            .wildcard_probes()
            .into_iter()
            .find(|probe| acl.contains(probe));
        match matched {
            Some(probe) => {
                debug!(principal = %canon, %probe, "ACL wildcard match");
                true
            }
            None => {
                debug!(principal = %canon, "ACL check denied");
                false
            }
        }
    }

    /// Добавляет `principal` в ACL `path`.
    ///
    /// Файл переписывается целиком под блокировкой. Если принципал уже
    /// есть, файл не меняется и возвращается
    /// [`AclStoreError::PrincipalExists`].
    pub fn add(
        &mut self,
        path: &Path,
        principal: &str,
    ) -> AclResult<()> {
        let canon = self.canonicalize_entry(principal)?;
        let mut handle = self.locks.lock(path)?;

        let acl = match self.cache.load_acl(path) {
            Ok(acl) => acl,
            Err(e) => {
                abort_quietly(handle);
                return Err(e);
            }
        };

        if acl.contains(canon.as_str()) {
            abort_quietly(handle);
            return Err(AclStoreError::PrincipalExists {
                path: path.to_path_buf(),
                principal: canon.into_string(),
            });
        }

        for entry in acl {
            handle.write_entry(entry)?;
        }
        handle.write_entry(canon.as_str())?;
        handle.commit()?;

        self.cache.invalidate(path);
        info!(acl = %path.display(), principal = %canon, "ACL entry added");
        Ok(())
    }

    /// Удаляет `principal` из ACL `path`.
    ///
    /// Отсутствующий принципал даёт [`AclStoreError::PrincipalNotFound`], файл
    /// при этом не меняется.
    pub fn delete(
        &mut self,
        path: &Path,
        principal: &str,
    ) -> AclResult<()> {
        let canon = self.canonicalize_entry(principal)?;
        let mut handle = self.locks.lock(path)?;

        let acl = match self.cache.load_acl(path) {
            Ok(acl) => acl,
            Err(e) => {
                abort_quietly(handle);
                return Err(e);
            }
        };

        if !acl.contains(canon.as_str()) {
            abort_quietly(handle);
            return Err(AclStoreError::PrincipalNotFound {
                path: path.to_path_buf(),
                principal: canon.into_string(),
            });
        }

        for entry in acl.iter().filter(|e| *e != canon.as_str()) {
            handle.write_entry(entry)?;
        }
        handle.commit()?;

        self.cache.invalidate(path);
        info!(acl = %path.display(), principal = %canon, "ACL entry removed");
        Ok(())
    }

    /// Делает ACL `path` пустым.
    ///
    /// Существующий файл заменяется пустым под блокировкой; если файла нет,
    /// он создаётся с правами `perm | 0o600`.
    pub fn initialize(
        &mut self,
        path: &Path,
        perm: u32,
    ) -> AclResult<()> {
        match self.locks.lock(path) {
            Ok(handle) => handle.commit()?,
            Err(lock_err) => {
                let mut opts = OpenOptions::new();
                opts.write(true).create_new(true);
                #[cfg(unix)]
                {
                    use std::os::unix::fs::OpenOptionsExt;
                    opts.mode(perm | 0o600);
                }
                #[cfg(not(unix))]
                let _ = perm;

                match opts.open(path) {
                    Ok(_) => {}
                    Err(e) if e.kind() == io::ErrorKind::AlreadyExists => return Err(lock_err),
                    Err(e) => return Err(e.into()),
                }
            }
        }

        self.cache.invalidate(path);
        info!(acl = %path.display(), "ACL initialized");
        Ok(())
    }

    /// Текущее содержимое ACL, отсортированное.
    pub fn entries(
        &mut self,
        path: &Path,
    ) -> AclResult<Vec<String>> {
        let acl = self.cache.load_acl(path)?;
        let mut out: Vec<String> = acl.iter().map(str::to_owned).collect();
        out.sort_unstable();
        Ok(out)
    }

    /// Канонизирует имя для записи в файл. Пробельные символы в
    /// результате запрещены: файл построчный, а при чтении они удаляются.
    fn canonicalize_entry(
        &self,
        principal: &str,
    ) -> AclResult<CanonicalPrincipal> {
        match self.canonicalize(principal) {
            Some(c) if !c.as_str().chars().any(is_line_space) => Ok(c),
            _ => Err(AclStoreError::invalid_principal(principal)),
        }
    }
}

fn abort_quietly(handle: LockHandle) {
    if let Err(e) = handle.abort() {
        warn!(status = %e.status_code(), error = %e, "Failed to abort ACL update");
    }
}
