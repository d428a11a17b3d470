use std::{path::Path, sync::Arc};

use parking_lot::Mutex;

use super::{principal::CanonicalPrincipal, store::AclStore};
use crate::{config::StoreConfig, engine::CacheStats, error::AclResult};

/// Потокобезопасная обёртка над [`AclStore`]: все операции выполняются
/// под одним мьютексом.
#[derive(Debug, Clone)]
pub struct SharedAclStore {
    inner: Arc<Mutex<AclStore>>,
}

impl SharedAclStore {
    pub fn new(config: &StoreConfig) -> Self {
        Self::from_store(AclStore::new(config))
    }

    pub fn from_store(store: AclStore) -> Self {
        Self {
            inner: Arc::new(Mutex::new(store)),
        }
    }

    pub fn canonicalize(
        &self,
        raw: &str,
    ) -> Option<CanonicalPrincipal> {
        self.inner.lock().canonicalize(raw)
    }

    pub fn check(
        &self,
        path: &Path,
        principal: &str,
    ) -> bool {
        self.inner.lock().check(path, principal)
    }

    pub fn exact_match(
        &self,
        path: &Path,
        canonical: &str,
    ) -> bool {
        self.inner.lock().exact_match(path, canonical)
    }

    pub fn add(
        &self,
        path: &Path,
        principal: &str,
    ) -> AclResult<()> {
        self.inner.lock().add(path, principal)
    }

    pub fn delete(
        &self,
        path: &Path,
        principal: &str,
    ) -> AclResult<()> {
        self.inner.lock().delete(path, principal)
    }

    pub fn initialize(
        &self,
        path: &Path,
        perm: u32,
    ) -> AclResult<()> {
        self.inner.lock().initialize(path, perm)
    }

    pub fn entries(
        &self,
        path: &Path,
    ) -> AclResult<Vec<String>> {
        self.inner.lock().entries(path)
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.inner.lock().cache_stats()
    }

    /// Выполняет `f` с эксклюзивным доступом к хранилищу.
    pub fn with_store<R>(
        &self,
        f: impl FnOnce(&mut AclStore) -> R,
    ) -> R {
        f(&mut self.inner.lock())
    }
}
