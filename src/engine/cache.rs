use std::{
    fs::{self, File, Metadata},
    io::{BufRead, BufReader, Read},
    path::{Path, PathBuf},
};

use tracing::{debug, trace};

use crate::{
    auth::principal::Canonicalizer,
    database::AclSet,
    error::{AclResult, AclStoreError},
};

/// Количество одновременно кешируемых ACL-файлов.
pub const CACHED_ACLS: usize = 8;

/// Ёмкость буфера имени файла в слоте; путь обязан быть короче
/// `MAX_PATH_LEN - 1` байт.
pub const MAX_PATH_LEN: usize = 2048;

/// То, по чему кеш узнаёт, что файл изменился: число ссылок, mtime и
/// ctime. Сравнивается с результатом `stat(path)`, а не `fstat`, потому что
/// ACL обычно заменяется через `rename`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileIdentity {
    pub nlink: u64,
    pub mtime: (i64, i64),
    pub ctime: (i64, i64),
}

/// Счётчики работы кеша.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Сколько слотов сейчас занято.
    pub slots_used: usize,
    /// Сколько раз файл перечитывался и разбирался заново.
    pub reloads: u64,
    /// Сколько раз слот был отобран под другой файл.
    pub evictions: u64,
    pub hits: u64,
    pub misses: u64,
}

#[derive(Debug)]
struct CacheSlot {
    path: PathBuf,
    handle: Option<File>,
    identity: Option<FileIdentity>,
    acl: Option<AclSet>,
}

/// Кеш разобранных ACL-файлов фиксированной ёмкости.
///
/// Слот живёт, пока его не вытеснят по кругу (`next`). Множество в слоте
/// действительно только пока сохранённый [`FileIdentity`] совпадает с
/// текущим; при расхождении файл перечитывается целиком.
#[derive(Debug)]
pub struct AclCache {
    slots: Vec<CacheSlot>,
    capacity: usize,
    next: usize,
    canonicalizer: Canonicalizer,
    stats: CacheStats,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl FileIdentity {
    pub fn of(meta: &Metadata) -> Self {
        #[cfg(unix)]
        {
            use std::os::unix::fs::MetadataExt;
            Self {
                nlink: meta.nlink(),
                mtime: (meta.mtime(), meta.mtime_nsec()),
                ctime: (meta.ctime(), meta.ctime_nsec()),
            }
        }
        #[cfg(not(unix))]
        {
            let stamp = |t: std::io::Result<std::time::SystemTime>| {
                t.ok()
                    .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
                    .map(|d| (d.as_secs() as i64, i64::from(d.subsec_nanos())))
                    .unwrap_or_default()
            };
            Self {
                nlink: 1,
                mtime: stamp(meta.modified()),
                ctime: stamp(meta.created()),
            }
        }
    }
}

impl AclCache {
    /// Создаёт кеш на `capacity` слотов (минимум один).
    pub fn new(
        capacity: usize,
        canonicalizer: Canonicalizer,
    ) -> Self {
        let capacity = capacity.max(1);
        Self {
            slots: Vec::with_capacity(capacity),
            capacity,
            next: 0,
            canonicalizer,
            stats: CacheStats::default(),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Количество занятых слотов.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            slots_used: self.slots.len(),
            ..self.stats
        }
    }

    pub fn canonicalizer(&self) -> &Canonicalizer {
        &self.canonicalizer
    }

    /// Путь, закреплённый за слотом `idx`.
    pub fn slot_path(
        &self,
        idx: usize,
    ) -> Option<&Path> {
        self.slots.get(idx).map(|s| s.path.as_path())
    }

    /// Разобранное множество слота `idx`, если оно есть.
    pub fn acl(
        &self,
        idx: usize,
    ) -> Option<&AclSet> {
        self.slots.get(idx).and_then(|s| s.acl.as_ref())
    }

    /// Гарантирует, что ACL `path` загружен и актуален, и возвращает индекс
    /// его слота.
    pub fn load(
        &mut self,
        path: &Path,
    ) -> AclResult<usize> {
        if path.as_os_str().len() >= MAX_PATH_LEN - 1 {
            return Err(AclStoreError::load_failure(path, "path too long"));
        }

        let idx = match self.find_open(path) {
            Some(idx) => {
                self.stats.hits += 1;
                trace!(acl = %path.display(), slot = idx, "ACL cache hit");
                idx
            }
            None => {
                self.stats.misses += 1;
                let idx = self.claim_slot(path);
                let slot = &mut self.slots[idx];
                match File::open(path) {
                    Ok(file) => slot.handle = Some(file),
                    Err(e) => return Err(AclStoreError::load_failure(path, e)),
                }
                debug!(acl = %path.display(), slot = idx, "ACL cache miss");
                idx
            }
        };

        self.refresh(idx)?;
        Ok(idx)
    }

    /// То же, что [`load`](Self::load), но сразу отдаёт множество.
    pub fn load_acl(
        &mut self,
        path: &Path,
    ) -> AclResult<&AclSet> {
        let idx = self.load(path)?;
        self.slots[idx]
            .acl
            .as_ref()
            .ok_or_else(|| AclStoreError::load_failure(path, "ACL not parsed"))
    }

    /// Забывает разобранное содержимое `path`; следующий `load` перечитает
    /// файл независимо от временных меток.
    pub fn invalidate(
        &mut self,
        path: &Path,
    ) {
        for slot in self.slots.iter_mut().filter(|s| s.path == path) {
            slot.identity = None;
            slot.acl = None;
        }
    }

    /// Закрывает все дескрипторы и освобождает слоты.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.next = 0;
    }

    fn find_open(
        &self,
        path: &Path,
    ) -> Option<usize> {
        self.slots
            .iter()
            .position(|s| s.handle.is_some() && s.path == path)
    }

    /// Выбирает слот под новый путь: мёртвый (без дескриптора), затем
    /// свободный, иначе вытесняет слот под курсором.
    fn claim_slot(
        &mut self,
        path: &Path,
    ) -> usize {
        let fresh = CacheSlot {
            path: path.to_path_buf(),
            handle: None,
            identity: None,
            acl: None,
        };

        if let Some(idx) = self.slots.iter().position(|s| s.handle.is_none()) {
            self.slots[idx] = fresh;
            return idx;
        }

        if self.slots.len() < self.capacity {
            self.slots.push(fresh);
            return self.slots.len() - 1;
        }

        let idx = self.next;
        self.next = (self.next + 1) % self.capacity;
        debug!(
            evicted = %self.slots[idx].path.display(),
            acl = %path.display(),
            slot = idx,
            "ACL cache eviction"
        );
        self.slots[idx] = fresh;
        self.stats.evictions += 1;
        idx
    }

    /// Сверяет слот с файлом на диске и при необходимости перечитывает его.
    fn refresh(
        &mut self,
        idx: usize,
    ) -> AclResult<()> {
        let slot = &mut self.slots[idx];
        let meta = match fs::metadata(&slot.path) {
            Ok(m) => m,
            Err(e) => return Err(AclStoreError::load_failure(&slot.path, e)),
        };
        let identity = FileIdentity::of(&meta);

        if slot.acl.is_some() && slot.identity == Some(identity) {
            return Ok(());
        }

        // Файл мог быть заменён через rename: открываем заново.
        let file = match File::open(&slot.path) {
            Ok(f) => f,
            Err(e) => {
                slot.handle = None;
                slot.acl = None;
                slot.identity = None;
                return Err(AclStoreError::load_failure(&slot.path, e));
            }
        };

        let acl = match parse_acl(&file, &self.canonicalizer) {
            Ok(acl) => acl,
            Err(e) => {
                slot.acl = None;
                slot.identity = None;
                return Err(AclStoreError::load_failure(&slot.path, e));
            }
        };

        debug!(
            acl = %slot.path.display(),
            entries = acl.len(),
            "ACL reloaded"
        );
        slot.handle = Some(file);
        slot.identity = Some(identity);
        slot.acl = Some(acl);
        self.stats.reloads += 1;
        Ok(())
    }
}

////////////////////////////////////////////////////////////////////////////////
// Разбор файла
////////////////////////////////////////////////////////////////////////////////

/// Разбирает содержимое ACL-файла.
///
/// Из каждой строки удаляются все пробельные символы, результат
/// канонизируется; строки, не ставшие корректным принципалом (в том числе
/// пустые и не UTF-8), пропускаются.
pub fn parse_acl<R: Read>(
    reader: R,
    canonicalizer: &Canonicalizer,
) -> std::io::Result<AclSet> {
    let mut reader = BufReader::new(reader);
    let mut acl = AclSet::new();
    let mut line = Vec::new();

    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line)? == 0 {
            break;
        }
        let Ok(text) = std::str::from_utf8(&line) else {
            continue;
        };
        let compact: String = text.chars().filter(|c| !is_line_space(*c)).collect();
        if let Some(canon) = canonicalizer.canonicalize(&compact) {
            acl.insert(canon.as_str());
        }
    }

    Ok(acl)
}

/// Символы, удаляемые из строки ACL при разборе: ASCII-пробелы и `\v`.
/// Прочие Unicode-пробелы (например, U+00A0) остаются частью имени.
pub fn is_line_space(c: char) -> bool {
    c.is_ascii_whitespace() || c == '\x0b'
}
