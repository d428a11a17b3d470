//! Файловый уровень хранилища: блокировки, commit/abort и кеш разобранных
//! ACL.

pub mod cache;
pub mod clock;
pub mod lock;

pub use cache::{is_line_space, parse_acl, AclCache, CacheStats, FileIdentity, CACHED_ACLS, MAX_PATH_LEN};
pub use clock::{Clock, ManualClock, SystemClock};
pub use lock::{lock_path, LockHandle, LockManager, LOCK_SUFFIX, POLL_INTERVAL, WAIT_TIME};
