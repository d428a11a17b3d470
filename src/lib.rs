//! Flat-file ACL store.
//!
//! ACLs are text files holding one principal (`name.instance@realm`) per
//! line. Writers serialise through an exclusive `<file>.~NEWACL~` lock file
//! and publish by atomic rename; readers go through a small cache that
//! re-parses a file whenever its link count or timestamps change.

/// Principals and ACL operations: canonicalization, queries, mutations.
pub mod auth;
/// Store configuration (defaults, TOML file, `ACLSTORE_*` environment).
pub mod config;
/// In-memory set holding parsed ACL entries.
pub mod database;
/// Lock files, commit/abort and the parsed-ACL cache.
pub mod engine;
/// Logging setup (console and daily file sinks).
pub mod logging;

/// Error types and status codes.
pub use aclstore_error as error;

// -----------------------------------------------------------------------------
//  Frequently used public types
// -----------------------------------------------------------------------------

pub use auth::{canonicalize, AclStore, CanonicalPrincipal, Canonicalizer, Principal, SharedAclStore};
pub use config::{ConfigError, StoreConfig, StoreConfigBuilder};
pub use database::AclSet;
pub use engine::{AclCache, CacheStats, Clock, LockHandle, LockManager, ManualClock, SystemClock};
pub use error::{AclResult, AclStoreError, ErrorExt, StatusCode};
pub use logging::{init_logging, LogFormat, LoggingConfig, LoggingHandle};
