//! Принципалы и ACL: канонизация имён, запросы и изменения.

pub mod principal;
pub mod shared;
pub mod store;

pub use principal::{canonicalize, CanonicalPrincipal, Canonicalizer, Principal};
pub use shared::SharedAclStore;
pub use store::AclStore;
