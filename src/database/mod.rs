//! In-memory structures holding parsed ACL contents.

pub mod acl_set;

pub use acl_set::{hashval, AclSet, Iter, ACL_LEN};
