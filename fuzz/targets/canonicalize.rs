#![no_main]

use aclstore::auth::principal::{canonicalize, MAX_CANONICAL_LEN, REALM_SZ};
use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

#[derive(Debug, Arbitrary)]
struct Input<'a> {
    raw: &'a str,
    realm: &'a str,
}

fuzz_target!(|input: Input<'_>| {
    let mut end = input.realm.len().min(REALM_SZ);
    while !input.realm.is_char_boundary(end) {
        end -= 1;
    }
    let realm = &input.realm[..end];
    if let Some(c) = canonicalize(input.raw, realm) {
        assert!(c.as_str().len() <= MAX_CANONICAL_LEN);
        assert!(!c.as_str().is_empty());
        let _ = c.wildcard_probes();
        let _ = c.to_principal();
    }
});
