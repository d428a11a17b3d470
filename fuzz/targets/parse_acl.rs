#![no_main]

use aclstore::{auth::Canonicalizer, engine::parse_acl};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let canonicalizer = Canonicalizer::new("EXAMPLE.ORG");
    if let Ok(acl) = parse_acl(data, &canonicalizer) {
        for entry in &acl {
            assert!(acl.contains(entry));
            assert!(!entry.chars().any(char::is_whitespace));
        }
    }
});
