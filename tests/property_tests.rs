//! Property-based тесты канонизации, множества записей и round trip через
//! файл.

use std::{collections::BTreeSet, fs};

use aclstore::{
    auth::principal::{MAX_CANONICAL_LEN, MAX_PRINCIPAL_SIZE},
    canonicalize, AclSet, AclStore, StoreConfig,
};
use proptest::prelude::*;
use tempfile::tempdir;

const REALM: &str = "EXAMPLE.ORG";

fn field() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9]{0,11}"
}

fn principal() -> impl Strategy<Value = String> {
    (field(), proptest::option::of(field()), proptest::option::of("[A-Z]{1,8}(\\.[A-Z]{2,4})?"))
        .prop_map(|(name, inst, realm)| {
            let mut p = name;
            if let Some(inst) = inst {
                p.push('.');
                p.push_str(&inst);
            }
            if let Some(realm) = realm {
                p.push('@');
                p.push_str(&realm);
            }
            p
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// Результат никогда не длиннее предела.
    #[test]
    fn prop_canonical_is_bounded(raw in "\\PC{0,200}") {
        if let Some(c) = canonicalize(&raw, REALM) {
            prop_assert!(c.as_str().len() <= MAX_CANONICAL_LEN);
            prop_assert!(c.as_str().len() < MAX_PRINCIPAL_SIZE);
        }
    }

    /// Каноническая форма неподвижна.
    #[test]
    fn prop_canonicalize_is_idempotent(p in principal()) {
        let once = canonicalize(&p, REALM).unwrap();
        let twice = canonicalize(once.as_str(), REALM).unwrap();
        prop_assert_eq!(once.as_str(), twice.as_str());

        let parts = once.to_principal();
        prop_assert!(!parts.name.is_empty());
        prop_assert!(once.as_str().find('.') < once.as_str().find('@'));
    }

    /// Множество ведёт себя как BTreeSet.
    #[test]
    fn prop_acl_set_matches_btreeset(items in prop::collection::vec("[a-z]{1,6}", 0..200)) {
        let mut set = AclSet::new();
        let mut model = BTreeSet::new();
        for it in &items {
            prop_assert_eq!(set.insert(it), model.insert(it.clone()));
            prop_assert!(set.len() <= set.capacity() / 2);
        }
        prop_assert_eq!(set.len(), model.len());
        let got: BTreeSet<String> = set.iter().map(str::to_owned).collect();
        prop_assert_eq!(got, model);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// add + delete постороннего принципала не меняет множество записей,
    /// независимо от порядка строк в файле.
    #[test]
    fn prop_unrelated_add_delete_round_trip(
        existing in prop::collection::btree_set(principal(), 0..12),
        extra in principal(),
    ) {
        let dir = tempdir().unwrap();
        let acl = dir.path().join("p.acl");
        let mut s = AclStore::new(&StoreConfig::builder().local_realm(REALM).build());

        let canon: BTreeSet<String> = existing
            .iter()
            .map(|p| canonicalize(p, REALM).unwrap().into_string())
            .collect();
        let extra_canon = canonicalize(&extra, REALM).unwrap().into_string();
        prop_assume!(!canon.contains(&extra_canon));

        // Записываем в обратном порядке, чтобы порядок строк ничего не значил.
        let body: String = canon.iter().rev().map(|c| format!("{c}\n")).collect();
        fs::write(&acl, body).unwrap();

        let before: BTreeSet<String> = s.entries(&acl).unwrap().into_iter().collect();
        prop_assert_eq!(&before, &canon);

        s.add(&acl, &extra).unwrap();
        prop_assert!(s.exact_match(&acl, &extra_canon));
        s.delete(&acl, &extra).unwrap();
        prop_assert!(!s.exact_match(&acl, &extra_canon));

        let after: BTreeSet<String> = s.entries(&acl).unwrap().into_iter().collect();
        prop_assert_eq!(before, after);
    }
}
