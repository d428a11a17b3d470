//! Интеграционные тесты хранилища ACL: полный цикл init/add/check/delete
//! через публичный API.

use std::{collections::BTreeSet, fs, path::Path};

use aclstore::{AclStore, AclStoreError, ErrorExt, StatusCode, StoreConfig};
use rstest::rstest;
use tempfile::tempdir;

fn store() -> AclStore {
    AclStore::new(&StoreConfig::builder().local_realm("EXAMPLE.ORG").build())
}

fn file_entries(path: &Path) -> BTreeSet<String> {
    fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(str::to_owned)
        .collect()
}

#[test]
fn test_full_lifecycle() {
    let dir = tempdir().unwrap();
    let acl = dir.path().join("admin.acl");
    let mut s = store();

    s.initialize(&acl, 0o600).unwrap();
    s.add(&acl, "alice").unwrap();
    s.add(&acl, "bob.admin").unwrap();
    s.add(&acl, "carol@OTHER.ORG").unwrap();

    assert_eq!(
        s.entries(&acl).unwrap(),
        vec![
            "alice.@EXAMPLE.ORG",
            "bob.admin@EXAMPLE.ORG",
            "carol.@OTHER.ORG"
        ]
    );
    assert_eq!(file_entries(&acl).len(), 3);

    assert!(s.check(&acl, "alice"));
    assert!(s.check(&acl, "bob.admin@EXAMPLE.ORG"));
    assert!(!s.check(&acl, "bob"));
    assert!(s.check(&acl, "carol@OTHER.ORG"));
    assert!(!s.check(&acl, "carol"));

    s.delete(&acl, "bob.admin").unwrap();
    assert!(!s.exact_match(&acl, "bob.admin@EXAMPLE.ORG"));
    assert_eq!(file_entries(&acl).len(), 2);
}

#[rstest]
#[case("alice")]
#[case("alice.admin")]
#[case("alice@OTHER.ORG")]
#[case("alice.admin@EXAMPLE.ORG")]
#[case("host.srv.example.org@EXAMPLE.ORG")]
fn test_add_then_delete_round_trip(#[case] principal: &str) {
    let dir = tempdir().unwrap();
    let acl = dir.path().join("rt.acl");
    let mut s = store();
    s.initialize(&acl, 0o600).unwrap();

    let canon = s.canonicalize(principal).unwrap();
    s.add(&acl, principal).unwrap();
    assert!(s.exact_match(&acl, canon.as_str()));

    s.delete(&acl, principal).unwrap();
    assert!(!s.exact_match(&acl, canon.as_str()));
}

#[test]
fn test_duplicate_add_and_absent_delete_keep_bytes() {
    let dir = tempdir().unwrap();
    let acl = dir.path().join("keep.acl");
    // Формат файла с лишними пробелами должен пережить неудачную операцию.
    let contents = "  alice . @EXAMPLE.ORG\n\nbob.@EXAMPLE.ORG\n";
    fs::write(&acl, contents).unwrap();

    let mut s = store();
    let dup = s.add(&acl, "alice").unwrap_err();
    assert!(matches!(dup, AclStoreError::PrincipalExists { .. }));
    assert_eq!(dup.status_code(), StatusCode::AlreadyExists);
    assert_eq!(fs::read_to_string(&acl).unwrap(), contents);

    let absent = s.delete(&acl, "zed").unwrap_err();
    assert!(matches!(absent, AclStoreError::PrincipalNotFound { .. }));
    assert_eq!(absent.status_code(), StatusCode::NotFound);
    assert_eq!(fs::read_to_string(&acl).unwrap(), contents);

    assert!(!dir.path().join("keep.acl.~NEWACL~").exists());
}

#[test]
fn test_realm_wildcard_precedence() {
    let dir = tempdir().unwrap();
    let acl = dir.path().join("realm.acl");
    fs::write(&acl, "*.*@EXAMPLE.ORG\n").unwrap();

    let mut s = store();
    assert!(s.check(&acl, "bob.root@EXAMPLE.ORG"));
    assert!(!s.check(&acl, "bob.root@OTHER.ORG"));

    s.add(&acl, "*.*@*").unwrap();
    assert!(s.check(&acl, "bob.root@OTHER.ORG"));
}

#[test]
fn test_name_wildcard_matches_every_instance() {
    let dir = tempdir().unwrap();
    let acl = dir.path().join("name.acl");
    fs::write(&acl, "rcmd.*@EXAMPLE.ORG\n").unwrap();

    let mut s = store();
    assert!(s.check(&acl, "rcmd.host1"));
    assert!(s.check(&acl, "rcmd.host2@EXAMPLE.ORG"));
    assert!(s.check(&acl, "rcmd"));
    assert!(!s.check(&acl, "rcmd.host1@OTHER.ORG"));
    assert!(!s.check(&acl, "other.host1"));
    // Подстановка работает только при проверке, exact_match её не раскрывает.
    assert!(!s.exact_match(&acl, "rcmd.host1@EXAMPLE.ORG"));
}

#[test]
fn test_unrelated_add_delete_preserves_set() {
    let dir = tempdir().unwrap();
    let acl = dir.path().join("set.acl");
    fs::write(
        &acl,
        "zed.@EXAMPLE.ORG\nalice.@EXAMPLE.ORG\nmike.ops@EXAMPLE.ORG\n*.*@OTHER.ORG\n",
    )
    .unwrap();

    let mut s = store();
    let before: BTreeSet<String> = s.entries(&acl).unwrap().into_iter().collect();

    s.add(&acl, "temp.worker").unwrap();
    s.delete(&acl, "temp.worker").unwrap();

    let after: BTreeSet<String> = s.entries(&acl).unwrap().into_iter().collect();
    assert_eq!(before, after);
    assert_eq!(file_entries(&acl), after);
}

#[test]
fn test_mutation_on_missing_file_reports_lock_error() {
    let dir = tempdir().unwrap();
    let acl = dir.path().join("absent.acl");
    let mut s = store();

    let err = s.add(&acl, "alice").unwrap_err();
    assert_eq!(err.status_code(), StatusCode::LockError);
    assert!(!acl.exists());
    assert!(!s.check(&acl, "alice"));
}

#[test]
fn test_invalid_principals_are_rejected() {
    let dir = tempdir().unwrap();
    let acl = dir.path().join("inv.acl");
    let mut s = store();
    s.initialize(&acl, 0o600).unwrap();

    for bad in ["", ".admin", "@EXAMPLE.ORG", "@"] {
        let err = s.add(&acl, bad).unwrap_err();
        assert!(
            matches!(err, AclStoreError::InvalidPrincipal { .. }),
            "{bad:?} accepted"
        );
        assert!(!s.check(&acl, bad));
    }
    assert_eq!(fs::read_to_string(&acl).unwrap(), "");
}

#[cfg(unix)]
#[test]
fn test_initialize_mode_includes_owner_rw() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempdir().unwrap();
    let acl = dir.path().join("mode.acl");
    let mut s = store();
    s.initialize(&acl, 0o040).unwrap();

    let mode = fs::metadata(&acl).unwrap().permissions().mode() & 0o777;
    assert_eq!(mode & 0o600, 0o600);

    // Повторная инициализация сохраняет права существующего файла.
    fs::set_permissions(&acl, fs::Permissions::from_mode(0o640)).unwrap();
    s.add(&acl, "alice").unwrap();
    s.initialize(&acl, 0o600).unwrap();
    let mode = fs::metadata(&acl).unwrap().permissions().mode() & 0o777;
    assert_eq!(mode, 0o640);
    assert!(s.entries(&acl).unwrap().is_empty());
}
