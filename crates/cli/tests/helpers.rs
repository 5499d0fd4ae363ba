use std::fs;

use tempfile::tempdir;
use upgrade_harness::commands::{ensure_writable, GenerateOverrides};
use upgrade_harness::{canonicalize_or_current, sha256_bytes, sha256_file};
use upgrade_harness_core::config::{HarnessOptions, Mode};

#[test]
fn canonicalize_or_current_returns_cwd_for_dot() {
    let cwd = std::env::current_dir().expect("cwd");
    assert_eq!(canonicalize_or_current(".").expect("canonicalize"), cwd);
}

#[test]
fn canonicalize_or_current_joins_missing_paths_to_cwd() {
    let cwd = std::env::current_dir().expect("cwd");
    let result = canonicalize_or_current("not-yet-created/out").expect("canonicalize");
    assert_eq!(result, cwd.join("not-yet-created/out"));
}

#[test]
fn sha256_of_file_matches_bytes() {
    let dir = tempdir().expect("tempdir");
    let path = dir.path().join("data.txt");
    fs::write(&path, b"abc").expect("write");
    let expected = "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad";
    assert_eq!(sha256_bytes(b"abc"), expected);
    assert_eq!(sha256_file(&path).expect("hash"), expected);
}

#[test]
fn ensure_writable_requires_force_for_existing_outputs() {
    let dir = tempdir().expect("tempdir");
    let existing = vec![dir.path().join("DiffFuzzUpgrades.sol")];
    assert!(ensure_writable(&[], false).is_ok());
    assert!(ensure_writable(&existing, true).is_ok());
    let err = ensure_writable(&existing, false).expect_err("needs force");
    assert!(err.to_string().contains("--force"));
}

#[test]
fn overrides_only_raise_flags() {
    let mut options = HarnessOptions { live_dispatch: true, ..Default::default() };
    let overrides = GenerateOverrides {
        mode: Some(Mode::Fork),
        contract_name: Some("Diff".into()),
        fuzz_upgrade: true,
        ..Default::default()
    };
    overrides.apply(&mut options);
    assert_eq!(options.mode, Mode::Fork);
    assert_eq!(options.contract_name, "Diff");
    assert!(options.fuzz_upgrade);
    assert!(options.live_dispatch);
    assert!(!options.include_protected);
    assert_eq!(options.solc_version, "0.8.0");
}
