use std::fs;
use std::path::{Path, PathBuf};

use predicates::prelude::*;
use tempfile::tempdir;
use upgrade_harness_core::output::OutputLayout;

const REQUEST: &str = r#"
v1:
  name: Counter
  path: src/CounterV1.sol
  functions:
    - name: increment
      inputs: [uint256]
      outputs: [bool]
    - name: count
      outputs: [uint256]
v2:
  name: Counter
  path: src/CounterV2.sol
  functions:
    - name: increment
      inputs: [uint256]
      outputs: [bool]
    - name: count
      outputs: [uint256]
    - name: decrement
      inputs: [uint256]
proxy:
  name: ERC1967Proxy
  path: src/ERC1967Proxy.sol
  functions:
    - name: admin
      outputs: [address]
  implementation_slot:
    name: IMPLEMENTATION_SLOT
    type: address
    slot: "0x360894a13ba1a3210667c828492db98dca3e2076cc3735a920a3ca505d382bbc"
    size: 160
diff:
  modified_functions:
    - name: increment
      parameters: [uint256]
  tainted_variables:
    - name: count
      ty: {kind: scalar, ty: uint256}
"#;

fn write_request(dir: &Path, contents: &str) -> PathBuf {
    let path = dir.join("request.yaml");
    fs::write(&path, contents).expect("write request");
    path
}

#[test]
fn generate_writes_harness_config_and_metadata() {
    let dir = tempdir().expect("tempdir");
    let request = write_request(dir.path(), REQUEST);
    let out = dir.path().join("out");

    assert_cmd::cargo::cargo_bin_cmd!("upgrade-harness")
        .arg("--quiet")
        .arg("generate")
        .arg("--request")
        .arg(&request)
        .arg("--out")
        .arg(&out)
        .arg("--fuzz-upgrade")
        .assert()
        .success()
        .stdout(predicate::str::contains("Generated differential harness"))
        .stdout(predicate::str::contains("Implementation slot: 0x360894a1"))
        .stdout(predicate::str::contains("Status: succeeded"));

    let layout = OutputLayout::new(&out, "DiffFuzzUpgrades");
    let source = fs::read_to_string(&layout.harness_path).expect("harness");
    assert!(source.contains("contract DiffFuzzUpgrades {"));
    assert!(source.contains("function Counter_increment(uint256 a) public virtual {"));
    assert!(source.contains("function Counter_count() public {"));
    assert!(source.contains("function upgradeV2() external virtual {"));

    let config = fs::read_to_string(&layout.config_path).expect("config");
    assert!(config.contains("testMode: assertion"));
    assert!(config.contains("corpusDir: corpus"));
    assert!(config.contains("codeSize: 65535"));
    assert!(layout.corpus_dir.is_dir());

    let metadata: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&layout.metadata_path).expect("metadata"))
            .expect("metadata json");
    assert_eq!(metadata["status"], "succeeded");
    assert_eq!(metadata["mode"], "deploy");
    assert_eq!(metadata["request_hash"].as_str().map(str::len), Some(64));
    assert_eq!(metadata["harness_hash"].as_str().map(str::len), Some(64));
}

#[test]
fn generate_refuses_to_overwrite_without_force() {
    let dir = tempdir().expect("tempdir");
    let request = write_request(dir.path(), REQUEST);
    let out = dir.path().join("out");

    let run = |force: bool| {
        let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("upgrade-harness");
        cmd.arg("generate").arg("--request").arg(&request).arg("--out").arg(&out);
        if force {
            cmd.arg("--force");
        }
        cmd.assert()
    };

    run(false).success();
    run(false).failure().stderr(predicate::str::contains("--force"));
    run(true).success();
}

#[test]
fn generate_honors_cli_overrides() {
    let dir = tempdir().expect("tempdir");
    let request = write_request(dir.path(), REQUEST);
    let out = dir.path().join("out");

    assert_cmd::cargo::cargo_bin_cmd!("upgrade-harness")
        .arg("generate")
        .arg("--request")
        .arg(&request)
        .arg("--out")
        .arg(&out)
        .arg("--contract-name")
        .arg("CounterDiff")
        .arg("--solc-version")
        .arg("0.6.12")
        .assert()
        .success();

    let source = fs::read_to_string(out.join("CounterDiff.sol")).expect("harness");
    assert!(source.contains("pragma solidity ^0.6.12;"));
    assert!(source.contains("contract CounterDiff {"));
    assert!(source.contains("constructor() public {"));
    assert!(!source.contains("upgradeV2"));
}

#[test]
fn generate_reports_gaps_as_incomplete() {
    let dir = tempdir().expect("tempdir");
    let request = write_request(
        dir.path(),
        &REQUEST.replace("    - name: increment\n      parameters: [uint256]", "    - name: ghost"),
    );
    let out = dir.path().join("out");

    assert_cmd::cargo::cargo_bin_cmd!("upgrade-harness")
        .arg("generate")
        .arg("--request")
        .arg(&request)
        .arg("--out")
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("Status: incomplete"))
        .stdout(predicate::str::contains("[unmatched_entry] Counter.ghost()"));

    let metadata = fs::read_to_string(out.join("run_metadata.json")).expect("metadata");
    assert!(metadata.contains("\"unmatched_entry\""));
}

#[test]
fn generate_fails_naming_the_malformed_contract() {
    let dir = tempdir().expect("tempdir");
    let raw = "v1: {name: Empty}\nv2: {name: Empty, functions: [{name: f}]}\n";
    let request = write_request(dir.path(), raw);
    let out = dir.path().join("out");

    assert_cmd::cargo::cargo_bin_cmd!("upgrade-harness")
        .arg("generate")
        .arg("--request")
        .arg(&request)
        .arg("--out")
        .arg(&out)
        .assert()
        .failure()
        .stderr(predicate::str::contains("Harness generation failed for contract Empty"));

    let metadata = fs::read_to_string(out.join("run_metadata.json")).expect("metadata");
    assert!(metadata.contains("\"failed\""));
    assert!(!out.join("DiffFuzzUpgrades.sol").exists());
}

#[test]
fn generate_fails_for_missing_request() {
    let dir = tempdir().expect("tempdir");
    assert_cmd::cargo::cargo_bin_cmd!("upgrade-harness")
        .arg("generate")
        .arg("--request")
        .arg(dir.path().join("absent.yaml"))
        .arg("--out")
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read request file"));
}

#[test]
fn fork_mode_uses_snapshot_and_network() {
    let dir = tempdir().expect("tempdir");
    let raw = r#"
v1:
  name: Counter
  address: "0x00000000000000000000000000000000000000a1"
  functions: [{name: increment, inputs: [uint256]}]
v2:
  name: Counter
  address: "0x00000000000000000000000000000000000000a2"
  functions: [{name: increment, inputs: [uint256]}]
proxy:
  name: Proxy
  address: "0x00000000000000000000000000000000000000b0"
  functions: [{name: admin, outputs: [address]}]
diff:
  modified_functions: [{name: increment, parameters: [uint256]}]
options:
  mode: fork
  network: {block: 100, timestamp: 200, rpc_url: "http://127.0.0.1:8545"}
storage_snapshot: storage.json
fuzzer:
  senders: ["0x10000"]
"#;
    let request = write_request(dir.path(), raw);
    fs::write(
        dir.path().join("storage.json"),
        r#"{"0x00000000000000000000000000000000000000b0": {
            "0x360894a13ba1a3210667c828492db98dca3e2076cc3735a920a3ca505d382bbc": "0xa1"
        }}"#,
    )
    .expect("write snapshot");
    let out = dir.path().join("out");

    assert_cmd::cargo::cargo_bin_cmd!("upgrade-harness")
        .arg("generate")
        .arg("--request")
        .arg(&request)
        .arg("--out")
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("(eip1967)"));

    let source = fs::read_to_string(out.join("DiffFuzzUpgrades.sol")).expect("harness");
    assert!(source.contains("hevm.roll(100);"));
    assert!(source.contains("fork2 = hevm.createFork();"));
    assert!(!source.contains("import {"));

    let config = fs::read_to_string(out.join("CryticConfig.yaml")).expect("config");
    assert!(config.contains("rpcUrl:"));
    assert!(config.contains("127.0.0.1:8545"));
    assert!(config.contains("rpcBlock: 100"));
    assert!(config.contains("0x10000"));
}
