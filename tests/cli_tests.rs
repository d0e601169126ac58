mod common;

use assert_cmd::Command;
use common::{sample_db, write_temp};
use predicates::prelude::*;

/// Helper to create an mmdb command
fn mmdb_cmd() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("mmdb"))
}

#[test]
fn test_help() {
    mmdb_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("MaxMind DB"));
}

#[test]
fn test_version() {
    mmdb_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("mmdb"));
}

#[test]
fn test_lookup_prints_json() {
    let db = write_temp(&sample_db(4, 24));
    mmdb_cmd()
        .arg("lookup")
        .arg(db.path())
        .arg("1.2.3.4")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"network\": \"1.2.3.0/24\""))
        .stdout(predicate::str::contains("\"iso_code\": \"US\""));
}

#[test]
fn test_lookup_ipv4_in_ipv6_database() {
    let db = write_temp(&sample_db(6, 28));
    mmdb_cmd()
        .args(["--in-memory", "lookup"])
        .arg(db.path())
        .arg("1.2.3.4")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"prefix_len\": 24"));
}

#[test]
fn test_lookup_network_covering_all_ipv4() {
    let mut w = common::MmdbWriter::new(6, 24);
    w.insert("::/1", &common::s("low"));
    let db = write_temp(&w.build());
    mmdb_cmd()
        .arg("lookup")
        .arg(db.path())
        .arg("1.2.3.4")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"network\": \"0.0.0.0/0\""));
}

#[test]
fn test_lookup_with_path() {
    let db = write_temp(&sample_db(4, 28));
    mmdb_cmd()
        .arg("lookup")
        .arg(db.path())
        .args(["1.2.3.4", "subdivisions", "-1", "iso_code"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"data\": \"SF\""));
}

#[test]
fn test_lookup_missing_path() {
    let db = write_temp(&sample_db(4, 24));
    mmdb_cmd()
        .arg("lookup")
        .arg(db.path())
        .args(["1.2.3.4", "country", "capital"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No value at path"));
}

#[test]
fn test_lookup_not_found() {
    let db = write_temp(&sample_db(4, 24));
    mmdb_cmd()
        .arg("lookup")
        .arg(db.path())
        .arg("8.8.8.8")
        .assert()
        .failure()
        .stderr(predicate::str::contains("No record for 8.8.8.8"));
}

#[test]
fn test_lookup_ipv6_in_ipv4_database() {
    let db = write_temp(&sample_db(4, 24));
    mmdb_cmd()
        .arg("lookup")
        .arg(db.path())
        .arg("2001:db8::1")
        .assert()
        .failure()
        .stderr(predicate::str::contains("IPv4-only"));
}

#[test]
fn test_missing_database() {
    mmdb_cmd()
        .args(["lookup", "/nonexistent/db.mmdb", "1.2.3.4"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load database"));
}

#[test]
fn test_metadata_text() {
    let db = write_temp(&sample_db(6, 32));
    mmdb_cmd()
        .arg("metadata")
        .arg(db.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("Test-City"))
        .stdout(predicate::str::contains("IPv6"))
        .stdout(predicate::str::contains("2023-11-14 22:13:20 UTC"))
        .stdout(predicate::str::contains("de: Testdatenbank"));
}

#[test]
fn test_metadata_json() {
    let db = write_temp(&sample_db(4, 24));
    let output = mmdb_cmd()
        .arg("metadata")
        .arg(db.path())
        .arg("--json")
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["metadata"]["record_size"], 24);
    assert_eq!(json["metadata"]["languages"][0], "en");
    assert_eq!(json["metadata"]["description"][0]["language"], "en");
}

#[test]
fn test_dump() {
    let db = write_temp(&sample_db(4, 24));
    mmdb_cmd()
        .arg("dump")
        .arg(db.path())
        .arg("89.160.20.5")
        .assert()
        .success()
        .stdout(predicate::str::contains("89.160.20.0/24"))
        .stdout(predicate::str::contains("\"SE\" <utf8_string>"));
}

#[test]
fn test_node() {
    let db = write_temp(&sample_db(4, 24));
    mmdb_cmd()
        .arg("node")
        .arg(db.path())
        .arg("0")
        .assert()
        .success()
        .stdout(predicate::str::contains("right:"))
        .stdout(predicate::str::contains("empty"));

    mmdb_cmd()
        .arg("node")
        .arg(db.path())
        .arg("0")
        .arg("--json")
        .assert()
        .success()
        .stdout(predicate::str::contains("left_record_type"));

    mmdb_cmd()
        .arg("node")
        .arg(db.path())
        .arg("100000")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Cannot read node"));
}
