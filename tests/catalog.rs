mod common;

use assert_cmd::Command;
use predicates::prelude::PredicateBooleanExt;
use predicates::str::contains;

use common::{TestWorkspace, fixture_path};

#[test]
fn catalog_prints_the_builtin_contract() {
    Command::cargo_bin("grant-scrub")
        .expect("binary exists")
        .arg("catalog")
        .assert()
        .success()
        .stdout(contains("Payment Submitted? Boolean").and(contains("Household Size")));
}

#[test]
fn exported_catalog_round_trips_through_clean() {
    let workspace = TestWorkspace::new();
    let catalog_path = workspace.path().join("grants.yml");
    Command::cargo_bin("grant-scrub")
        .expect("binary exists")
        .args(["catalog", "-o", catalog_path.to_str().unwrap()])
        .assert()
        .success();

    let builtin_out = workspace.path().join("builtin.csv");
    let exported_out = workspace.path().join("exported.csv");
    for (out, extra) in [
        (&builtin_out, Vec::new()),
        (
            &exported_out,
            vec!["--catalog", catalog_path.to_str().unwrap()],
        ),
    ] {
        let raw_grants = fixture_path("raw_grants.csv");
        let mut args = vec![
            "clean",
            "-i",
            raw_grants.to_str().unwrap(),
            "-o",
            out.to_str().unwrap(),
            "--as-of",
            "2025-06-01",
        ];
        args.extend(extra);
        Command::cargo_bin("grant-scrub")
            .expect("binary exists")
            .args(&args)
            .assert()
            .success();
    }

    let builtin_contents = std::fs::read_to_string(&builtin_out).expect("builtin output");
    let exported_contents = std::fs::read_to_string(&exported_out).expect("exported output");
    assert_eq!(builtin_contents, exported_contents);
}

#[test]
fn clean_rejects_an_invalid_catalog() {
    let workspace = TestWorkspace::new();
    let bad = workspace.write("bad.yml", "fields: {not: a list}\n");
    Command::cargo_bin("grant-scrub")
        .expect("binary exists")
        .args([
            "clean",
            "-i",
            fixture_path("raw_grants.csv").to_str().unwrap(),
            "--catalog",
            bad.to_str().unwrap(),
        ])
        .assert()
        .failure()
        .stderr(contains("catalog"));
}
