use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

/// All tests here exercise argument handling and pre-flight validation only;
/// every case fails or exits before any provider is contacted.

#[test]
fn help_describes_the_interface() {
    let mut cmd = Command::cargo_bin("webhoist").expect("Binary exists");
    cmd.arg("--help");

    cmd.assert()
        .success()
        .stdout(
            predicate::str::contains("--storage")
                .and(predicate::str::contains("--base-domain"))
                .and(predicate::str::contains("<DOMAIN>")),
        );
}

#[test]
fn missing_arguments_fail_with_usage() {
    let mut cmd = Command::cargo_bin("webhoist").expect("Binary exists");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn apex_domain_is_rejected() {
    let folder = tempdir().expect("temp folder");
    let mut cmd = Command::cargo_bin("webhoist").expect("Binary exists");
    cmd.arg("example.com")
        .arg(folder.path())
        .current_dir(folder.path());

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("not a subdomain"));
}

#[test]
fn ambiguous_base_domain_requires_the_flag() {
    let folder = tempdir().expect("temp folder");
    let mut cmd = Command::cargo_bin("webhoist").expect("Binary exists");
    cmd.arg("www.site.example.com")
        .arg(folder.path())
        .current_dir(folder.path());

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("--base-domain"));
}

#[test]
fn base_domain_flag_must_match_a_candidate() {
    let folder = tempdir().expect("temp folder");
    let mut cmd = Command::cargo_bin("webhoist").expect("Binary exists");
    cmd.arg("www.site.example.com")
        .arg(folder.path())
        .arg("--base-domain")
        .arg("unrelated.org")
        .current_dir(folder.path());

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("is not a base domain of"));
}

#[test]
fn github_storage_requires_a_token() {
    let folder = tempdir().expect("temp folder");
    let mut cmd = Command::cargo_bin("webhoist").expect("Binary exists");
    // Run from the temp folder so no .env can supply the token.
    cmd.arg("site.example.com")
        .arg(folder.path())
        .current_dir(folder.path())
        .env_remove("GITHUB_TOKEN");

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("GitHub client"));
}

#[test]
fn unknown_storage_provider_is_rejected_by_the_parser() {
    let folder = tempdir().expect("temp folder");
    let mut cmd = Command::cargo_bin("webhoist").expect("Binary exists");
    cmd.arg("site.example.com")
        .arg(folder.path())
        .arg("--storage")
        .arg("ftp")
        .current_dir(folder.path());

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("invalid value"));
}
