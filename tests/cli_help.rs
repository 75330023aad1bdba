use assert_cmd::Command;

fn normalize_output(output: &[u8]) -> String {
    String::from_utf8_lossy(output).replace("\r\n", "\n")
}

#[test]
fn cli_help_prints_expected_banner() {
    let assert = Command::cargo_bin("kdk")
        .expect("binary")
        .arg("--help")
        .assert()
        .success();

    let stdout = normalize_output(&assert.get_output().stdout);
    assert!(stdout.contains("A full kubernetes development environment in a container"));
    assert!(stdout.contains("--name"));
    assert!(stdout.contains("--verbose"));
}

#[test]
fn cli_version_matches_the_tool_version() {
    Command::cargo_bin("kdk")
        .expect("binary")
        .arg("--version")
        .assert()
        .success()
        .stdout(predicates::str::contains("0.7.0"));
}
