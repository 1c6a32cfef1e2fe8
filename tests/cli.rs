//! End-to-end tests driving the binary.
//!
//! Runs that need the service point `--api-base-url` at a local wiremock
//! server. The environment is cleared for every run so that `SOOS_*`
//! variables of the host cannot leak in.

use std::fs;
use std::path::Path;

use assert_cmd::assert::{Assert, OutputAssertExt};
use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::{json, Value};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn soos() -> Command {
    let mut cmd = Command::cargo_bin("soos-sca").unwrap();
    cmd.env_clear();
    cmd
}

/// Mount every endpoint of one healthy scan; polls answer `status_body`.
async fn mount_service(server: &MockServer, status_body: Value) {
    mount_service_with(
        server,
        json!([
            {
                "packageManager": "NPM",
                "manifests": [{ "pattern": "package.json", "isLockFile": false }]
            }
        ]),
        status_body,
    )
    .await;
}

async fn mount_service_with(server: &MockServer, catalogue: Value, status_body: Value) {
    Mock::given(method("GET"))
        .and(path("/api/clients/client-1/manifests"))
        .respond_with(ResponseTemplate::new(200).set_body_json(catalogue))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/clients/client-1/scan-types/sca/scans"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "clientHash": "client-1",
            "projectHash": "proj",
            "branchHash": "br",
            "analysisId": "an",
            "scanStatusUrl": format!("{}/status/an", server.uri()),
            "scanUrl": "https://app.example.test/an"
        })))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/clients/client-1/projects/proj/analysis/an/manifests"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "manifests": [{ "filename": "package.json", "status": "Valid" }],
            "validManifestCount": 1,
            "invalidManifestCount": 0
        })))
        .mount(server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/api/clients/client-1/projects/proj/analysis/an"))
        .respond_with(ResponseTemplate::new(200))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/status/an"))
        .respond_with(ResponseTemplate::new(200).set_body_json(status_body))
        .mount(server)
        .await;
}

fn project(dir: &Path) {
    fs::create_dir_all(dir.join("web")).unwrap();
    fs::write(dir.join("web/package.json"), "{\"name\": \"demo\"}").unwrap();
}

fn scan_args(server: &MockServer, dir: &Path) -> Vec<String> {
    vec![
        "--api-base-url".into(),
        format!("{}/api", server.uri()),
        "--project-name".into(),
        "demo".into(),
        "--client-id".into(),
        "client-1".into(),
        "--api-key".into(),
        "key-1".into(),
        "--working-directory".into(),
        dir.to_string_lossy().into_owned(),
    ]
}

fn count_lines(stdout: &[u8], needle: &str) -> usize {
    String::from_utf8_lossy(stdout)
        .lines()
        .filter(|line| line.contains(needle))
        .count()
}

/// Run the binary off the async runtime so the mock server keeps serving.
async fn run_blocking(mut cmd: Command) -> Assert {
    let output = tokio::task::spawn_blocking(move || cmd.output().unwrap())
        .await
        .unwrap();
    output.assert()
}

mod configuration {
    use super::*;

    #[test]
    fn version_flag() {
        soos()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
    }

    #[test]
    fn missing_values_are_listed_together() {
        soos()
            .args(["--client-id", "client-1"])
            .assert()
            .code(0)
            .stdout(predicate::str::contains("SOOS_API_KEY, SOOS_PROJECT_NAME"));
    }

    #[test]
    fn missing_values_fail_the_build_when_asked() {
        soos()
            .args(["--on-failure", "fail_the_build"])
            .assert()
            .code(1)
            .stdout(predicate::str::contains("missing required configuration"));
    }

    #[test]
    fn environment_supplies_values() {
        soos()
            .env("SOOS_ON_FAILURE", "fail_the_build")
            .assert()
            .code(1);
    }

    #[test]
    fn command_line_overrides_environment() {
        soos()
            .env("SOOS_ON_FAILURE", "fail_the_build")
            .args(["--on-failure", "continue_on_failure"])
            .assert()
            .code(0);
    }

    #[test]
    fn api_key_is_never_logged() {
        soos()
            .args(["--api-key", "super-secret-key", "--log-level", "debug"])
            .assert()
            .stdout(predicate::str::contains("super-secret-key").not());
    }

    #[test]
    fn unknown_mode_is_rejected() {
        soos()
            .args(["--mode", "eventually"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("invalid value"));
    }
}

mod scans {
    use super::*;

    #[tokio::test(flavor = "multi_thread")]
    async fn finished_without_issues_exits_zero() {
        let server = MockServer::start().await;
        mount_service(
            &server,
            json!({
                "status": "Finished",
                "vulnerabilities": { "count": 0 },
                "violations": { "count": 0 }
            }),
        )
        .await;
        let dir = TempDir::new().unwrap();
        project(dir.path());

        let mut cmd = soos();
        cmd.args(scan_args(&server, dir.path()))
            .args(["--on-failure", "fail_the_build"]);

        run_blocking(cmd)
            .await
            .code(0)
            .stdout(predicate::str::contains("Found manifest file:"))
            .stdout(predicate::str::contains("Analysis Completed Successfully"))
            .stdout(predicate::str::contains("Vulnerabilities:").not())
            .stdout(predicate::str::contains("Violations:").not())
            .stdout(predicate::str::contains("key-1").not());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn failed_analysis_follows_on_failure_policy() {
        let server = MockServer::start().await;
        mount_service(
            &server,
            json!({
                "status": "FailedWithIssues",
                "vulnerabilities": { "count": 2 },
                "violations": { "count": 0 }
            }),
        )
        .await;
        let dir = TempDir::new().unwrap();
        project(dir.path());

        let mut fail = soos();
        fail.args(scan_args(&server, dir.path()))
            .args(["--on-failure", "fail_the_build"]);
        run_blocking(fail)
            .await
            .code(1)
            .stdout(predicate::str::contains("Vulnerabilities: 2"))
            .stdout(predicate::str::contains(
                "Analysis complete - Failures reported.",
            ));

        let mut carry_on = soos();
        carry_on
            .args(scan_args(&server, dir.path()))
            .args(["--on-failure", "continue_on_failure"]);
        run_blocking(carry_on).await.code(0);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn async_init_then_async_result() {
        let server = MockServer::start().await;
        mount_service(&server, json!({ "status": "Finished" })).await;
        let dir = TempDir::new().unwrap();
        project(dir.path());

        let mut init = soos();
        init.args(scan_args(&server, dir.path()))
            .args(["--mode", "async_init"]);
        run_blocking(init).await.code(0);

        let state: Value =
            serde_json::from_str(&fs::read_to_string(dir.path().join("soos_async.json")).unwrap())
                .unwrap();
        assert_eq!(
            state["report_status_url"],
            format!("{}/status/an", server.uri())
        );

        let mut result = soos();
        result
            .args(scan_args(&server, dir.path()))
            .args(["--mode", "async_result"]);
        run_blocking(result)
            .await
            .code(0)
            .stdout(predicate::str::contains("Analysis Completed Successfully"));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn excluded_files_are_logged_once_each() {
        let server = MockServer::start().await;
        mount_service_with(
            &server,
            json!([
                { "packageManager": "NPM", "manifests": [{ "pattern": "package.json" }] },
                { "packageManager": "Cargo", "manifests": [
                    { "pattern": "Cargo.toml" },
                    { "pattern": "Cargo.lock", "isLockFile": true }
                ] },
                { "packageManager": "Dart", "manifests": [{ "pattern": "pubspec.yaml" }] },
                { "packageManager": "PHP", "manifests": [{ "pattern": "composer.json" }] },
                { "packageManager": "Python", "manifests": [{ "pattern": "requirements.txt" }] }
            ]),
            json!({ "status": "Finished" }),
        )
        .await;
        let dir = TempDir::new().unwrap();
        for (name, contents) in [
            ("pubspec.yaml", "name: demo"),
            ("composer.json", "{}"),
            ("cargo.toml", "[package]"),
            ("cargo.lock", "version = 3"),
            ("package.json", "{}"),
            ("requirements.txt", "requests==2.0"),
        ] {
            fs::write(dir.path().join(name), contents).unwrap();
        }

        let mut cmd = soos();
        cmd.args(scan_args(&server, dir.path()))
            .args(["--files-to-exclude", "pubspec.yaml, *composer.json, cargo*"]);
        let assert = run_blocking(cmd).await.code(0);
        let stdout = &assert.get_output().stdout;

        assert_eq!(
            count_lines(stdout, "Skipping file due to files_to_exclude:"),
            4
        );
        assert_eq!(count_lines(stdout, "Found manifest file:"), 2);
        assert_eq!(
            count_lines(stdout, "FILES_TO_EXCLUDE: pubspec.yaml, *composer.json, cargo*"),
            1
        );
    }

    #[test]
    fn async_result_without_state_is_fatal() {
        let dir = TempDir::new().unwrap();
        soos()
            .args([
                "--mode",
                "async_result",
                "--project-name",
                "demo",
                "--client-id",
                "client-1",
                "--api-key",
                "key-1",
                "--api-base-url",
                "http://127.0.0.1:1/api",
            ])
            .arg("--working-directory")
            .arg(dir.path())
            .assert()
            .code(1)
            .stdout(predicate::str::contains("soos_async.json"));
    }
}
