//! HttpScaApi against a local mock HTTP server.

use serde_json::json;
use wiremock::matchers::{body_partial_json, body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use soos_sca::api::http::API_KEY_HEADER;
use soos_sca::api::{
    ApiError, CreateScanRequest, HttpScaApi, ManifestFile, ManifestUpload, ScaApi,
};
use soos_sca::core::types::{AnalysisStatus, ScanSession, ScanStatus};

const CLIENT: &str = "client-1";
const KEY: &str = "key-1";

fn api(server: &MockServer) -> HttpScaApi {
    HttpScaApi::new(format!("{}/api", server.uri()), CLIENT, KEY).unwrap()
}

fn session(server: &MockServer) -> ScanSession {
    ScanSession {
        client_id: CLIENT.into(),
        project_id: "proj".into(),
        branch_id: "br".into(),
        analysis_id: "an".into(),
        scan_status_url: format!("{}/status/an", server.uri()),
        scan_report_url: None,
    }
}

fn upload() -> ManifestUpload {
    ManifestUpload {
        files: vec![ManifestFile {
            file_name: "package.json".into(),
            parent_folder: "web".into(),
            contents: "{\"name\": \"demo\"}".into(),
        }],
        has_more_than_maximum: false,
    }
}

const ANALYSIS_PATH: &str = "/api/clients/client-1/projects/proj/analysis/an";
const SCAN_PATH: &str = "/api/clients/client-1/projects/proj/branches/br/scan-types/sca/scans/an";

mod requests {
    use super::*;

    #[tokio::test]
    async fn manifest_patterns_sends_api_key() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/clients/client-1/manifests"))
            .and(header(API_KEY_HEADER, KEY))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {
                    "packageManager": "NPM",
                    "manifests": [{ "pattern": "package.json", "isLockFile": false }]
                }
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let catalogue = api(&server).manifest_patterns().await.unwrap();

        assert_eq!(catalogue.len(), 1);
        assert_eq!(catalogue[0].package_manager, "NPM");
        assert_eq!(catalogue[0].manifests[0].pattern, "package.json");
    }

    #[tokio::test]
    async fn create_scan_posts_metadata() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/clients/client-1/scan-types/sca/scans"))
            .and(body_partial_json(json!({
                "projectName": "demo",
                "branch": "main",
                "integrationType": "Script"
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "clientHash": "client-1",
                "projectHash": "proj",
                "branchHash": "br",
                "analysisId": "an",
                "scanStatusUrl": "https://api.example.test/status/an",
                "scanUrl": "https://app.example.test/an",
                "unused": true
            })))
            .expect(1)
            .mount(&server)
            .await;

        let request = CreateScanRequest {
            project_name: "demo".into(),
            name: "1".into(),
            integration_name: "Script".into(),
            integration_type: "Script".into(),
            script_version: "0.0.0".into(),
            branch: Some("main".into()),
            ..Default::default()
        };
        let session = api(&server).create_scan(&request).await.unwrap();

        assert_eq!(session.analysis_id, "an");
        assert_eq!(session.scan_status_url, "https://api.example.test/status/an");
        assert_eq!(
            session.scan_report_url.as_deref(),
            Some("https://app.example.test/an")
        );
    }

    #[tokio::test]
    async fn upload_is_multipart_with_parent_folders() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("{}/manifests", ANALYSIS_PATH)))
            .and(body_string_contains("name=\"file0\"; filename=\"package.json\""))
            .and(body_string_contains("name=\"parentFolder0\""))
            .and(body_string_contains("hasMoreThanMaximumManifests"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "message": "Manifests received",
                "manifests": [{ "filename": "package.json", "status": "Valid" }],
                "validManifestCount": 1,
                "invalidManifestCount": 0
            })))
            .expect(1)
            .mount(&server)
            .await;

        let summary = api(&server)
            .upload_manifests(&session(&server), &upload())
            .await
            .unwrap();

        assert_eq!(summary.valid_manifest_count, 1);
        assert_eq!(summary.manifests[0].status.as_deref(), Some("Valid"));
    }

    #[tokio::test]
    async fn start_and_patch_use_scan_routes() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path(ANALYSIS_PATH))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("PATCH"))
            .and(path(SCAN_PATH))
            .and(body_partial_json(json!({
                "status": "Incomplete",
                "message": "nothing to scan"
            })))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let client = api(&server);
        let session = session(&server);
        client.start_analysis(&session).await.unwrap();
        client
            .patch_scan_status(&session, ScanStatus::Incomplete, "nothing to scan")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn sarif_report_is_returned_as_json() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("{}/formats/sarif", SCAN_PATH)))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "version": "2.1.0", "runs": [] })),
            )
            .mount(&server)
            .await;

        let report = api(&server).sarif_report(&session(&server)).await.unwrap();

        assert_eq!(report["version"], "2.1.0");
    }

    #[tokio::test]
    async fn analysis_result_follows_absolute_status_url() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/status/an"))
            .and(header(API_KEY_HEADER, KEY))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "FailedWithIssues",
                "vulnerabilities": { "count": 4 },
                "violations": { "count": 0 }
            })))
            .mount(&server)
            .await;

        let result = api(&server)
            .analysis_result(&session(&server).scan_status_url)
            .await
            .unwrap();

        assert_eq!(result.analysis_status(), AnalysisStatus::Failed);
        assert_eq!(result.vulnerability_count(), 4);
    }
}

mod quirks_and_errors {
    use super::*;

    #[tokio::test]
    async fn upload_summary_on_bad_request_is_not_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("{}/manifests", ANALYSIS_PATH)))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "message": "No valid manifests",
                "manifests": [{ "filename": "package.json", "status": "Invalid" }],
                "validManifestCount": 0,
                "invalidManifestCount": 1
            })))
            .mount(&server)
            .await;

        let summary = api(&server)
            .upload_manifests(&session(&server), &upload())
            .await
            .unwrap();

        assert_eq!(summary.valid_manifest_count, 0);
        assert_eq!(summary.invalid_manifest_count, 1);
    }

    #[tokio::test]
    async fn upload_success_without_summary_is_parse_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(format!("{}/manifests", ANALYSIS_PATH)))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;

        let err = api(&server)
            .upload_manifests(&session(&server), &upload())
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::Parse(_)));
    }

    #[tokio::test]
    async fn structured_error_body_is_application_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/clients/client-1/scan-types/sca/scans"))
            .respond_with(ResponseTemplate::new(403).set_body_json(json!({
                "code": "Forbidden",
                "message": "API key revoked"
            })))
            .mount(&server)
            .await;

        let err = api(&server)
            .create_scan(&CreateScanRequest::default())
            .await
            .unwrap_err();

        assert_eq!(
            err,
            ApiError::Application {
                status: 403,
                code: "Forbidden".into(),
                message: "API key revoked".into(),
            }
        );
    }

    #[tokio::test]
    async fn redirect_status_on_poll_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/status/an"))
            .respond_with(ResponseTemplate::new(304))
            .mount(&server)
            .await;

        let err = api(&server)
            .analysis_result(&session(&server).scan_status_url)
            .await
            .unwrap_err();

        assert_eq!(err.status(), Some(304));
    }

    #[tokio::test]
    async fn empty_success_body_is_parse_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/status/an"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let err = api(&server)
            .analysis_result(&session(&server).scan_status_url)
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::Parse(_)));
    }

    #[tokio::test]
    async fn refused_connection_is_network_error() {
        let client = HttpScaApi::new("http://127.0.0.1:1/api", CLIENT, KEY).unwrap();

        let err = client.manifest_patterns().await.unwrap_err();

        assert!(err.is_network());
    }

    #[test]
    fn api_key_with_newline_is_rejected() {
        let err = HttpScaApi::new("https://api.example.test/api", CLIENT, "bad\nkey").unwrap_err();
        assert!(matches!(err, ApiError::Config(_)));
    }

    #[test]
    fn debug_hides_api_key() {
        let client = HttpScaApi::new("https://api.example.test/api", CLIENT, KEY).unwrap();
        assert!(!format!("{:?}", client).contains(KEY));
    }
}
