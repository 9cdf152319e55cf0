//! Integration tests for the HTTP client against a mock API server

use mockito::{Matcher, Server, ServerGuard};
use sizer_lib::{AtlasClient, ClientConfig, ClientError, Credentials, Fetch, ResourceClient, SampleSpan};
use std::time::Duration;

const V2_MEDIA_TYPE: &str = "application/vnd.atlas.2025-11-02+json";

fn client(server: &ServerGuard) -> AtlasClient {
    let config = ClientConfig {
        base_url: format!("{}/api/atlas/v1.0", server.url()),
        v2_base_url: format!("{}/api/atlas/v2/", server.url()),
        v2_media_type: V2_MEDIA_TYPE.to_string(),
        request_timeout: Duration::from_secs(5),
    };
    AtlasClient::new(Credentials::new("public", "private"), config).unwrap()
}

fn data<T: std::fmt::Debug>(fetch: Fetch<T>) -> T {
    match fetch {
        Fetch::Data(data) => data,
        other => panic!("expected data, got {:?}", other),
    }
}

#[tokio::test]
async fn test_answers_digest_challenge() {
    let mut server = Server::new_async().await;

    let challenge = server
        .mock("GET", "/api/atlas/v1.0/groups/p1/clusters")
        .match_header("authorization", Matcher::Missing)
        .with_status(401)
        .with_header(
            "www-authenticate",
            r#"Digest realm="MMS Public API", nonce="abc123", algorithm=MD5, qop="auth""#,
        )
        .create_async()
        .await;

    let authorized = server
        .mock("GET", "/api/atlas/v1.0/groups/p1/clusters")
        .match_header("authorization", Matcher::Regex(r#"^Digest .*username="public""#.to_string()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"results": [{"name": "orders"}, {"name": "billing"}], "totalCount": 2}"#)
        .create_async()
        .await;

    let clusters = client(&server).list_clusters("p1").await.unwrap();

    assert_eq!(clusters.len(), 2);
    assert_eq!(clusters[0]["name"], "orders");
    challenge.assert_async().await;
    authorized.assert_async().await;
}

#[tokio::test]
async fn test_required_call_failure_is_an_error() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/api/atlas/v1.0/orgs/org-1/groups")
        .with_status(500)
        .with_body("internal failure")
        .create_async()
        .await;

    let err = client(&server).list_projects("org-1").await.unwrap_err();

    assert_eq!(err.status().map(|s| s.as_u16()), Some(500));
    match err {
        ClientError::Status { endpoint, body, .. } => {
            assert_eq!(endpoint, "/api/atlas/v1.0/orgs/org-1/groups");
            assert_eq!(body, "internal failure");
        }
        other => panic!("expected status error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_unanswerable_unauthorized_is_an_error() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/api/atlas/v1.0/groups/p1")
        .with_status(401)
        .create_async()
        .await;

    let err = client(&server).get_project("p1").await.unwrap_err();
    assert_eq!(err.status().map(|s| s.as_u16()), Some(401));
}

#[tokio::test]
async fn test_optional_call_failure_degrades() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/api/atlas/v1.0/groups/p1/processes")
        .with_status(404)
        .create_async()
        .await;

    let fetch = client(&server).list_processes("p1").await;
    assert!(matches!(fetch, Fetch::Failed(ClientError::Status { .. })));
}

#[tokio::test]
async fn test_empty_listing_is_empty() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/api/atlas/v1.0/groups/p1/processes")
        .with_status(200)
        .with_body(r#"{"results": []}"#)
        .create_async()
        .await;

    let fetch = client(&server).list_processes("p1").await;
    assert!(matches!(fetch, Fetch::Empty));
}

#[tokio::test]
async fn test_process_without_hostname_keeps_listing() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/api/atlas/v1.0/groups/p1/processes")
        .with_status(200)
        .with_body(
            r#"{"results": [
                {"id": "a.net:27017", "hostname": "a.net", "typeName": "REPLICA_PRIMARY"},
                {"id": "b.net:27017", "hostname": null, "userAlias": null}
            ]}"#,
        )
        .create_async()
        .await;

    let processes = data(client(&server).list_processes("p1").await);
    assert_eq!(processes.len(), 2);
    assert_eq!(processes[0].hostname.as_deref(), Some("a.net"));
    assert!(processes[1].hostname.is_none());
}

#[tokio::test]
async fn test_null_results_is_empty() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/api/atlas/v1.0/groups/p1/processes")
        .with_status(200)
        .with_body(r#"{"results": null}"#)
        .create_async()
        .await;

    let fetch = client(&server).list_processes("p1").await;
    assert!(matches!(fetch, Fetch::Empty));
}

#[tokio::test]
async fn test_process_measurements_query() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", "/api/atlas/v1.0/groups/p1/processes/host:27017/measurements")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("granularity".into(), "PT1M".into()),
            Matcher::UrlEncoded("period".into(), "P2D".into()),
            Matcher::UrlEncoded("measurementType".into(), "MEMORY".into()),
        ]))
        .with_status(200)
        .with_body(
            r#"{
                "measurements": [{
                    "name": "SYSTEM_MEMORY_USED",
                    "units": "KILOBYTES",
                    "dataPoints": [
                        {"timestamp": "2024-03-01T02:00:00Z", "value": 2048.0},
                        {"timestamp": "2024-03-01T02:01:00Z", "value": null}
                    ]
                }]
            }"#,
        )
        .create_async()
        .await;

    let fetch = client(&server)
        .get_process_measurements("p1", "host:27017", "MEMORY", &SampleSpan::default())
        .await;

    let measurements = data(fetch);
    assert_eq!(measurements.len(), 1);
    assert_eq!(measurements[0].name, "SYSTEM_MEMORY_USED");
    assert_eq!(measurements[0].data_points[0].value, Some(2048.0));
    assert_eq!(measurements[0].data_points[1].value, None);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_disk_calls_use_versioned_media_type() {
    let mut server = Server::new_async().await;
    let disks = server
        .mock("GET", "/api/atlas/v2/groups/p1/processes/host:27017/disks")
        .match_header("accept", V2_MEDIA_TYPE)
        .with_status(200)
        .with_body(r#"{"results": [{"partitionName": "data"}]}"#)
        .create_async()
        .await;
    let measurements = server
        .mock("GET", "/api/atlas/v2/groups/p1/processes/host:27017/disks/data/measurements")
        .match_header("accept", V2_MEDIA_TYPE)
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("measurementTypes".into(), "DISK_PARTITION_IOPS_TOTAL".into()),
            Matcher::UrlEncoded("period".into(), "P1D".into()),
        ]))
        .with_status(200)
        .with_body(
            r#"{"measurements": [{"name": "DISK_PARTITION_IOPS_TOTAL", "dataPoints": []}]}"#,
        )
        .create_async()
        .await;

    let api = client(&server);
    let partitions = data(api.list_disks("p1", "host:27017").await);
    assert_eq!(partitions[0].partition_name.as_deref(), Some("data"));

    let span = SampleSpan {
        granularity: "PT5M".to_string(),
        period: "P1D".to_string(),
    };
    let fetch = api
        .get_disk_measurements("p1", "host:27017", "data", &["DISK_PARTITION_IOPS_TOTAL"], &span)
        .await;
    assert_eq!(data(fetch)[0].name, "DISK_PARTITION_IOPS_TOTAL");

    disks.assert_async().await;
    measurements.assert_async().await;
}

#[tokio::test]
async fn test_malformed_body_is_a_decode_error() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/api/atlas/v1.0/groups/p1")
        .with_status(200)
        .with_body("not json")
        .create_async()
        .await;

    let err = client(&server).get_project("p1").await.unwrap_err();
    assert!(matches!(err, ClientError::Decode { .. }));
}
