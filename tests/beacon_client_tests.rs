//! End-to-end tests of the beacon node HTTP client against a mock server.

use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use validator_watch::beacon::{BeaconNodeHttpClient, Error, StateId};
use validator_watch::config::Config;
use validator_watch::logger::null_logger;
use validator_watch::types::{Epoch, Slot};
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_config(server_uri: &str) -> Config {
    serde_yaml::from_str(&format!(
        r#"
        beacon_node_url: "{}"
        validators: [100]
        store:
          hosts: ["127.0.0.1:9042"]
          keyspace: "validator_watch_test"
        "#,
        server_uri
    ))
    .unwrap()
}

fn test_client(server_uri: &str) -> BeaconNodeHttpClient {
    BeaconNodeHttpClient::new(&test_config(server_uri), CancellationToken::new(), null_logger())
        .unwrap()
}

fn genesis_body() -> serde_json::Value {
    serde_json::json!({
        "data": {
            "genesis_time": "1606824023",
            "genesis_validators_root": "0x4b363db94e286120d76eb905340fdd4e54bfe9f06bf33ff6cf5ad27f511bfe95",
            "genesis_fork_version": "0x00000000"
        }
    })
}

#[tokio::test]
async fn genesis_decodes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/eth/v1/beacon/genesis"))
        .respond_with(ResponseTemplate::new(200).set_body_json(genesis_body()))
        .expect(1)
        .mount(&server)
        .await;

    let genesis = test_client(&server.uri()).get_beacon_genesis().await.unwrap();
    assert_eq!(genesis.genesis_time, 1_606_824_023);
}

#[tokio::test]
async fn syncing_status_decodes() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/eth/v1/node/syncing"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "data": {
                "head_slot": "12345",
                "sync_distance": "0",
                "is_syncing": false,
                "is_optimistic": false,
                "el_offline": false
            }
        })))
        .mount(&server)
        .await;

    assert!(test_client(&server.uri()).is_node_synced().await.unwrap());
}

#[tokio::test]
async fn get_retries_on_503_then_succeeds() {
    let server = MockServer::start().await;

    // Two 503s, then a good response.
    Mock::given(method("GET"))
        .and(path("/eth/v1/beacon/genesis"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/eth/v1/beacon/genesis"))
        .respond_with(ResponseTemplate::new(200).set_body_json(genesis_body()))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let start = Instant::now();
    let genesis = client.get_beacon_genesis().await.unwrap();
    let elapsed = start.elapsed();

    assert_eq!(genesis.genesis_time, 1_606_824_023);
    // Two backoff waits: 100ms exactly, then 200ms +/- 20%.
    assert!(elapsed >= Duration::from_millis(240), "{:?}", elapsed);
    assert!(elapsed < Duration::from_secs(2), "{:?}", elapsed);
}

#[tokio::test]
async fn get_fails_fast_on_non_retryable_status() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/eth/v1/beacon/states/head/validators/100"))
        .respond_with(ResponseTemplate::new(404).set_body_string("validator not found"))
        .expect(1)
        .mount(&server)
        .await;

    let error = test_client(&server.uri())
        .get_beacon_states_validator_id(StateId::Head, 100)
        .await
        .unwrap_err();

    assert_eq!(error.status(), Some(404));
    match error {
        Error::ServerMessage { status, body } => {
            assert_eq!(status, 404);
            assert!(body.contains("validator not found"));
        }
        other => panic!("expected ServerMessage, got {:?}", other),
    }
}

#[tokio::test]
async fn get_reports_exhausted_retries_on_429() {
    let server = MockServer::start().await;
    // Default retry budget is 3, so 4 attempts in total.
    Mock::given(method("GET"))
        .and(path("/eth/v1/beacon/genesis"))
        .respond_with(ResponseTemplate::new(429))
        .expect(4)
        .mount(&server)
        .await;

    let error = test_client(&server.uri())
        .get_beacon_genesis()
        .await
        .unwrap_err();

    match error {
        Error::RetriesExhausted { attempts, status, .. } => {
            assert_eq!(attempts, 4);
            assert_eq!(status, 429);
        }
        other => panic!("expected RetriesExhausted, got {:?}", other),
    }
}

#[tokio::test]
async fn post_does_not_retry() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/eth/v1/validator/duties/attester/2"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let error = test_client(&server.uri())
        .post_validator_duties_attester(Epoch::new(2), &[100])
        .await
        .unwrap_err();

    match error {
        Error::ServerMessage { status, .. } => assert_eq!(status, 503),
        other => panic!("expected ServerMessage, got {:?}", other),
    }
}

#[tokio::test]
async fn duties_post_sends_indices_as_strings() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/eth/v1/validator/duties/attester/2"))
        .and(body_json(serde_json::json!(["100", "200"])))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "dependent_root": "0x01",
            "execution_optimistic": false,
            "data": [{
                "pubkey": "0xaa",
                "validator_index": "100",
                "committee_index": "3",
                "committee_length": "128",
                "committees_at_slot": "4",
                "validator_committee_index": "5",
                "slot": "70"
            }]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let response = test_client(&server.uri())
        .post_validator_duties_attester(Epoch::new(2), &[100, 200])
        .await
        .unwrap();

    assert_eq!(response.data.len(), 1);
    assert_eq!(response.data[0].validator_index, 100);
    assert_eq!(response.data[0].slot, Slot::new(70));
}

#[tokio::test]
async fn rewards_post_decodes_negative_components() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/eth/v1/beacon/rewards/attestations/50"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "execution_optimistic": false,
            "finalized": true,
            "data": {
                "ideal_rewards": [],
                "total_rewards": [
                    {"validator_index": "100", "head": "-1000", "target": "200", "source": "-500"}
                ]
            }
        })))
        .mount(&server)
        .await;

    let rewards = test_client(&server.uri())
        .post_beacon_rewards_attestations(Epoch::new(50), &[100])
        .await
        .unwrap();

    assert_eq!(rewards.total_rewards.len(), 1);
    assert_eq!(rewards.total_rewards[0].head, -1000);
    assert_eq!(rewards.total_rewards[0].source, -500);
    assert_eq!(rewards.total_rewards[0].target, 200);
}

#[tokio::test]
async fn cancelled_token_aborts_requests() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/eth/v1/beacon/genesis"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(genesis_body())
                .set_delay(Duration::from_secs(30)),
        )
        .mount(&server)
        .await;

    let shutdown = CancellationToken::new();
    let client = BeaconNodeHttpClient::new(
        &test_config(&server.uri()),
        shutdown.clone(),
        null_logger(),
    )
    .unwrap();

    let handle = tokio::spawn(async move { client.get_beacon_genesis().await });
    tokio::time::sleep(Duration::from_millis(50)).await;
    shutdown.cancel();

    let result = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("request must abort promptly")
        .unwrap();
    assert!(matches!(result, Err(Error::Shutdown)));
}
