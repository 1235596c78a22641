mod common;

use serde_json::{json, Value};
use std::time::Duration;

use stake_risk_gateway::config::IndexConfig;
use stake_risk_gateway::index::{IndexClient, IndexError, IndexQuery};

fn client_for(addr: std::net::SocketAddr, request_timeout_secs: u64) -> IndexClient {
    IndexClient::new(&IndexConfig {
        endpoint: format!("http://{}/subgraphs/name/staking", addr),
        connect_timeout_secs: 1,
        request_timeout_secs,
    })
    .unwrap()
}

fn query() -> IndexQuery {
    IndexQuery::new("{ slashEvents { id } }", json!({ "participant": "0xabc" }))
}

#[tokio::test]
async fn test_success_unwraps_data_and_posts_variables() {
    let addr = common::start_programmable_index(|body| async move {
        let request: Value = serde_json::from_str(&body).unwrap_or(Value::Null);
        let participant = request["variables"]["participant"].clone();
        (200, json!({ "data": { "echo": participant } }).to_string())
    })
    .await;

    let data = client_for(addr, 5).send(&query()).await.unwrap();
    assert_eq!(data, json!({ "echo": "0xabc" }));
}

#[tokio::test]
async fn test_graphql_errors_are_rejections() {
    let addr = common::start_programmable_index(|_| async {
        (
            200,
            json!({ "errors": [{ "message": "unknown field" }, { "message": "bad filter" }] })
                .to_string(),
        )
    })
    .await;

    let err = client_for(addr, 5).send(&query()).await.unwrap_err();
    assert_eq!(err, IndexError::QueryRejected("unknown field; bad filter".into()));
    assert!(!err.counts_toward_breaker());
}

#[tokio::test]
async fn test_client_error_status() {
    let addr = common::start_programmable_index(|_| async { (400, "bad query".to_string()) }).await;

    let err = client_for(addr, 5).send(&query()).await.unwrap_err();
    assert_eq!(
        err,
        IndexError::UpstreamClientError {
            status: 400,
            message: "bad query".into()
        }
    );
    assert!(!err.counts_toward_breaker());
}

#[tokio::test]
async fn test_server_error_status() {
    let addr = common::start_programmable_index(|_| async { (503, "overloaded".to_string()) }).await;

    let err = client_for(addr, 5).send(&query()).await.unwrap_err();
    assert_eq!(
        err,
        IndexError::UpstreamServerError {
            status: 503,
            message: "overloaded".into()
        }
    );
    assert!(err.counts_toward_breaker());
}

#[tokio::test]
async fn test_garbage_body_is_malformed() {
    let addr = common::start_programmable_index(|_| async { (200, "not json".to_string()) }).await;

    let err = client_for(addr, 5).send(&query()).await.unwrap_err();
    assert!(matches!(err, IndexError::MalformedPayload(_)), "got {err:?}");
}

#[tokio::test]
async fn test_slow_index_times_out() {
    let addr = common::start_programmable_index(|_| async {
        tokio::time::sleep(Duration::from_secs(3)).await;
        (200, json!({ "data": {} }).to_string())
    })
    .await;

    let err = client_for(addr, 1).send(&query()).await.unwrap_err();
    assert_eq!(err, IndexError::TransportTimeout(1000));
}

#[tokio::test]
async fn test_refused_connection_is_transport_failure() {
    let addr = common::unused_addr().await;

    let err = client_for(addr, 5).send(&query()).await.unwrap_err();
    assert!(matches!(err, IndexError::TransportFailure(_)), "got {err:?}");
    assert!(err.counts_toward_breaker());
}
