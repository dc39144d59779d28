// tests/metrics.rs
//
// Single test on purpose: the Prometheus recorder is process-global and can
// only be installed once per test binary.
use axum::body::{self, Body};
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use mindcare_triage::TriageConfig;

fn chat(body: &'static str) -> Request<Body> {
    Request::post("/api/chat")
        .header("content-type", "application/json")
        .body(Body::from(body))
        .unwrap()
}

#[tokio::test]
async fn metrics_endpoint_reports_triage_series() {
    let cfg = TriageConfig {
        metrics: true,
        ..TriageConfig::default()
    };
    let app = mindcare_triage::app(&cfg).expect("app() should build Router in tests");

    for body in [
        r#"{"message":"I feel hopeless"}"#,
        r#"{"message":"so much stress"}"#,
        r#"{"message":"hello"}"#,
    ] {
        let resp = app.clone().oneshot(chat(body)).await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    let resp = app
        .oneshot(Request::get("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body::to_bytes(resp.into_body(), 1_048_576).await.unwrap(); // 1 MiB
    let text = String::from_utf8(body.to_vec()).unwrap();

    for needle in [
        "triage_messages_total",
        r#"classification="crisis""#,
        r#"classification="normal""#,
        "triage_replies_total",
        r#"kind="topic""#,
        r#"kind="fallback""#,
        "triage_reply_delay_ms",
    ] {
        assert!(
            text.contains(needle),
            "metrics exposition missing '{needle}'\n{text}"
        );
    }
}
