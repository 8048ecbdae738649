//! Discovery and snapshot requests against a mock HTTP server.

mod common;

use std::time::Duration;

use common::{Seen, TestServer, assert_quiet, next_seen, recorder};
use investing_rs::client::InvestingClient;
use investing_rs::error::InvestingError;
use investing_rs::ws::config::OnlineConfig;
use investing_rs::ws::online::Online;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const STREAMER: &str = "/api/editions/streamer";

const US30_PAGE: &str = r#"
    <html><body>
      <span class="arial_26 inlineblock pid-8873-last" id="last_last">27,500</span>
      <span class="arial_20 pid-8873-pc">27,400</span>
      <span class="arial_20 pid-8873-pcp parentheses">+0.36%</span>
      <span class="inlineblock pid-8873-high">27,610</span>
    </body></html>
"#;

fn client_for(mock: &MockServer) -> InvestingClient {
    InvestingClient::with_base_urls(&mock.uri(), &mock.uri(), None).unwrap()
}

// ---------------------------------------------------------------------------
// Discovery
// ---------------------------------------------------------------------------

#[tokio::test]
async fn discovery_picks_first_server() {
    let mock = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(STREAMER))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "stream_servers": ["stream52.forexpros.com", "stream53.forexpros.com"]
        })))
        .mount(&mock)
        .await;

    let server = client_for(&mock).get_stream_server().await.unwrap();
    assert_eq!(server, "stream52.forexpros.com");
}

#[tokio::test]
async fn discovery_without_servers_fails() {
    let mock = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(STREAMER))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "stream_servers": [] })))
        .mount(&mock)
        .await;

    let err = client_for(&mock).get_stream_server().await.unwrap_err();
    assert!(matches!(err, InvestingError::Discovery(_)));
}

#[tokio::test]
async fn discovery_http_error_is_a_discovery_failure() {
    let mock = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(STREAMER))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mock)
        .await;

    let err = client_for(&mock).get_stream_server().await.unwrap_err();
    assert!(matches!(err, InvestingError::Discovery(_)));
}

#[tokio::test]
async fn discovery_is_cached_and_shared() {
    let mock = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(STREAMER))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "stream_servers": ["stream52.forexpros.com"] }))
                .set_delay(Duration::from_millis(100)),
        )
        .expect(1)
        .mount(&mock)
        .await;

    let config = OnlineConfig::builder()
        .api_base_url(mock.uri())
        .build()
        .unwrap();
    let online = Online::with_config(config, ()).unwrap();

    let (a, b, c) = tokio::join!(
        online.stream_server(),
        online.stream_server(),
        online.stream_server()
    );
    assert_eq!(a.unwrap(), "stream52.forexpros.com");
    assert_eq!(b.unwrap(), "stream52.forexpros.com");
    assert_eq!(c.unwrap(), "stream52.forexpros.com");
    assert_eq!(online.stream_server().await.unwrap(), "stream52.forexpros.com");
}

#[tokio::test]
async fn connect_reports_discovery_failure() {
    let mock = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(STREAMER))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&mock)
        .await;

    let config = OnlineConfig::builder()
        .api_base_url(mock.uri())
        .build()
        .unwrap();
    let (handler, mut seen) = recorder();
    let online = Online::with_config(config, handler).unwrap();

    online.connect().await;

    assert!(matches!(next_seen(&mut seen).await, Seen::Error(_)));
    assert_quiet(&mut seen, Duration::from_millis(200)).await;
}

#[tokio::test]
async fn connect_uses_discovered_server() {
    let stream = TestServer::start().await;
    let mock = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(STREAMER))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "stream_servers": [stream.addr.to_string()] })),
        )
        .expect(1)
        .mount(&mock)
        .await;

    let config = OnlineConfig::builder()
        .stream_scheme("ws")
        .api_base_url(mock.uri())
        .build()
        .unwrap();
    let (handler, mut seen) = recorder();
    let online = Online::with_config(config, handler).unwrap();

    online.connect().await;

    assert!(matches!(next_seen(&mut seen).await, Seen::Open));
    assert_eq!(stream.accepted(), 1);
}

// ---------------------------------------------------------------------------
// Snapshots
// ---------------------------------------------------------------------------

#[tokio::test]
async fn snapshot_is_scraped_from_page() {
    let mock = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/indices/us-30-futures"))
        .respond_with(ResponseTemplate::new(200).set_body_string(US30_PAGE))
        .mount(&mock)
        .await;

    let quote = client_for(&mock)
        .get_snapshot(8873, "/indices/us-30-futures")
        .await
        .unwrap();

    assert_eq!(quote.instrument_id, 8873);
    assert_eq!(quote.last, Some(27_500.0));
    assert_eq!(quote.previous_close, Some(27_400.0));
    assert_eq!(quote.high, Some(27_610.0));
    assert_eq!(quote.change, Some(100.0));
    assert!(quote.datetime.is_some());
}

#[tokio::test]
async fn snapshot_http_error_is_reported() {
    let mock = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/indices/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
        .mount(&mock)
        .await;

    let err = client_for(&mock)
        .get_snapshot(8873, "/indices/missing")
        .await
        .unwrap_err();
    assert!(matches!(err, InvestingError::HttpStatus { .. }));
}

#[tokio::test]
async fn subscribe_delivers_snapshot_before_live_quotes() {
    let mut stream = TestServer::start().await;
    let mock = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/indices/us-30-futures"))
        .respond_with(ResponseTemplate::new(200).set_body_string(US30_PAGE))
        .expect(1)
        .mount(&mock)
        .await;

    let config = OnlineConfig::builder()
        .stream_scheme("ws")
        .stream_server(stream.addr.to_string())
        .web_base_url(mock.uri())
        .build()
        .unwrap();
    let (handler, mut seen) = recorder();
    let online = Online::with_config(config, handler).unwrap();
    online.connect().await;
    assert!(matches!(next_seen(&mut seen).await, Seen::Open));

    online
        .subscribe(8873, Some("US 30"), Some("/indices/us-30-futures"))
        .await
        .unwrap();

    match next_seen(&mut seen).await {
        Seen::Quote(quote) => {
            assert_eq!(quote.alias, "US 30");
            assert_eq!(quote.last, Some(27_500.0));
            assert_eq!(quote.change, Some(100.0));
        }
        other => panic!("expected a snapshot quote, got {other:?}"),
    }
    assert!(stream.next_control().await.contains("pid-8873:"));
}

#[tokio::test]
async fn failed_snapshot_is_skipped() {
    let mut stream = TestServer::start().await;
    let mock = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/indices/us-30-futures"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&mock)
        .await;

    let config = OnlineConfig::builder()
        .stream_scheme("ws")
        .stream_server(stream.addr.to_string())
        .web_base_url(mock.uri())
        .build()
        .unwrap();
    let (handler, mut seen) = recorder();
    let online = Online::with_config(config, handler).unwrap();
    online.connect().await;
    assert!(matches!(next_seen(&mut seen).await, Seen::Open));

    online
        .subscribe(8873, Some("US 30"), Some("/indices/us-30-futures"))
        .await
        .unwrap();

    assert!(stream.next_control().await.contains("pid-8873:"));
    assert_quiet(&mut seen, Duration::from_millis(300)).await;
}
