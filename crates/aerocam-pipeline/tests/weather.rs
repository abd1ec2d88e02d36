use std::sync::{Arc, Mutex};

use axum::extract::{RawQuery, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;

use aerocam_pipeline::weather::METAR_USER_AGENT;
use aerocam_pipeline::{MetarClient, WeatherReport, WeatherSource};

const BODY: &str = "METAR LFRN 101230Z AUTO 24012KT 9999 FEW040 14/06 Q1018\n\
                    TAF LFRN 101100Z 1012/1112 24012KT 9999 FEW040\n      \
                    TEMPO 1014/1018 SHRA\n";

struct Reply {
    status: u16,
    body: &'static str,
    retry_after: Option<&'static str>,
}

#[derive(Default)]
struct Seen {
    query: Option<String>,
    user_agent: Option<String>,
}

struct ServerState {
    reply: Reply,
    seen: Mutex<Seen>,
}

async fn metar(
    State(state): State<Arc<ServerState>>,
    RawQuery(query): RawQuery,
    headers: HeaderMap,
) -> Response {
    {
        let mut seen = state.seen.lock().unwrap();
        seen.query = query;
        seen.user_agent = headers
            .get("user-agent")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
    }
    let status = StatusCode::from_u16(state.reply.status).unwrap();
    match state.reply.retry_after {
        Some(secs) => (status, [("retry-after", secs)], state.reply.body).into_response(),
        None => (status, state.reply.body).into_response(),
    }
}

async fn spawn_server(reply: Reply) -> (String, Arc<ServerState>) {
    let state = Arc::new(ServerState {
        reply,
        seen: Mutex::new(Seen::default()),
    });
    let app = Router::new()
        .route("/api/data/metar", get(metar))
        .with_state(Arc::clone(&state));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}/api/data/metar"), state)
}

async fn fetch(reply: Reply) -> (aerocam_pipeline::Result<WeatherReport>, Arc<ServerState>) {
    let (url, state) = spawn_server(reply).await;
    let client = MetarClient::new(url, "LFRN").unwrap();
    (client.fetch().await, state)
}

#[tokio::test]
async fn raw_report_is_requested_and_parsed() {
    let (result, state) = fetch(Reply {
        status: 200,
        body: BODY,
        retry_after: None,
    })
    .await;

    let report = result.unwrap();
    assert!(report.raw_metar.unwrap().starts_with("METAR LFRN 101230Z"));
    assert_eq!(report.raw_taf.unwrap().lines().count(), 2);

    let seen = state.seen.lock().unwrap();
    assert_eq!(
        seen.query.as_deref(),
        Some("ids=LFRN&format=raw&taf=true&hours=1")
    );
    assert_eq!(seen.user_agent.as_deref(), Some(METAR_USER_AGENT));
}

#[tokio::test]
async fn no_content_is_reported() {
    let (result, _) = fetch(Reply {
        status: 204,
        body: "",
        retry_after: None,
    })
    .await;
    assert!(result.unwrap_err().to_string().contains("No METAR data available"));
}

#[tokio::test]
async fn rate_limit_reports_retry_after() {
    let (result, _) = fetch(Reply {
        status: 429,
        body: "slow down",
        retry_after: Some("120"),
    })
    .await;
    assert!(result.unwrap_err().to_string().contains("retry after 120s"));
}

#[tokio::test]
async fn client_and_server_errors_are_distinguished() {
    let (result, _) = fetch(Reply {
        status: 400,
        body: "bad ids",
        retry_after: None,
    })
    .await;
    assert!(result.unwrap_err().to_string().contains("Invalid METAR request"));

    let (result, _) = fetch(Reply {
        status: 502,
        body: "",
        retry_after: None,
    })
    .await;
    assert!(result.unwrap_err().to_string().contains("HTTP 502"));
}

#[tokio::test]
async fn empty_body_is_an_error() {
    let (result, _) = fetch(Reply {
        status: 200,
        body: "\n",
        retry_after: None,
    })
    .await;
    assert!(result.is_err());
}
