use super::*;
use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use base64::engine::general_purpose::STANDARD;
use shared::{domain::DealStatus, error::ErrorCode};
use tokio::{net::TcpListener, sync::Mutex};

use crate::{signer::Ed25519Signer, DepositState, UploadController};

#[derive(Debug, Clone)]
struct SeenRequest {
    route: String,
    authorization: Option<String>,
    file_name: Option<String>,
    content_type: Option<String>,
    body: Vec<u8>,
}

#[derive(Clone, Default)]
struct BridgeState {
    seen: Arc<Mutex<Vec<SeenRequest>>>,
}

impl BridgeState {
    async fn record(&self, route: impl Into<String>, headers: &HeaderMap, body: &[u8]) {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        self.seen.lock().await.push(SeenRequest {
            route: route.into(),
            authorization: header("authorization"),
            file_name: header(FILE_NAME_HEADER),
            content_type: header("content-type"),
            body: body.to_vec(),
        });
    }
}

async fn handle_has_deposit(
    State(state): State<BridgeState>,
    Path(address): Path<String>,
    headers: HeaderMap,
) -> Json<DepositResponse> {
    state
        .record(format!("GET deposits/{address}"), &headers, &[])
        .await;
    Json(DepositResponse { has_deposit: true })
}

async fn handle_add_deposit(
    State(state): State<BridgeState>,
    Path(address): Path<String>,
    headers: HeaderMap,
) -> impl IntoResponse {
    state
        .record(format!("POST deposits/{address}"), &headers, &[])
        .await;
    (StatusCode::INTERNAL_SERVER_ERROR, "chain node offline")
}

async fn handle_release(
    State(state): State<BridgeState>,
    Path(address): Path<String>,
    headers: HeaderMap,
) -> impl IntoResponse {
    state
        .record(format!("POST deposits/{address}/release"), &headers, &[])
        .await;
    (
        StatusCode::PAYMENT_REQUIRED,
        Json(ApiError::new(
            ErrorCode::InsufficientFunds,
            "no deposit to release",
        )),
    )
}

async fn handle_upload(
    State(state): State<BridgeState>,
    headers: HeaderMap,
    body: Bytes,
) -> Json<StoredRequest> {
    state.record("POST upload", &headers, &body).await;
    let mut stored = StoredRequest::new("req-1", "bafybeigdyrzt");
    stored.status_code = Some(DealStatus::Pending.code());
    Json(stored)
}

async fn handle_status(
    State(state): State<BridgeState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Json<StatusResponse> {
    state
        .record(format!("GET storagerequest/{id}"), &headers, &[])
        .await;
    Json(StatusResponse::new(id, DealStatus::Active.code()))
}

async fn spawn_bridge() -> Result<(String, BridgeState)> {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let state = BridgeState::default();
    let routes = Router::new()
        .route(
            "/deposits/:address",
            get(handle_has_deposit).post(handle_add_deposit),
        )
        .route("/deposits/:address/release", post(handle_release))
        .route("/upload", post(handle_upload))
        .route("/storagerequest/:id", get(handle_status))
        .with_state(state.clone());
    let app = Router::new().nest("/api", routes);
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok((format!("http://{addr}/api/"), state))
}

fn session() -> Session {
    Session::from_signer(Arc::new(Ed25519Signer::from_seed(&[3u8; 32])))
}

#[tokio::test]
async fn deposit_check_is_signed_by_session() {
    let (base_url, bridge) = spawn_bridge().await.expect("spawn bridge");
    let gateway = HttpStorageGateway::new(&base_url, None).expect("gateway");
    let session = session();

    assert!(gateway.has_deposit(&session).await.expect("has deposit"));

    let seen = bridge.seen.lock().await;
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].route, format!("GET deposits/{}", session.address()));
    let auth = seen[0].authorization.clone().expect("authorization header");
    let expected_prefix = format!("Signature {}:", session.address());
    assert!(auth.starts_with(&expected_prefix), "unexpected header: {auth}");
    let signature = STANDARD
        .decode(&auth[expected_prefix.len()..])
        .expect("base64 signature");
    assert_eq!(signature.len(), 64);
}

#[tokio::test]
async fn store_sends_raw_bytes_with_file_metadata() {
    let (base_url, bridge) = spawn_bridge().await.expect("spawn bridge");
    let gateway = HttpStorageGateway::new(&base_url, Some(Duration::from_secs(5))).expect("gateway");

    let stored = gateway
        .store(
            &session(),
            FileUpload {
                name: "notes.txt".into(),
                mime_type: None,
                bytes: b"hello filecoin".to_vec(),
            },
        )
        .await
        .expect("store");
    assert_eq!(stored.id.as_str(), "req-1");
    assert_eq!(stored.content_id().as_str(), "bafybeigdyrzt");
    assert_eq!(stored.status_code, Some(1));

    let seen = bridge.seen.lock().await;
    assert_eq!(seen[0].route, "POST upload");
    assert_eq!(seen[0].file_name.as_deref(), Some("notes.txt"));
    assert_eq!(
        seen[0].content_type.as_deref(),
        Some("application/octet-stream")
    );
    assert_eq!(seen[0].body, b"hello filecoin".to_vec());
}

#[tokio::test]
async fn status_is_fetched_by_request_id() {
    let (base_url, _bridge) = spawn_bridge().await.expect("spawn bridge");
    let gateway = HttpStorageGateway::new(&base_url, None).expect("gateway");

    let response = gateway
        .status(&session(), &RequestId::new("req-1"))
        .await
        .expect("status");
    assert_eq!(response.request.id.as_str(), "req-1");
    assert_eq!(response.request.status_code, 2);
}

#[tokio::test]
async fn gateway_error_body_surfaces_as_api_exception() {
    let (base_url, _bridge) = spawn_bridge().await.expect("spawn bridge");
    let gateway = HttpStorageGateway::new(&base_url, None).expect("gateway");

    let err = gateway
        .release_deposits(&session())
        .await
        .expect_err("release must fail");
    let api = err
        .downcast_ref::<ApiException>()
        .expect("api exception");
    assert_eq!(api.code, ErrorCode::InsufficientFunds);
    assert_eq!(api.message, "no deposit to release");
}

#[tokio::test]
async fn plain_error_body_reports_http_status() {
    let (base_url, _bridge) = spawn_bridge().await.expect("spawn bridge");
    let gateway = HttpStorageGateway::new(&base_url, None).expect("gateway");

    let err = gateway
        .add_deposit(&session())
        .await
        .expect_err("deposit must fail");
    assert!(
        err.to_string().contains("500"),
        "unexpected error: {err}"
    );
}

#[test]
fn rejects_non_http_gateway_urls() {
    assert!(HttpStorageGateway::new("ws://localhost:8006", None).is_err());
    assert!(HttpStorageGateway::new("not a url", None).is_err());
    assert!(HttpStorageGateway::new("https://broker.example", None).is_ok());
}

#[test]
fn endpoints_extend_base_path() {
    let gateway = HttpStorageGateway::new("http://localhost:8006/v1", None).expect("gateway");
    assert_eq!(
        gateway.endpoint(&["deposits", "abc", "release"]).as_str(),
        "http://localhost:8006/v1/deposits/abc/release"
    );
}

#[tokio::test]
async fn controller_runs_full_flow_over_http() {
    let (base_url, bridge) = spawn_bridge().await.expect("spawn bridge");
    let gateway = Arc::new(HttpStorageGateway::new(&base_url, None).expect("gateway"));
    let controller = UploadController::new(gateway);

    controller
        .observe_session(Some(session()))
        .await
        .expect("session");
    assert_eq!(controller.snapshot().await.deposit, DepositState::Funded);

    let record = controller
        .upload(FileUpload {
            name: "photo.png".into(),
            mime_type: Some("image/png".into()),
            bytes: vec![0x89, 0x50, 0x4e, 0x47],
        })
        .await
        .expect("upload");
    assert_eq!(record.cid.as_str(), "bafybeigdyrzt");

    let report = controller.query_status(&record.id).await.expect("status");
    assert_eq!(report.label(), "Active");

    let routes: Vec<_> = bridge
        .seen
        .lock()
        .await
        .iter()
        .map(|seen| seen.route.clone())
        .collect();
    assert_eq!(routes.len(), 3);
    assert_eq!(routes[1], "POST upload");
    assert_eq!(routes[2], "GET storagerequest/req-1");
}
