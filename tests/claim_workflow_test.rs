use axum::Router;
use axum::extract::{Extension, Path};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Json};
use axum::routing::{get, patch};
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use faucet_claim::{
    ClaimCache, ClaimOrchestrator, ClaimOutcome, ClaimResponse, Config, Credential, FailureReason,
    HttpClaimService, SecretKey,
};
use serde_json::json;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::sleep;

fn token_for(subject_id: &str, public_address: &str) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let body = URL_SAFE_NO_PAD.encode(
        json!({
            "payload": { "id": subject_id, "publicAddress": public_address },
            "iat": 1600000000
        })
        .to_string(),
    );
    format!("{header}.{body}.c2lnbmF0dXJl")
}

#[derive(Debug, Clone)]
struct FaucetUser {
    id: u64,
    claimed: bool,
    public_key: Option<String>,
}

#[derive(Debug, Default)]
struct FaucetState {
    /// subject id -> user
    users: HashMap<String, FaucetUser>,
    revoked: HashSet<String>,
    submit_delay: Option<Duration>,
    /// Refuse every submission with this text
    refusal: Option<String>,
    submissions: usize,
}

type SharedFaucet = Arc<Mutex<FaucetState>>;

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::to_string)
}

async fn authorize(faucet: &SharedFaucet, headers: &HeaderMap) -> Result<(), StatusCode> {
    match bearer_token(headers) {
        Some(token) if !faucet.lock().await.revoked.contains(&token) => Ok(()),
        _ => Err(StatusCode::UNAUTHORIZED),
    }
}

fn user_json(user: &FaucetUser) -> serde_json::Value {
    json!({ "id": user.id, "username": format!("user{}", user.id), "claimed": user.claimed as u8 })
}

async fn get_user(
    Extension(faucet): Extension<SharedFaucet>,
    Path(subject_id): Path<String>,
    headers: HeaderMap,
) -> impl IntoResponse {
    if let Err(status) = authorize(&faucet, &headers).await {
        return (status, Json(json!({ "error": "unauthorized" })));
    }

    match faucet.lock().await.users.get(&subject_id) {
        Some(user) => (StatusCode::OK, Json(user_json(user))),
        None => (StatusCode::NOT_FOUND, Json(json!({ "error": "no such user" }))),
    }
}

async fn submit_claim(
    Extension(faucet): Extension<SharedFaucet>,
    Path((user_id, public_key)): Path<(u64, String)>,
    headers: HeaderMap,
) -> impl IntoResponse {
    if let Err(status) = authorize(&faucet, &headers).await {
        return (status, Json(json!({ "error": "unauthorized" })));
    }

    let delay = faucet.lock().await.submit_delay;
    if let Some(delay) = delay {
        sleep(delay).await;
    }

    let mut state = faucet.lock().await;
    state.submissions += 1;
    if let Some(text) = state.refusal.clone() {
        return (
            StatusCode::CONFLICT,
            Json(json!({ "status": false, "text": text })),
        );
    }

    let Some(user) = state.users.values_mut().find(|user| user.id == user_id) else {
        return (StatusCode::NOT_FOUND, Json(json!({ "error": "no such user" })));
    };
    if user.claimed {
        return (
            StatusCode::CONFLICT,
            Json(json!({ "status": false, "text": "Key already claimed", "user": user_json(user) })),
        );
    }

    user.claimed = true;
    user.public_key = Some(public_key);
    (
        StatusCode::OK,
        Json(json!({ "status": true, "user": user_json(user) })),
    )
}

/// In-process faucet service listening on a random port
struct TestFaucet {
    handle: JoinHandle<()>,
    port: u16,
    state: SharedFaucet,
}

impl TestFaucet {
    async fn start() -> Self {
        let port = portpicker::pick_unused_port().expect("No available port");
        let state = SharedFaucet::default();

        let app = Router::new()
            .route("/users/{subject_id}", get(get_user))
            .route("/claim/{user_id}/{public_key}", patch(submit_claim))
            .layer(Extension(state.clone()));

        let listener = TcpListener::bind(("127.0.0.1", port))
            .await
            .expect("Failed to bind faucet");
        let handle = tokio::spawn(async move {
            _ = axum::serve(listener, app).await;
        });

        Self {
            handle,
            port,
            state,
        }
    }

    fn url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    async fn add_user(&self, subject_id: &str, id: u64, claimed: bool) {
        self.state.lock().await.users.insert(
            subject_id.to_string(),
            FaucetUser {
                id,
                claimed,
                public_key: None,
            },
        );
    }

    async fn user(&self, subject_id: &str) -> FaucetUser {
        self.state.lock().await.users[subject_id].clone()
    }

    async fn submissions(&self) -> usize {
        self.state.lock().await.submissions
    }
}

impl Drop for TestFaucet {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Scratch workspace removed on drop
struct Workspace(String);

impl Workspace {
    fn new() -> Self {
        let test_id = uuid::Uuid::new_v4().to_string();
        Self(format!("/tmp/test-faucet-claim-{test_id}"))
    }

    fn path(&self) -> &std::path::Path {
        std::path::Path::new(&self.0)
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        std::fs::remove_dir_all(&self.0).ok();
    }
}

async fn orchestrator(
    backend_url: &str,
    workspace: &Workspace,
    timeout: Duration,
) -> ClaimOrchestrator<HttpClaimService> {
    let service = HttpClaimService::new(backend_url, timeout).unwrap();
    let cache = ClaimCache::open(workspace.path()).await.unwrap();
    ClaimOrchestrator::new(service, cache)
}

/// The issued secret must be the keypair behind the key the faucet recorded
fn assert_secret_matches(secret_key: &SecretKey, public_key: &str) {
    let keypair_bytes = bs58::decode(secret_key.as_str()).into_vec().unwrap();
    let keypair_bytes: [u8; 64] = keypair_bytes.try_into().unwrap();
    let signing_key = ed25519_dalek::SigningKey::from_keypair_bytes(&keypair_bytes).unwrap();
    let expected = format!(
        "ed25519:{}",
        bs58::encode(signing_key.verifying_key().to_bytes()).into_string()
    );
    assert_eq!(public_key, expected);
}

#[tokio::test]
async fn test_fresh_claim_then_repeat_visit() {
    let faucet = TestFaucet::start().await;
    faucet.add_user("42", 7, false).await;
    let workspace = Workspace::new();
    let orchestrator = orchestrator(&faucet.url(), &workspace, Duration::from_secs(5)).await;
    let credential = Credential::new(token_for("42", "0xABC"));

    let first = orchestrator.run(&credential).await;
    let ClaimOutcome::ClaimedNow { secret_key } = &first.outcome else {
        panic!("expected ClaimedNow, got {:?}", first.outcome);
    };
    assert_eq!(first.public_address(), Some("0xABC"));

    let user = faucet.user("42").await;
    assert!(user.claimed);
    assert_secret_matches(secret_key, user.public_key.as_deref().unwrap());

    // Survives a restart of the process
    let restarted = self::orchestrator(&faucet.url(), &workspace, Duration::from_secs(5)).await;
    let second = restarted.run(&credential).await;
    assert_eq!(
        second.outcome,
        ClaimOutcome::ClaimedBefore {
            secret_key: secret_key.clone()
        }
    );
    assert_eq!(faucet.submissions().await, 1);
}

#[tokio::test]
async fn test_refused_submission_reports_faucet_text() {
    let faucet = TestFaucet::start().await;
    faucet.add_user("9", 9, false).await;
    faucet.state.lock().await.refusal = Some("Faucet is empty".to_string());
    let workspace = Workspace::new();
    let orchestrator = orchestrator(&faucet.url(), &workspace, Duration::from_secs(5)).await;

    let run = orchestrator
        .run(&Credential::new(token_for("9", "0x9")))
        .await;
    assert_eq!(
        run.outcome,
        ClaimOutcome::failed(FailureReason::ClaimRejected {
            message: Some("Faucet is empty".to_string())
        })
    );
    assert!(orchestrator.cache().get("9").await.is_none());
}

#[tokio::test]
async fn test_claim_from_another_device_is_orphaned() {
    let faucet = TestFaucet::start().await;
    faucet.add_user("5", 5, true).await;
    let workspace = Workspace::new();
    let orchestrator = orchestrator(&faucet.url(), &workspace, Duration::from_secs(5)).await;

    let run = orchestrator
        .run(&Credential::new(token_for("5", "0x5")))
        .await;
    assert_eq!(run.outcome, ClaimOutcome::failed(FailureReason::OrphanedClaim));
    assert_eq!(faucet.submissions().await, 0);
}

#[tokio::test]
async fn test_typed_service_failures() {
    let faucet = TestFaucet::start().await;
    faucet.add_user("1", 1, false).await;
    let revoked = token_for("1", "0x1");
    faucet.state.lock().await.revoked.insert(revoked.clone());
    let workspace = Workspace::new();
    let orchestrator = orchestrator(&faucet.url(), &workspace, Duration::from_secs(5)).await;

    let run = orchestrator.run(&Credential::new(revoked)).await;
    assert_eq!(run.outcome, ClaimOutcome::failed(FailureReason::Unauthorized));

    let run = orchestrator
        .run(&Credential::new(token_for("404", "0x4")))
        .await;
    assert_eq!(run.outcome, ClaimOutcome::failed(FailureReason::NotFound));

    let run = orchestrator.run(&Credential::new("not-a-jwt")).await;
    assert!(matches!(
        run.outcome,
        ClaimOutcome::Failed {
            reason: FailureReason::MalformedCredential { .. }
        }
    ));
    assert_eq!(faucet.submissions().await, 0);
}

#[tokio::test]
async fn test_unreachable_faucet_is_retryable() {
    let port = portpicker::pick_unused_port().expect("No available port");
    let workspace = Workspace::new();
    let orchestrator = orchestrator(
        &format!("http://127.0.0.1:{port}"),
        &workspace,
        Duration::from_secs(1),
    )
    .await;

    let run = orchestrator
        .run(&Credential::new(token_for("3", "0x3")))
        .await;
    let ClaimOutcome::Failed { reason } = &run.outcome else {
        panic!("expected failure, got {:?}", run.outcome);
    };
    assert!(matches!(reason, FailureReason::ServiceUnavailable { .. }));
    assert!(reason.is_retryable());
}

#[tokio::test]
async fn test_slow_submission_times_out_without_caching() {
    let faucet = TestFaucet::start().await;
    faucet.add_user("6", 6, false).await;
    faucet.state.lock().await.submit_delay = Some(Duration::from_secs(3));
    let workspace = Workspace::new();
    let orchestrator = orchestrator(&faucet.url(), &workspace, Duration::from_millis(300)).await;

    let run = orchestrator
        .run(&Credential::new(token_for("6", "0x6")))
        .await;
    assert!(matches!(
        run.outcome,
        ClaimOutcome::Failed {
            reason: FailureReason::ServiceUnavailable { .. }
        }
    ));
    assert!(orchestrator.cache().get("6").await.is_none());
}

#[tokio::test]
async fn test_racing_runs_issue_a_single_secret() {
    let faucet = TestFaucet::start().await;
    faucet.add_user("11", 11, false).await;
    faucet.state.lock().await.submit_delay = Some(Duration::from_millis(200));
    let workspace = Workspace::new();
    let orchestrator = orchestrator(&faucet.url(), &workspace, Duration::from_secs(5)).await;

    let first_tab = Credential::new(token_for("11", "0xB"));
    let second_tab = first_tab.clone();
    let (first, second) = tokio::join!(orchestrator.run(&first_tab), orchestrator.run(&second_tab));

    let outcomes = [first.outcome, second.outcome];
    let winners: Vec<&SecretKey> = outcomes
        .iter()
        .filter_map(|outcome| match outcome {
            ClaimOutcome::ClaimedNow { secret_key } => Some(secret_key),
            _ => None,
        })
        .collect();
    assert_eq!(winners.len(), 1);
    let winner = winners[0];

    // The losing run either sees the winner's stored secret or reports the orphan
    let loser = outcomes
        .iter()
        .find(|outcome| !matches!(outcome, ClaimOutcome::ClaimedNow { .. }))
        .unwrap();
    match loser {
        ClaimOutcome::ClaimedBefore { secret_key } => assert_eq!(secret_key, winner),
        ClaimOutcome::Failed {
            reason: FailureReason::OrphanedClaim,
        } => {}
        other => panic!("unexpected losing outcome {other:?}"),
    }

    let user = faucet.user("11").await;
    assert_secret_matches(winner, user.public_key.as_deref().unwrap());
    assert_eq!(orchestrator.cache().get("11").await.as_ref(), Some(winner));
}

/// Claim API server started through `faucet_claim::run`
struct TestServer {
    handle: JoinHandle<()>,
    port: u16,
    client: reqwest::Client,
    _workspace: Workspace,
}

impl TestServer {
    async fn start(backend_url: String) -> Self {
        let port = portpicker::pick_unused_port().expect("No available port");
        let workspace = Workspace::new();

        let config = Config {
            listen_on_port: port,
            backend_url: Some(backend_url),
            workspace: workspace.0.clone(),
            ..Default::default()
        };
        config.validate().unwrap();

        let handle = tokio::spawn(async move {
            _ = faucet_claim::run(config).await;
        });

        let client = reqwest::Client::builder()
            .no_proxy()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap();

        // Poll until server is ready
        for _ in 0..50 {
            if let Ok(response) = client
                .get(format!("http://127.0.0.1:{port}/health"))
                .send()
                .await
                && response.status().is_success()
            {
                break;
            }

            sleep(Duration::from_millis(20)).await;
        }

        Self {
            handle,
            port,
            client,
            _workspace: workspace,
        }
    }

    async fn claim(&self, token: Option<&str>) -> reqwest::Response {
        let mut request = self
            .client
            .post(format!("http://127.0.0.1:{}/claim", self.port));
        if let Some(token) = token {
            request = request.header("Authorization", format!("Bearer {token}"));
        }
        request.send().await.unwrap()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[tokio::test]
async fn test_claim_endpoint_response_shape() {
    let faucet = TestFaucet::start().await;
    faucet.add_user("42", 42, false).await;
    let server = TestServer::start(faucet.url()).await;
    let token = token_for("42", "0xABC");

    let response = server.claim(Some(&token)).await;
    assert_eq!(response.status(), 200);
    let body: ClaimResponse = response.json().await.unwrap();
    let ClaimOutcome::ClaimedNow { secret_key } = &body.outcome else {
        panic!("expected ClaimedNow, got {:?}", body.outcome);
    };
    assert_eq!(body.public_address.as_deref(), Some("0xABC"));
    assert_eq!(body.message, "Next, create an account in the NEAR Wallet:");
    assert_eq!(
        body.wallet_url,
        Some(format!(
            "https://wallet.near.org/create/{}",
            secret_key.as_str()
        ))
    );

    let response = server.claim(Some(&token)).await;
    assert_eq!(response.status(), 200);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["outcome"]["state"], "claimed_before");
    assert_eq!(body["message"], "Already claimed! Continue below:");
}

#[tokio::test]
async fn test_claim_endpoint_failure_statuses() {
    let faucet = TestFaucet::start().await;
    faucet.add_user("5", 5, true).await;
    let server = TestServer::start(faucet.url()).await;

    let response = server.claim(None).await;
    assert_eq!(response.status(), 401);

    let response = server
        .client
        .post(format!("http://127.0.0.1:{}/claim", server.port))
        .header("Authorization", "InvalidToken")
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), 401);

    let response = server.claim(Some("bad.token")).await;
    assert_eq!(response.status(), 400);

    let response = server.claim(Some(&token_for("404", "0x4"))).await;
    assert_eq!(response.status(), 404);

    let response = server.claim(Some(&token_for("5", "0x5"))).await;
    assert_eq!(response.status(), 409);
    let body: ClaimResponse = response.json().await.unwrap();
    assert_eq!(body.outcome, ClaimOutcome::failed(FailureReason::OrphanedClaim));
    assert!(!body.retryable);
}

#[tokio::test]
async fn test_duplicate_request_while_in_flight_is_pending() {
    let faucet = TestFaucet::start().await;
    faucet.add_user("8", 8, false).await;
    faucet.state.lock().await.submit_delay = Some(Duration::from_millis(500));
    let server = TestServer::start(faucet.url()).await;
    let token = token_for("8", "0x8");

    let second = async {
        sleep(Duration::from_millis(150)).await;
        server.claim(Some(&token)).await
    };
    let (first, second) = tokio::join!(server.claim(Some(&token)), second);

    assert_eq!(first.status(), 200);
    assert_eq!(second.status(), 202);
    let body: ClaimResponse = second.json().await.unwrap();
    assert_eq!(body.outcome, ClaimOutcome::Pending);
    assert_eq!(body.public_address.as_deref(), Some("0x8"));
    assert_eq!(faucet.submissions().await, 1);
}

#[tokio::test]
async fn test_unreachable_faucet_returns_service_unavailable() {
    let port = portpicker::pick_unused_port().expect("No available port");
    let server = TestServer::start(format!("http://127.0.0.1:{port}")).await;

    let response = server.claim(Some(&token_for("3", "0x3"))).await;
    assert_eq!(response.status(), 503);
    let body: ClaimResponse = response.json().await.unwrap();
    assert!(body.retryable);
    assert!(body.wallet_url.is_none());
}
