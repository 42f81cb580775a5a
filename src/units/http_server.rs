//! The HTTP surface nodes and administrators talk to (`spec.md` §6).
//!
//! Two route trees hang off the same router: `/network-map/*`, the
//! public surface any node on the network can reach, and `/admin/api/*`,
//! the operator-facing surface for changing notaries and the whitelist.
//! Every handler does the same thing: decode the request, send one
//! [`ApplicationCommand`] to the processor, wait for its reply, encode
//! the response. No handler ever touches a store or the signing
//! authority itself.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use jiff::{Span, SpanRelativeTo};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tracing::info;

use netmap_api::{Change, Hash, LegalIdentity, NodeInfo, NotaryInfo, ParseHashError, Signed};

use crate::comms::{ApplicationCommand, Terminated};
use crate::metrics::Metrics;
use crate::{changeset, signing};

/// The HTTP unit. Like every other unit, it owns nothing but a sender
/// half of the processor's command channel and the bits of config it
/// needs to answer requests.
pub struct HttpServer {
    pub processor_tx: mpsc::UnboundedSender<ApplicationCommand>,
    pub metrics: Arc<Metrics>,
    pub cache_timeout: Span,
}

struct AppState {
    tx: mpsc::UnboundedSender<ApplicationCommand>,
    metrics: Arc<Metrics>,
    cache_control: String,
}

impl HttpServer {
    /// Bind `addr` and serve until `shutdown` resolves.
    pub async fn run(
        self,
        addr: SocketAddr,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> std::io::Result<()> {
        let listener = TcpListener::bind(addr).await?;
        info!("listening on {addr}");

        let seconds = self
            .cache_timeout
            .to_duration(SpanRelativeTo::days_are_24_hours())
            .map(|d| d.unsigned_abs().as_secs())
            .unwrap_or(0);

        let state = Arc::new(AppState {
            tx: self.processor_tx,
            metrics: self.metrics,
            cache_control: format!("max-age={seconds}"),
        });

        axum::serve(listener, router(state)).with_graceful_shutdown(shutdown).await
    }
}

fn router(state: Arc<AppState>) -> Router {
    let network_map = Router::new()
        .route("/", get(get_network_map))
        .route("/publish", post(publish_node))
        .route("/ack-parameters", post(ack_parameters))
        .route("/node-info/{hash}", get(get_node_info))
        .route("/network-parameters/{hash}", get(get_network_parameters_by_hash));

    let admin = Router::new()
        .route("/network-parameters", get(get_current_network_parameters))
        .route("/nodes", get(list_nodes))
        .route("/nodes/{hash}", delete(delete_node))
        .route("/notaries", get(list_notaries))
        .route("/notaries/validating", post(add_validating_notary))
        .route("/notaries/non-validating", post(add_non_validating_notary))
        .route("/notaries/{name}", delete(remove_notary))
        .route("/whitelist", get(list_whitelist))
        .route("/whitelist/append", post(append_whitelist))
        .route("/whitelist/replace", post(replace_whitelist))
        .route("/whitelist/clear", post(clear_whitelist));

    Router::new()
        .nest("/network-map", network_map)
        .nest("/admin/api", admin)
        .route("/metrics", get(render_metrics))
        .with_state(state)
}

// ---- Errors --------------------------------------------------------------

/// Wraps an already-built HTTP response so it can be returned from a
/// handler as an `Err`. `Terminated` (the processor shutting down
/// mid-request) is the one failure every handler can hit regardless of
/// what it was trying to do, so it gets a blanket conversion.
struct ApiError(Response);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        self.0
    }
}

impl From<Terminated> for ApiError {
    fn from(_: Terminated) -> Self {
        ApiError((StatusCode::SERVICE_UNAVAILABLE, "the processor is shutting down").into_response())
    }
}

/// Send the command `build` constructs from a fresh reply channel and
/// await its answer, folding a closed channel into [`Terminated`].
async fn ask<T>(
    tx: &mpsc::UnboundedSender<ApplicationCommand>,
    build: impl FnOnce(oneshot::Sender<T>) -> ApplicationCommand,
) -> Result<T, Terminated> {
    let (reply, rx) = oneshot::channel();
    tx.send(build(reply)).map_err(|_| Terminated)?;
    rx.await.map_err(|_| Terminated)
}

fn bad_request(msg: impl Into<String>) -> ApiError {
    ApiError((StatusCode::BAD_REQUEST, msg.into()).into_response())
}

fn not_found() -> ApiError {
    ApiError((StatusCode::NOT_FOUND, "not found").into_response())
}

fn parse_path_hash(raw: &str) -> Result<Hash, ApiError> {
    raw.parse()
        .map_err(|_: ParseHashError| bad_request("path segment is not a valid SHA-256 hash"))
}

// ---- /network-map/* --------------------------------------------------------

async fn get_network_map(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let signed = ask(&state.tx, |reply| ApplicationCommand::GetNetworkMap { reply }).await?;
    match signed {
        Some(signed) => {
            Ok(([(header::CACHE_CONTROL, state.cache_control.clone())], signed.to_bytes()).into_response())
        }
        None => Err(ApiError(
            (StatusCode::SERVICE_UNAVAILABLE, "no network map established yet").into_response(),
        )),
    }
}

async fn publish_node(State(state): State<Arc<AppState>>, body: Bytes) -> Result<Response, ApiError> {
    let signed = Signed::<NodeInfo>::from_bytes(body).map_err(|_| bad_request("malformed signed node info"))?;
    let result = ask(&state.tx, |reply| ApplicationCommand::PublishNode { signed, reply }).await?;
    match result {
        Ok(published) => Ok((StatusCode::OK, Json(published)).into_response()),
        Err(netmap_api::NodeAddError::SignatureInvalid) => {
            Ok((StatusCode::UNAUTHORIZED, "signature did not verify").into_response())
        }
        Err(err @ netmap_api::NodeAddError::NameConflict { .. }) => {
            Ok((StatusCode::CONFLICT, Json(err)).into_response())
        }
        Err(netmap_api::NodeAddError::Malformed) => Ok(bad_request("malformed node info").into_response()),
        Err(err @ netmap_api::NodeAddError::StorageIo(_)) => {
            Ok((StatusCode::INTERNAL_SERVER_ERROR, Json(err)).into_response())
        }
    }
}

/// Acknowledge having observed a particular, signed set of parameters.
/// The body is the hex-encoded content hash of the parameters the
/// sender last fetched. `spec.md` names this endpoint but leaves its
/// effect on processor state unspecified; it is logged for operational
/// visibility and otherwise a no-op (see `DESIGN.md`).
async fn ack_parameters(State(_state): State<Arc<AppState>>, body: Bytes) -> Result<Response, ApiError> {
    let text = String::from_utf8(body.to_vec()).map_err(|_| bad_request("body is not UTF-8"))?;
    let hash: Hash = text.trim().parse().map_err(|_: ParseHashError| bad_request("not a valid hash"))?;
    info!("node acknowledged network parameters {hash}");
    Ok(StatusCode::NO_CONTENT.into_response())
}

async fn get_node_info(
    State(state): State<Arc<AppState>>,
    Path(hash): Path<String>,
) -> Result<Response, ApiError> {
    let hash = parse_path_hash(&hash)?;
    let signed = ask(&state.tx, |reply| ApplicationCommand::GetNodeInfo { hash, reply }).await?;
    signed.map(|s| s.to_bytes().into_response()).ok_or_else(not_found)
}

async fn get_network_parameters_by_hash(
    State(state): State<Arc<AppState>>,
    Path(hash): Path<String>,
) -> Result<Response, ApiError> {
    let hash = parse_path_hash(&hash)?;
    let signed =
        ask(&state.tx, |reply| ApplicationCommand::GetNetworkParametersByHash { hash, reply }).await?;
    signed.map(|s| s.to_bytes().into_response()).ok_or_else(not_found)
}

// ---- /admin/api/* -----------------------------------------------------------

async fn get_current_network_parameters(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let result = ask(&state.tx, |reply| ApplicationCommand::GetNetworkParameters { reply }).await?;
    match result {
        Ok(signed) => Ok(signed.to_bytes().into_response()),
        Err(err) => Ok((StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response()),
    }
}

async fn list_nodes(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let result = ask(&state.tx, |reply| ApplicationCommand::ListNodes { reply }).await?;
    Ok(Json(result).into_response())
}

async fn delete_node(
    State(state): State<Arc<AppState>>,
    Path(hash): Path<String>,
) -> Result<Response, ApiError> {
    let hash = parse_path_hash(&hash)?;
    match ask(&state.tx, |reply| ApplicationCommand::DeleteNode { hash, reply }).await? {
        Ok(()) => Ok(StatusCode::NO_CONTENT.into_response()),
        Err(_not_found) => Err(not_found()),
    }
}

async fn list_notaries(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let result = ask(&state.tx, |reply| ApplicationCommand::ListNotaries { reply }).await?;
    Ok(Json(result).into_response())
}

/// Both notary-add endpoints take the same body: a signed `NodeInfo`
/// envelope for the party being trusted as a notary, exactly as a node
/// would publish itself. The primary legal identity becomes the
/// notary's identity, and its signature is checked against its own
/// claimed key before the change is accepted — this is why the admin
/// API accepts a signed envelope here rather than a plain `NotaryInfo`.
async fn add_notary(state: &AppState, body: Bytes, validating: bool) -> Result<Response, ApiError> {
    let signed = Signed::<NodeInfo>::from_bytes(body).map_err(|_| bad_request("malformed signed node info"))?;
    let info: NodeInfo = signed.decode_payload().map_err(|_| bad_request("malformed node info payload"))?;
    let Some(primary): Option<&LegalIdentity> = info.legal_identities.first() else {
        return Err(bad_request("node info has no legal identities"));
    };
    signing::verify(&signed, &primary.owning_key)
        .map_err(|_| ApiError((StatusCode::UNAUTHORIZED, "signature did not verify").into_response()))?;

    let notary = NotaryInfo {
        identity: primary.clone(),
        validating,
    };
    let result = ask(&state.tx, |reply| ApplicationCommand::UpdateParameters {
        change: Change::AddNotary(notary),
        description: None,
        reply,
    })
    .await?;
    update_response(result)
}

async fn add_validating_notary(State(state): State<Arc<AppState>>, body: Bytes) -> Result<Response, ApiError> {
    add_notary(&state, body, true).await
}

async fn add_non_validating_notary(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Response, ApiError> {
    add_notary(&state, body, false).await
}

async fn remove_notary(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Response, ApiError> {
    let name_hash = changeset::notary_name_hash(&name);
    let result = ask(&state.tx, |reply| ApplicationCommand::UpdateParameters {
        change: Change::RemoveNotary { name_hash },
        description: None,
        reply,
    })
    .await?;
    update_response(result)
}

async fn list_whitelist(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let result = ask(&state.tx, |reply| ApplicationCommand::ListWhitelist { reply }).await?;
    Ok(Json(result).into_response())
}

/// Parse a request body of `<fqn>:<sha256>` lines (one attachment hash
/// per line; a contract name may repeat across lines) into the grouped
/// form `Change::AppendWhiteList`/`Change::ReplaceWhiteList` expect.
fn parse_whitelist_body(body: &str) -> Result<Vec<(String, std::collections::BTreeSet<Hash>)>, ApiError> {
    let mut grouped: std::collections::BTreeMap<String, std::collections::BTreeSet<Hash>> =
        std::collections::BTreeMap::new();
    for line in body.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let (fqn, hash) = netmap_api::parse_whitelist_line(line).map_err(bad_request)?;
        grouped.entry(fqn).or_default().insert(hash);
    }
    Ok(grouped.into_iter().collect())
}

async fn append_whitelist(State(state): State<Arc<AppState>>, body: Bytes) -> Result<Response, ApiError> {
    let text = String::from_utf8(body.to_vec()).map_err(|_| bad_request("body is not UTF-8"))?;
    let entries = parse_whitelist_body(&text)?;
    let result = ask(&state.tx, |reply| ApplicationCommand::UpdateParameters {
        change: Change::AppendWhiteList { entries },
        description: None,
        reply,
    })
    .await?;
    update_response(result)
}

async fn replace_whitelist(State(state): State<Arc<AppState>>, body: Bytes) -> Result<Response, ApiError> {
    let text = String::from_utf8(body.to_vec()).map_err(|_| bad_request("body is not UTF-8"))?;
    let entries = parse_whitelist_body(&text)?;
    let result = ask(&state.tx, |reply| ApplicationCommand::UpdateParameters {
        change: Change::ReplaceWhiteList { entries },
        description: None,
        reply,
    })
    .await?;
    update_response(result)
}

async fn clear_whitelist(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let result = ask(&state.tx, |reply| ApplicationCommand::UpdateParameters {
        change: Change::ClearWhiteList,
        description: None,
        reply,
    })
    .await?;
    update_response(result)
}

fn update_response(
    result: Result<netmap_api::ParametersUpdateResult, netmap_api::ParametersUpdateError>,
) -> Result<Response, ApiError> {
    match result {
        Ok(update) => Ok((StatusCode::ACCEPTED, Json(update)).into_response()),
        Err(err @ netmap_api::ParametersUpdateError::BadInput(_)) => {
            Ok((StatusCode::BAD_REQUEST, Json(err)).into_response())
        }
        Err(err @ netmap_api::ParametersUpdateError::StorageIo(_)) => {
            Ok((StatusCode::INTERNAL_SERVER_ERROR, Json(err)).into_response())
        }
    }
}

// ---- /metrics --------------------------------------------------------------

async fn render_metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/openmetrics-text; version=1.0.0; charset=utf-8")],
        state.metrics.render(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_whitelist_body_groups_repeated_contract_names() {
        let hash_a = Hash::of(b"a");
        let hash_b = Hash::of(b"b");
        let body = format!("com.example.Contract:{hash_a}\ncom.example.Contract:{hash_b}\n");
        let entries = parse_whitelist_body(&body).unwrap();
        assert_eq!(entries.len(), 1);
        let (fqn, hashes) = &entries[0];
        assert_eq!(fqn, "com.example.Contract");
        assert!(hashes.contains(&hash_a) && hashes.contains(&hash_b));
    }

    #[test]
    fn parse_whitelist_body_skips_blank_lines() {
        let hash = Hash::of(b"a");
        let body = format!("\n\ncom.example.Contract:{hash}\n\n");
        let entries = parse_whitelist_body(&body).unwrap();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn parse_whitelist_body_rejects_a_malformed_line() {
        assert!(parse_whitelist_body("not-a-valid-line").is_err());
    }
}
