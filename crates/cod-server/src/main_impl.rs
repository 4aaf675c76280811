//! Circumference Over Diameter HTTP Server
//!
//! Pi digits API server using Axum with LRU caching.
//!
//! Provides a MessagePack-based API for retrieving digits of pi.
//!
//! # Endpoints
//!
//! - `GET /pi/{digits}?strategy=[seq|par|adaptive]`
//!   - Returns `{digits, pi, elapsed_ms}` encoded in MessagePack.
//!   - Supports strategy selection via query parameter.
//! - `GET /cache/stats`
//!   - JSON counters: hits, misses, hit ratio, cancellations, occupancy.
//!
//! # Cache
//!
//! Every strategy yields the same digits, so results are cached by digit count
//! alone. The cache size is configurable via CLI arguments.
//!
//! # Cancellation
//!
//! Computations run on the blocking pool. If the client goes away, the request
//! future is dropped and the computation is cancelled at its next split boundary.

use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use anyhow::Context;
use clap::Parser;
use cod_core::{compute_pi_with, config::limits, CancelToken, Evaluation, PiError, PiOptions};
use lru::LruCache;
use rmp_serde::encode::to_vec_named;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::num::NonZeroUsize;
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex, MutexGuard,
};
use tracing::{debug, info, warn};

/// Default largest digit count served.
const DEFAULT_MAX_DIGITS: u64 = 10_000_000;

/// Server options.
#[derive(Parser)]
#[command(name = "cod-server", version, about = "Circumference Over Diameter HTTP API Server")]
struct Args {
    /// TCP port.
    #[arg(short, long, default_value_t = 3000)]
    port: u16,

    /// Number of results kept in the LRU cache.
    #[arg(long, default_value_t = 1000)]
    cache_size: usize,

    /// Largest digit count a request may ask for.
    #[arg(long, default_value_t = DEFAULT_MAX_DIGITS)]
    max_digits: u64,
}

/// Query parameters for the /pi endpoint.
#[derive(Clone, Copy, Deserialize)]
struct Params {
    /// Evaluation strategy (default: adaptive).
    #[serde(default)]
    strategy: Evaluation,
}

/// Response body, encoded as a MessagePack map.
#[derive(Serialize, Deserialize, Debug, PartialEq)]
pub struct PiResponse {
    pub digits: u64,
    pub pi: String,
    pub elapsed_ms: u64,
}

/// Error body, encoded as JSON.
#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

/// Cache key: digit count
type CacheKey = u64;
/// Cache value: pre-serialized MessagePack bytes
type CacheValue = Arc<Vec<u8>>;

/// Request counters behind `/cache/stats`.
#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    cancelled: AtomicU64,
}

/// State shared by every handler; cloning shares the cache and counters.
#[derive(Clone)]
struct AppState {
    /// `LruCache` mutates on reads, so even lookups take the lock.
    cache: Arc<Mutex<LruCache<CacheKey, CacheValue>>>,
    counters: Arc<Counters>,
    /// Largest digit count served; above it requests get 413.
    max_digits: u64,
}

impl AppState {
    fn new(cache_size: NonZeroUsize, max_digits: u64) -> Self {
        Self {
            cache: Arc::new(Mutex::new(LruCache::new(cache_size))),
            counters: Arc::default(),
            max_digits,
        }
    }

    /// Locks the cache. A poisoned lock still holds a consistent LRU, since
    /// entries are only inserted whole.
    fn cache(&self) -> MutexGuard<'_, LruCache<CacheKey, CacheValue>> {
        self.cache
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn stats(&self) -> CacheStats {
        let hits = self.counters.hits.load(Ordering::Relaxed);
        let misses = self.counters.misses.load(Ordering::Relaxed);
        let lookups = hits + misses;
        let cache = self.cache();
        CacheStats {
            hits,
            misses,
            hit_ratio: if lookups == 0 {
                0.0
            } else {
                hits as f64 / lookups as f64
            },
            cancelled: self.counters.cancelled.load(Ordering::Relaxed),
            cached_entries: cache.len(),
            cache_capacity: cache.cap().get(),
        }
    }
}

/// Cancels the token when dropped, i.e. when the request future goes away.
struct CancelOnDrop(CancelToken);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

fn msgpack(bytes: CacheValue) -> Response {
    (
        [(header::CONTENT_TYPE, "application/msgpack")],
        bytes.as_ref().clone(),
    )
        .into_response()
}

fn error_response(status: StatusCode, message: String) -> Response {
    (status, Json(ErrorBody { error: message })).into_response()
}

/// Maps a core failure to its HTTP status.
fn status_for(err: &PiError) -> StatusCode {
    match err {
        PiError::InvalidDigitCount { .. } | PiError::InvalidRange { .. } => StatusCode::BAD_REQUEST,
        PiError::ResourceExhausted { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        PiError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
        PiError::ComputationError(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Handler for getting digits of pi.
///
/// Route: `GET /pi/{digits}?strategy=[seq|par|adaptive]`
async fn get_pi(
    State(state): State<AppState>,
    Path(digits): Path<i64>,
    Query(params): Query<Params>,
) -> Response {
    if digits < 1 {
        return error_response(
            StatusCode::BAD_REQUEST,
            PiError::InvalidDigitCount { digits }.to_string(),
        );
    }
    let key = digits as u64;
    if key > state.max_digits {
        return error_response(
            StatusCode::PAYLOAD_TOO_LARGE,
            format!("At most {} digits are served", state.max_digits),
        );
    }

    if let Some(cached) = state.cache().get(&key).cloned() {
        state.counters.hits.fetch_add(1, Ordering::Relaxed);
        debug!(digits, "cache hit");
        return msgpack(cached);
    }

    state.counters.misses.fetch_add(1, Ordering::Relaxed);
    debug!(digits, strategy = %params.strategy, "cache miss");

    let guard = CancelOnDrop(CancelToken::new());
    let options = PiOptions {
        evaluation: params.strategy,
        cancel: Some(guard.0.clone()),
        progress: None,
    };
    // Counted on the blocking side: a dropped request never resumes here.
    let counters = state.counters.clone();
    let joined = tokio::task::spawn_blocking(move || {
        let result = compute_pi_with(digits, &options);
        if matches!(result, Err(PiError::Cancelled)) {
            counters.cancelled.fetch_add(1, Ordering::Relaxed);
        }
        result
    })
    .await;
    drop(guard);

    let computation = match joined {
        Ok(Ok(computation)) => computation,
        Ok(Err(err)) => {
            warn!(digits, error = %err, "computation failed");
            return error_response(status_for(&err), err.to_string());
        }
        Err(err) => {
            warn!(digits, error = %err, "computation task failed");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, err.to_string());
        }
    };

    let body = PiResponse {
        digits: computation.digits,
        pi: computation.pi,
        elapsed_ms: computation.elapsed.as_millis() as u64,
    };
    match to_vec_named(&body) {
        Ok(bytes) => {
            let bytes = Arc::new(bytes);
            state.cache().put(key, bytes.clone());
            msgpack(bytes)
        }
        Err(e) => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Serialization error: {}", e),
        ),
    }
}

/// Body of `/cache/stats`.
#[derive(Serialize)]
struct CacheStats {
    hits: u64,
    misses: u64,
    hit_ratio: f64,
    /// Computations stopped because their client went away.
    cancelled: u64,
    cached_entries: usize,
    cache_capacity: usize,
}

/// Route: `GET /cache/stats`
async fn cache_stats(State(state): State<AppState>) -> Json<CacheStats> {
    Json(state.stats())
}

/// Route: `GET /`
async fn root() -> Html<&'static str> {
    Html(include_str!("index.html"))
}

/// Builds the router and its shared state.
///
/// Kept apart from [`run`] so tests can drive the app with `oneshot`.
///
/// # Arguments
/// * `cache_size` - Maximum number of entries in the LRU cache (0 is raised to 1).
/// * `max_digits` - Largest digit count served, capped at the core limit.
pub fn create_app(cache_size: usize, max_digits: u64) -> Router {
    let cache_size = NonZeroUsize::new(cache_size).unwrap_or(NonZeroUsize::MIN);
    let state = AppState::new(cache_size, max_digits.min(limits::MAX_DIGITS));

    Router::new()
        .route("/", get(root))
        .route("/pi/{digits}", get(get_pi))
        .route("/cache/stats", get(cache_stats))
        .with_state(state)
}

/// Parses arguments, sets up logging, prewarms the engine and serves until stopped.
pub async fn run() -> anyhow::Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("cod_server=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    info!("Circumference Over Diameter Server v{}", env!("CARGO_PKG_VERSION"));
    info!("Initializing system...");
    tokio::task::spawn_blocking(cod_core::prewarm_system).await?;

    info!(cache_size = args.cache_size, max_digits = args.max_digits, "configuration");

    let app = create_app(args.cache_size, args.max_digits);

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind port {}", args.port))?;
    axum::serve(listener, app).await.context("server error")
}
