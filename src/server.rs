//! HTTP boundary around the generator
//!
//! Responsibilities:
//! - Accept TCP connections and serve HTTP/1.1 via hyper
//! - Per-client rate limiting of generation requests
//! - Form coercion, validation, synthesis
//! - JSON responses

pub mod form;
pub mod rate_limit;

pub use form::{parse_generate_form, FormError};
pub use rate_limit::{RateDecision, RateLimitConfig, RateLimiter};

use std::net::SocketAddr;
use std::sync::Arc;

use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::{Bytes, Incoming};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde_json::json;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::error::{ArmorError, Result};
use crate::request::ConfigRequest;
use crate::synth::{synthesize, ArtifactBundle};

/// Largest `/generate` body accepted
pub const MAX_FORM_BYTES: usize = 16 * 1024;

/// Shared per-server state handed to every connection
pub struct AppState {
    pub name: String,
    pub version: String,
    /// `None` disables rate limiting
    pub rate_limiter: Option<RateLimiter>,
}

impl AppState {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            rate_limiter: None,
        }
    }

    pub fn with_rate_limiter(mut self, limiter: RateLimiter) -> Self {
        self.rate_limiter = Some(limiter);
        self
    }
}

/// Main server struct
pub struct Server {
    listener: TcpListener,
    addr: SocketAddr,
    state: Arc<AppState>,
}

impl Server {
    pub async fn bind(addr: SocketAddr, state: AppState) -> Result<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ArmorError::Bind { addr, source: e })?;

        let actual_addr = listener
            .local_addr()
            .map_err(|e| ArmorError::Config(format!("Failed to get local address: {}", e)))?;

        info!(%actual_addr, "Server bound successfully");

        Ok(Self {
            listener,
            addr: actual_addr,
            state: Arc::new(state),
        })
    }

    pub async fn run(self) -> Result<()> {
        info!(addr = %self.addr, "Starting server");

        loop {
            let (stream, remote_addr) = match self.listener.accept().await {
                Ok(conn) => conn,
                Err(e) => {
                    error!(%e, "Failed to accept connection");
                    continue;
                }
            };

            let io = TokioIo::new(stream);
            let state = self.state.clone();

            tokio::spawn(async move {
                let service =
                    service_fn(move |req| handle_request(req, remote_addr, state.clone()));
                if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                    let err = ArmorError::Connection {
                        remote: remote_addr,
                        source: e,
                    };
                    warn!(%remote_addr, error = %err, "Connection error");
                }
            });
        }
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }
}

/// Route a single HTTP request
pub async fn handle_request(
    req: Request<Incoming>,
    remote_addr: SocketAddr,
    state: Arc<AppState>,
) -> std::result::Result<Response<Full<Bytes>>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    info!(%remote_addr, %method, uri = %req.uri(), "Request received");

    let response = match (method, path.as_str()) {
        (Method::GET, "/") => text_response(StatusCode::OK, USAGE),
        (Method::GET, "/health") => json_response(
            StatusCode::OK,
            json!({
                "status": "ok",
                "name": state.name,
                "version": state.version,
            }),
        ),
        (Method::POST, "/generate") => {
            if let Some(limiter) = &state.rate_limiter {
                if let RateDecision::Limited { retry_after } = limiter.check(remote_addr.ip()) {
                    warn!(%remote_addr, retry_after, "Generation rate limit exceeded");
                    return Ok(rate_limited_response(retry_after));
                }
            }
            match Limited::new(req.into_body(), MAX_FORM_BYTES).collect().await {
                Ok(collected) => generate(&collected.to_bytes(), remote_addr),
                Err(e) if e.is::<LengthLimitError>() => {
                    warn!(%remote_addr, limit = MAX_FORM_BYTES, "Generate form too large");
                    error_response(StatusCode::PAYLOAD_TOO_LARGE, "Request body too large")
                }
                Err(e) => {
                    warn!(%remote_addr, error = %e, "Failed to read request body");
                    error_response(StatusCode::BAD_REQUEST, "Failed to read request body")
                }
            }
        }
        (_, "/" | "/health" | "/generate") => {
            error_response(StatusCode::METHOD_NOT_ALLOWED, "Method not allowed")
        }
        _ => error_response(StatusCode::NOT_FOUND, "Not found"),
    };

    Ok(response)
}

const USAGE: &str = "VoIP Armor

POST /generate (application/x-www-form-urlencoded)
  server_type   asterisk | freeswitch | opensips
  sip_port      1-65535
  rtp_start     1024-65535
  rtp_end       1024-65535, greater than rtp_start
  max_attempts  1-10
  ban_time      60-86400 (seconds)
  enable_ssh    optional checkbox
  enable_ipv6   optional checkbox
";

/// Coerce, validate, synthesize
fn build_bundle(body: &[u8]) -> Result<ArtifactBundle> {
    let raw = parse_generate_form(body)?;
    let request = ConfigRequest::try_from(raw)?;
    Ok(synthesize(&request))
}

fn generate(body: &[u8], remote_addr: SocketAddr) -> Response<Full<Bytes>> {
    let bundle = match build_bundle(body) {
        Ok(bundle) => bundle,
        Err(ArmorError::Validation(failure)) => {
            info!(
                %remote_addr,
                violations = failure.violations.len(),
                "Configuration request rejected"
            );
            return json_response(
                StatusCode::UNPROCESSABLE_ENTITY,
                json!({
                    "success": false,
                    "errors": failure.violations,
                }),
            );
        }
        Err(e @ ArmorError::Form(_)) => {
            warn!(%remote_addr, error = %e, "Malformed generate form");
            return error_response(StatusCode::BAD_REQUEST, &e.to_string());
        }
        Err(e) => {
            error!(%remote_addr, error = %e, "Generation failed");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "Internal error");
        }
    };

    info!(
        %remote_addr,
        backend = %bundle.backend(),
        artifacts = bundle.len(),
        "Generated artifact bundle"
    );

    let artifacts: Vec<_> = bundle
        .iter()
        .map(|a| json!({ "name": a.name, "content": a.content }))
        .collect();

    json_response(
        StatusCode::OK,
        json!({
            "success": true,
            "backend": bundle.backend(),
            "artifacts": artifacts,
        }),
    )
}

fn json_response(status: StatusCode, body: serde_json::Value) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap()
}

fn text_response(status: StatusCode, body: &'static str) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header("Content-Type", "text/plain; charset=utf-8")
        .body(Full::new(Bytes::from_static(body.as_bytes())))
        .unwrap()
}

fn error_response(status: StatusCode, message: &str) -> Response<Full<Bytes>> {
    json_response(
        status,
        json!({
            "success": false,
            "error": message,
        }),
    )
}

fn rate_limited_response(retry_after: u32) -> Response<Full<Bytes>> {
    let body = json!({
        "success": false,
        "error": "Rate limit exceeded",
    });

    Response::builder()
        .status(StatusCode::TOO_MANY_REQUESTS)
        .header("Retry-After", retry_after.to_string())
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap()
}
