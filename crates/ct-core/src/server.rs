//! HTTP API over a `tiny_http` worker pool.
//!
//! Workers share one listening socket and an `Arc<AppContext>`. Each request
//! runs inside a span carrying its request id. Routing is a pure function of
//! method and URL so it can be exercised without a socket.

use crate::analysis::{duration_analysis, protocol_analysis, tcp_udp_analysis};
use crate::context::AppContext;
use crate::hypothesis::VarianceAssumption;
use crate::logging::{event_names, truncate_for_log};
use crate::rank::top_responders;
use ct_common::{Error, RequestId, Result, StructuredError};
use serde::Serialize;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, info_span, warn};

const RECV_TIMEOUT: Duration = Duration::from_millis(500);

/// A routed response: status plus JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

impl ApiResponse {
    fn ok<T: Serialize>(value: &T) -> Self {
        match serde_json::to_string(value) {
            Ok(body) => Self { status: 200, body },
            Err(e) => Self::error(&Error::from(e)),
        }
    }

    fn error(err: &Error) -> Self {
        Self::error_with_status(err, err.http_status())
    }

    fn error_with_status(err: &Error, status: u16) -> Self {
        Self {
            status,
            body: StructuredError::from(err).to_json(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Route {
    Predict,
    Duration,
    Protocol,
    TcpUdp,
    Top,
    Health,
}

impl Route {
    fn from_path(path: &str) -> Option<Self> {
        match path.trim_end_matches('/') {
            "/predict" => Some(Route::Predict),
            "/hypothesis/duration" => Some(Route::Duration),
            "/hypothesis/protocol" => Some(Route::Protocol),
            "/hypothesis/tcp-udp" => Some(Route::TcpUdp),
            "/top" => Some(Route::Top),
            "/health" => Some(Route::Health),
            _ => None,
        }
    }
}

/// Decode `%XX` escapes and `+` in a query component.
fn percent_decode(input: &str) -> Option<String> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => out.push(b' '),
            b'%' => {
                let hex = input.get(i + 1..i + 3)?;
                out.push(u8::from_str_radix(hex, 16).ok()?);
                i += 2;
            }
            b => out.push(b),
        }
        i += 1;
    }
    String::from_utf8(out).ok()
}

/// Parse a query string; later duplicates win.
fn parse_query(query: &str) -> Result<HashMap<String, String>> {
    let mut params = HashMap::new();
    for pair in query.split('&').filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        let decode = |s: &str| {
            percent_decode(s).ok_or_else(|| Error::InvalidParameter {
                name: "query".to_string(),
                reason: format!("malformed escape in '{}'", truncate_for_log(pair, 64)),
            })
        };
        params.insert(decode(key)?, decode(value)?);
    }
    Ok(params)
}

fn required<'a>(params: &'a HashMap<String, String>, name: &str) -> Result<&'a str> {
    params
        .get(name)
        .map(String::as_str)
        .filter(|v| !v.is_empty())
        .ok_or_else(|| Error::InvalidParameter {
            name: name.to_string(),
            reason: "missing required query parameter".to_string(),
        })
}

fn parse_param<T: std::str::FromStr>(name: &str, raw: &str) -> Result<T> {
    raw.parse().map_err(|_| Error::InvalidParameter {
        name: name.to_string(),
        reason: format!("cannot parse '{}'", truncate_for_log(raw, 64)),
    })
}

fn variance_param(params: &HashMap<String, String>) -> Result<Option<VarianceAssumption>> {
    params
        .get("variance")
        .map(|v| v.parse::<VarianceAssumption>())
        .transpose()
}

#[derive(Serialize)]
struct Health<'a> {
    status: &'static str,
    version: &'static str,
    provenance: &'a crate::context::Provenance,
}

fn dispatch(ctx: &AppContext, route: Route, params: &HashMap<String, String>) -> Result<ApiResponse> {
    Ok(match route {
        Route::Predict => ApiResponse::ok(&ctx.predict(required(params, "ip")?)?),
        Route::Duration => {
            let threshold: f64 = parse_param("threshold", required(params, "threshold")?)?;
            ApiResponse::ok(&duration_analysis(ctx, Some(threshold), variance_param(params)?)?)
        }
        Route::Protocol => {
            let protocol = required(params, "protocol")?;
            ApiResponse::ok(&protocol_analysis(ctx, protocol, variance_param(params)?)?)
        }
        Route::TcpUdp => ApiResponse::ok(&tcp_udp_analysis(ctx, variance_param(params)?)?),
        Route::Top => {
            let limit = params
                .get("limit")
                .map(|raw| parse_param::<usize>("limit", raw))
                .transpose()?;
            ApiResponse::ok(&top_responders(ctx, limit)?)
        }
        Route::Health => ApiResponse::ok(&Health {
            status: "ok",
            version: env!("CARGO_PKG_VERSION"),
            provenance: ctx.provenance(),
        }),
    })
}

/// Route one request to its handler.
pub fn handle(ctx: &AppContext, method: &str, url: &str) -> ApiResponse {
    let (path, query) = url.split_once('?').unwrap_or((url, ""));
    let Some(route) = Route::from_path(path) else {
        return ApiResponse::error_with_status(
            &Error::InvalidParameter {
                name: "path".to_string(),
                reason: format!("no route for {}", truncate_for_log(path, 128)),
            },
            404,
        );
    };
    if !method.eq_ignore_ascii_case("GET") {
        return ApiResponse::error_with_status(
            &Error::InvalidParameter {
                name: "method".to_string(),
                reason: format!("{method} not allowed; use GET"),
            },
            405,
        );
    }

    match parse_query(query).and_then(|params| dispatch(ctx, route, &params)) {
        Ok(response) => response,
        Err(err) => ApiResponse::error(&err),
    }
}

/// Handle to the running API server.
pub struct ApiServer {
    shutdown: Arc<AtomicBool>,
    server: Arc<tiny_http::Server>,
    workers: Vec<thread::JoinHandle<()>>,
    addr: SocketAddr,
}

impl ApiServer {
    /// Bind `addr` and start `workers` threads serving `ctx`.
    pub fn start(addr: &str, workers: usize, ctx: Arc<AppContext>) -> Result<Self> {
        let server = tiny_http::Server::http(addr).map_err(|e| Error::Config(format!(
            "failed to start server on {addr}: {e}"
        )))?;
        let addr = server
            .server_addr()
            .to_ip()
            .ok_or_else(|| Error::Config(format!("{addr} is not an IP listen address")))?;
        let server = Arc::new(server);
        let shutdown = Arc::new(AtomicBool::new(false));

        let mut handles = Vec::with_capacity(workers.max(1));
        for index in 0..workers.max(1) {
            let server = Arc::clone(&server);
            let shutdown = Arc::clone(&shutdown);
            let ctx = Arc::clone(&ctx);
            let handle = thread::Builder::new()
                .name(format!("ct-http-{index}"))
                .spawn(move || serve_loop(&server, &ctx, &shutdown))?;
            handles.push(handle);
        }

        info!(
            event = event_names::SERVER_STARTED,
            addr = %addr,
            workers = handles.len(),
            "server started"
        );

        Ok(Self {
            shutdown,
            server,
            workers: handles,
            addr,
        })
    }

    /// Get the bound address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Block until every worker exits.
    pub fn join(mut self) {
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }

    /// Stop accepting requests and wait for workers to finish.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        for _ in &self.workers {
            self.server.unblock();
        }
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
        info!(event = event_names::SERVER_STOPPED, "server stopped");
    }
}

impl Drop for ApiServer {
    fn drop(&mut self) {
        if !self.workers.is_empty() {
            self.stop();
        }
    }
}

fn serve_loop(server: &tiny_http::Server, ctx: &AppContext, shutdown: &AtomicBool) {
    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }

        // Accept with timeout so we can check shutdown flag
        let request = match server.recv_timeout(RECV_TIMEOUT) {
            Ok(Some(req)) => req,
            Ok(None) => continue,
            Err(e) => {
                if !shutdown.load(Ordering::SeqCst) {
                    error!(error = %e, "server accept error");
                }
                break;
            }
        };

        let request_id = RequestId::new();
        let span = info_span!("request", request_id = %request_id);
        let _guard = span.enter();

        let method = request.method().as_str().to_string();
        let url = request.url().to_string();
        let started = Instant::now();
        debug!(method = %method, url = %truncate_for_log(&url, 256), "request received");

        let response = handle(ctx, &method, &url);
        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        if response.status < 400 {
            info!(
                event = event_names::REQUEST_COMPLETED,
                method = %method,
                url = %truncate_for_log(&url, 256),
                status = response.status,
                elapsed_ms,
                "request completed"
            );
        } else {
            warn!(
                event = event_names::REQUEST_FAILED,
                method = %method,
                url = %truncate_for_log(&url, 256),
                status = response.status,
                elapsed_ms,
                body = %truncate_for_log(&response.body, 512),
                "request failed"
            );
        }

        let mut reply =
            tiny_http::Response::from_string(response.body).with_status_code(response.status);
        for (name, value) in [
            (&b"Content-Type"[..], &b"application/json"[..]),
            (&b"X-Request-Id"[..], request_id.0.as_bytes()),
        ] {
            if let Ok(header) = tiny_http::Header::from_bytes(name, value) {
                reply = reply.with_header(header);
            }
        }
        if let Err(e) = request.respond(reply) {
            warn!(error = %e, "failed to send response");
        }
    }
}
