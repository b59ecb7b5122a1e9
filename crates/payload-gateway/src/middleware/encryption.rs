//! Tower layer applying [`PolicyEngine`] to HTTP requests and responses.
//!
//! Request path: classify → resolve session → buffer body → decrypt on a
//! blocking thread → handler. Response path: buffer JSON body → encrypt on a
//! blocking thread → attach protocol headers.

use crate::domain::error::Rejection;
use crate::domain::headers::{
    is_truthy, CAPABILITY_HEADER, ENCRYPTED_HEADER, SESSION_HEADER, VERSION_HEADER,
};
use crate::domain::routes::RoutePolicy;
use crate::middleware::metrics::EncryptionMetrics;
use crate::middleware::policy::{InboundOutcome, OutboundOutcome, PolicyEngine};
use crate::middleware::session::{resolve_session, RequestMetadata, ResolvedSession};
use axum::{
    body::{to_bytes, Body, Bytes},
    http::{header, HeaderMap, HeaderValue, Request},
    response::{IntoResponse, Response},
};
use payload_envelope::PROTOCOL_VERSION;
use std::sync::Arc;
use tower::{Layer, Service};
use tracing::{debug, warn};

/// Encryption layer
#[derive(Clone)]
pub struct EncryptionLayer {
    engine: Arc<PolicyEngine>,
    metrics: Arc<EncryptionMetrics>,
}

impl EncryptionLayer {
    pub fn new(engine: Arc<PolicyEngine>, metrics: Arc<EncryptionMetrics>) -> Self {
        Self { engine, metrics }
    }
}

impl<S> Layer<S> for EncryptionLayer {
    type Service = EncryptionService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        EncryptionService {
            inner,
            engine: Arc::clone(&self.engine),
            metrics: Arc::clone(&self.metrics),
        }
    }
}

/// Encryption service
#[derive(Clone)]
pub struct EncryptionService<S> {
    inner: S,
    engine: Arc<PolicyEngine>,
    metrics: Arc<EncryptionMetrics>,
}

impl<S> Service<Request<Body>> for EncryptionService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = Response;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(
        &mut self,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let engine = Arc::clone(&self.engine);
        let metrics = Arc::clone(&self.metrics);
        let mut inner = self.inner.clone();

        Box::pin(async move {
            let path = req.uri().path().to_string();
            let policy = engine.classify(&path);

            if policy == RoutePolicy::Excluded {
                metrics.record_excluded();
                return inner.call(req).await;
            }

            let session = resolve_session(&RequestMetadata::from_request(&req));
            let client_supports = is_truthy(req.headers().get(CAPABILITY_HEADER));

            debug!(
                route = %path,
                policy = %policy,
                session_source = session.source.as_str(),
                client_supports,
                "Applying encryption policy"
            );

            let req = match decrypt_request(&engine, policy, &session, req).await {
                Ok((req, decrypted)) => {
                    if decrypted {
                        metrics.record_decrypted();
                    } else {
                        metrics.record_plaintext_request();
                    }
                    req
                }
                Err(rejection) => {
                    metrics.record_rejected();
                    log_rejection(&engine, &path, &session, &rejection);
                    return Ok(rejection.into_response());
                }
            };

            let response = inner.call(req).await?;

            Ok(encrypt_response(
                &engine,
                &metrics,
                policy,
                client_supports,
                &path,
                &session,
                response,
            )
            .await)
        })
    }
}

/// Buffer the request body and replace it with plaintext when it carried
/// an envelope. Returns whether a decryption happened.
async fn decrypt_request(
    engine: &Arc<PolicyEngine>,
    policy: RoutePolicy,
    session: &ResolvedSession,
    req: Request<Body>,
) -> Result<(Request<Body>, bool), Rejection> {
    let limit = engine.max_body_bytes();
    let (mut parts, body) = req.into_parts();
    let bytes = to_bytes(body, limit)
        .await
        .map_err(|_| Rejection::PayloadTooLarge { limit })?;

    let outcome = {
        let engine = Arc::clone(engine);
        let token = session.token.clone();
        let bytes = bytes.clone();
        tokio::task::spawn_blocking(move || engine.process_inbound(policy, &bytes, &token))
            .await
            .map_err(|e| Rejection::Internal(format!("decrypt task failed: {}", e)))??
    };

    parts.extensions.insert(session.clone());

    match outcome {
        InboundOutcome::Passthrough => Ok((Request::from_parts(parts, Body::from(bytes)), false)),
        InboundOutcome::Decrypted(value) => {
            let plain = serde_json::to_vec(&value)
                .map_err(|e| Rejection::Internal(format!("re-encode failed: {}", e)))?;
            set_json_body_headers(&mut parts.headers, plain.len());
            Ok((Request::from_parts(parts, Body::from(plain)), true))
        }
    }
}

/// Encrypt a handler response when policy allows it.
///
/// Negotiated routes only encrypt JSON. Forced routes encrypt every body so
/// nothing leaves in plaintext because of its content type.
async fn encrypt_response(
    engine: &Arc<PolicyEngine>,
    metrics: &EncryptionMetrics,
    policy: RoutePolicy,
    client_supports: bool,
    path: &str,
    session: &ResolvedSession,
    response: Response,
) -> Response {
    let skip_by_type = policy == RoutePolicy::Negotiated && !is_json(response.headers());
    if !engine.should_encrypt_response(policy, client_supports) || skip_by_type {
        metrics.record_plaintext_response();
        return response;
    }

    let (mut parts, body) = response.into_parts();
    let bytes: Bytes = match to_bytes(body, engine.max_response_bytes()).await {
        Ok(bytes) => bytes,
        Err(e) => {
            let rejection = Rejection::Internal(format!("response body unreadable: {}", e));
            metrics.record_failed();
            log_rejection(engine, path, session, &rejection);
            return rejection.into_response();
        }
    };

    let outcome = {
        let engine = Arc::clone(engine);
        let token = session.token.clone();
        let bytes = bytes.clone();
        tokio::task::spawn_blocking(move || {
            engine.process_outbound(policy, client_supports, &bytes, &token)
        })
        .await
        .map_err(|e| Rejection::Internal(format!("encrypt task failed: {}", e)))
        .and_then(|result| result)
    };

    match outcome {
        Ok(OutboundOutcome::Encrypted(sealed)) => {
            metrics.record_encrypted();
            set_json_body_headers(&mut parts.headers, sealed.len());
            parts
                .headers
                .insert(ENCRYPTED_HEADER, HeaderValue::from_static("true"));
            parts
                .headers
                .insert(VERSION_HEADER, HeaderValue::from_static(PROTOCOL_VERSION));
            if let Ok(value) = HeaderValue::from_str(session.token.as_str()) {
                parts.headers.insert(SESSION_HEADER, value);
            }
            Response::from_parts(parts, Body::from(sealed))
        }
        Ok(OutboundOutcome::Passthrough) => {
            metrics.record_plaintext_response();
            Response::from_parts(parts, Body::from(bytes))
        }
        Ok(OutboundOutcome::Fallback(err)) => {
            metrics.record_fallback();
            if engine.debug() {
                warn!(route = %path, session = %session.token, error = %err, "Response encryption failed, sending plaintext");
            } else {
                warn!(route = %path, kind = err.kind(), "Response encryption failed, sending plaintext");
            }
            Response::from_parts(parts, Body::from(bytes))
        }
        Err(rejection) => {
            metrics.record_failed();
            log_rejection(engine, path, session, &rejection);
            rejection.into_response()
        }
    }
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(|mime| mime.trim().eq_ignore_ascii_case("application/json"))
        .unwrap_or(false)
}

fn set_json_body_headers(headers: &mut HeaderMap, len: usize) {
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("application/json"),
    );
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(len));
}

fn log_rejection(engine: &PolicyEngine, path: &str, session: &ResolvedSession, rejection: &Rejection) {
    if engine.debug() {
        warn!(
            route = %path,
            session = %session.token,
            session_source = session.source.as_str(),
            kind = rejection.kind(),
            detail = %rejection,
            "Encryption layer rejected request"
        );
    } else {
        warn!(route = %path, kind = rejection.kind(), "Encryption layer rejected request");
    }
}
