//! HTTPS server for admission reviews

use crate::admission::{AdmissionGuard, AdmissionReview};
use crate::error::WebhookError;
use axum::body::Bytes;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use hyper_util::service::TowerToHyperService;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_rustls::TlsAcceptor;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

/// Routes: `POST /validate` and `POST /` for reviews, `GET /healthz` for probes.
pub fn router(guard: Arc<AdmissionGuard>) -> Router {
    Router::new()
        .route("/validate", post(validate))
        .route("/", post(validate))
        .route("/healthz", get(healthz))
        .layer(TraceLayer::new_for_http())
        .with_state(guard)
}

async fn validate(State(guard): State<Arc<AdmissionGuard>>, body: Bytes) -> Json<AdmissionReview> {
    Json(guard.review(&body).await)
}

async fn healthz() -> &'static str {
    "ok"
}

/// Accepts TLS connections on `listener` and serves `app` on each.
///
/// Runs until accepting fails. Handshake and connection errors only end the
/// affected connection.
pub async fn serve(listener: TcpListener, acceptor: TlsAcceptor, app: Router) -> Result<(), WebhookError> {
    info!("Admission webhook listening on {}", listener.local_addr()?);

    loop {
        let (stream, peer) = listener.accept().await?;
        let acceptor = acceptor.clone();
        let app = app.clone();

        tokio::spawn(async move {
            let tls = match acceptor.accept(stream).await {
                Ok(tls) => tls,
                Err(e) => {
                    warn!("TLS handshake with {} failed: {}", peer, e);
                    return;
                }
            };
            let service = TowerToHyperService::new(app);
            if let Err(e) = auto::Builder::new(TokioExecutor::new())
                .serve_connection(TokioIo::new(tls), service)
                .await
            {
                debug!("Connection from {} closed with error: {}", peer, e);
            }
        });
    }
}
