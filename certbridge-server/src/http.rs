//! HTTP front end for Caddy's `get_certificate http` directive.
//!
//! Routes:
//! - `GET /`                                   - service info
//! - `GET /{location}/{name}?server_name=HOST` - PEM bundle for HOST
//! - `GET /{location}/{name}`                  - JSON listing of the store
//! - `GET /{location}/{name}/{thumbprint}`     - PEM bundle by thumbprint

use crate::defaults::PEM_CHAIN_CONTENT_TYPE;
use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use certbridge_core::{
    CertificateBundle, CertificateService, HintError, ServiceError, StoreError, StoreLocation,
    StoreName, StoreSelector, TlsHints,
};
use serde::Deserialize;
use thiserror::Error;
use tower_http::trace::TraceLayer;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(e: ServiceError) -> Self {
        match e {
            ServiceError::Store(StoreError::StoreNotFound(selector)) => {
                Self::NotFound(format!("Certificate store {} does not exist", selector))
            }
            ServiceError::Store(e) => Self::Internal(e.to_string()),
            ServiceError::Export(e) => Self::BadRequest(e.to_string()),
        }
    }
}

impl From<HintError> for ApiError {
    fn from(e: HintError) -> Self {
        Self::BadRequest(e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let Self::Internal(message) = &self {
            tracing::error!("Request failed: {}", message);
        }
        (self.status(), self.to_string()).into_response()
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct CertificateQuery {
    pub server_name: Option<String>,
    pub signature_schemes: Option<String>,
    pub cipher_suites: Option<String>,
}

pub fn router(service: CertificateService) -> Router {
    Router::new()
        .route("/", get(info_handler))
        .route("/{location}/{name}", get(store_handler))
        .route("/{location}/{name}/{thumbprint}", get(thumbprint_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

/// Unknown names and locations fall back to `My` / `LocalMachine`.
pub fn parse_selector(location: &str, name: &str) -> StoreSelector {
    let location = location.parse().unwrap_or_else(|e| {
        tracing::debug!("{}, using {}", e, StoreLocation::default());
        StoreLocation::default()
    });
    let name = name.parse().unwrap_or_else(|e| {
        tracing::debug!("{}, using {}", e, StoreName::default());
        StoreName::default()
    });
    StoreSelector::new(name, location)
}

async fn info_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "name": "certbridge",
        "version": env!("CARGO_PKG_VERSION"),
        "locations": StoreLocation::ALL.map(|l| l.as_path_segment()),
        "stores": StoreName::ALL.map(|n| n.dir_name()),
        "endpoints": {
            "certificate": "GET /{location}/{name}?server_name=HOST[&signature_schemes=..][&cipher_suites=..]",
            "by_thumbprint": "GET /{location}/{name}/{thumbprint}",
            "list": "GET /{location}/{name}"
        }
    }))
}

async fn store_handler(
    State(service): State<CertificateService>,
    Path((location, name)): Path<(String, String)>,
    Query(query): Query<CertificateQuery>,
) -> Result<Response, ApiError> {
    let selector = parse_selector(&location, &name);

    let Some(host) = query.server_name else {
        let summaries = run_blocking(move || service.list(&selector)).await?;
        return Ok(Json(summaries).into_response());
    };

    let hints = TlsHints::parse(
        query.signature_schemes.as_deref(),
        query.cipher_suites.as_deref(),
    )?;
    let lookup_host = host.clone();
    let bundle =
        run_blocking(move || service.bundle_for_host(&selector, &lookup_host, &hints)).await?;

    match bundle {
        Some(bundle) => Ok(pem_response(&bundle)),
        None => Err(ApiError::NotFound(format!(
            "Could not find certificate for {}",
            host
        ))),
    }
}

async fn thumbprint_handler(
    State(service): State<CertificateService>,
    Path((location, name, thumbprint)): Path<(String, String, String)>,
) -> Result<Response, ApiError> {
    let selector = parse_selector(&location, &name);
    let lookup = thumbprint.clone();
    let bundle = run_blocking(move || service.bundle_for_thumbprint(&selector, &lookup)).await?;

    match bundle {
        Some(bundle) => Ok(pem_response(&bundle)),
        None => Err(ApiError::NotFound(format!(
            "Could not find certificate with thumbprint {}",
            thumbprint
        ))),
    }
}

fn pem_response(bundle: &CertificateBundle) -> Response {
    (
        [(header::CONTENT_TYPE, PEM_CHAIN_CONTENT_TYPE)],
        bundle.to_pem_string(),
    )
        .into_response()
}

/// Run store work on the blocking pool. The job owns everything it touches,
/// so a dropped request still lets it finish and release its records.
async fn run_blocking<T, F>(job: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, ServiceError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(job)
        .await
        .map_err(|e| ApiError::Internal(format!("Certificate lookup task failed: {}", e)))?
        .map_err(ApiError::from)
}
