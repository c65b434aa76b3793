//! Health & readiness handlers.
//!
//! - GET /_healthz  -> simple liveness ("ok")
//! - GET /_readyz   -> readiness that checks the bucket registry and disk I/O

use crate::services::storage_service::StorageService;
use axum::{Json, extract::State, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use std::{collections::BTreeMap, path::Path};
use tokio::fs;
use uuid::Uuid;

const MARKER_CONTENT: &[u8] = b"readyz";

/// `GET /_healthz`
///
/// Liveness only; never touches the disk.
pub async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, Json(ReadyResponse::new(BTreeMap::new())))
}

/// `GET /_readyz`
///
/// 200 when the bucket registry loads and the storage root accepts a
/// write/read/delete round trip, 503 otherwise. Each check is reported.
pub async fn readyz(State(service): State<StorageService>) -> impl IntoResponse {
    let mut checks = BTreeMap::new();
    checks.insert("registry", registry_check(&service).await);
    checks.insert("disk", disk_check(service.base_path()).await);

    let body = ReadyResponse::new(checks);
    let status = if body.is_ok() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(body))
}

async fn registry_check(service: &StorageService) -> CheckStatus {
    match service.buckets.list_buckets().await {
        Ok(_) => CheckStatus::ok(),
        Err(err) => CheckStatus::failed(err.to_string()),
    }
}

async fn disk_check(root: &Path) -> CheckStatus {
    let marker = root.join(format!(".readyz-{}", Uuid::new_v4()));
    if let Err(err) = fs::write(&marker, MARKER_CONTENT).await {
        return CheckStatus::failed(format!("could not write marker file: {err}"));
    }

    let check = match fs::read(&marker).await {
        Ok(bytes) if bytes == MARKER_CONTENT => CheckStatus::ok(),
        Ok(_) => CheckStatus::failed("marker file content mismatch".to_string()),
        Err(err) => CheckStatus::failed(format!("could not read marker file: {err}")),
    };
    let _ = fs::remove_file(&marker).await;
    check
}

#[derive(Serialize)]
struct ReadyResponse {
    status: &'static str,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    checks: BTreeMap<&'static str, CheckStatus>,
}

impl ReadyResponse {
    fn new(checks: BTreeMap<&'static str, CheckStatus>) -> Self {
        let ok = checks.values().all(|check| check.ok);
        Self {
            status: if ok { "ok" } else { "error" },
            checks,
        }
    }

    fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

#[derive(Serialize)]
struct CheckStatus {
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl CheckStatus {
    fn ok() -> Self {
        Self {
            ok: true,
            error: None,
        }
    }

    fn failed(error: String) -> Self {
        Self {
            ok: false,
            error: Some(error),
        }
    }
}
