//! Request routes shipped with the binary.
//!
//! Business endpoints are supplied by the embedding application; the binary
//! only exposes service information behind the authorization filter.

use axum::{routing::get, Extension, Json, Router};
use serde::{Deserialize, Serialize};

use crate::docs::ServiceInfo;
use crate::security::CallerIdentity;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InfoResponse {
    pub name: String,
    pub version: String,
    /// Subject of the authenticated caller, absent for anonymous requests.
    pub caller: Option<String>,
}

pub fn service_routes() -> Router {
    Router::new().route("/api/v1/info", get(info))
}

async fn info(identity: Option<Extension<CallerIdentity>>) -> Json<InfoResponse> {
    let service = ServiceInfo::current();
    Json(InfoResponse {
        name: service.name.to_string(),
        version: service.version.to_string(),
        caller: identity.map(|Extension(identity)| identity.subject),
    })
}
