use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;

use waypost_core::message::{
    DeregisterRequest, DeregisterResponse, HeartbeatRequest, HeartbeatResponse, LookupRequest,
    LookupResponse, RegisterRequest, RegisterResponse,
};
use waypost_core::ServiceId;

use super::client_addr::{default_address, ClientAddr};
use super::response::ApiError;
use crate::registry::ServiceRegistry;

/// Unwrap a JSON body, turning syntax and shape errors into a client error.
fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload.map(|Json(value)| value).map_err(|rejection| {
        tracing::debug!(error = %rejection.body_text(), "Rejected request body");
        ApiError::from(rejection)
    })
}

/// Ids that do not parse can never match a live entry.
fn parse_id(raw: &str) -> Option<ServiceId> {
    raw.trim().parse().ok()
}

/// Axum handler for POST /register.
pub async fn register_handler(
    State(registry): State<ServiceRegistry>,
    ClientAddr(client_ip): ClientAddr,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<Json<RegisterResponse>, ApiError> {
    let request = body(payload)?;
    request.validate()?;

    let address = match request.address.filter(|a| !a.trim().is_empty()) {
        Some(address) => address,
        // The guessed origin lacks the service's own port unless the caller sends it.
        None => match client_ip {
            Some(ip) => default_address(ip, request.port),
            None => {
                return Err(ApiError::validation(
                    "'address' omitted and the client address is unknown",
                ))
            }
        },
    };

    let id = registry.register(request.name, address);

    Ok(Json(RegisterResponse {
        id: id.to_string(),
        success: true,
    }))
}

/// Axum handler for POST /deregister.
pub async fn deregister_handler(
    State(registry): State<ServiceRegistry>,
    payload: Result<Json<DeregisterRequest>, JsonRejection>,
) -> Result<Json<DeregisterResponse>, ApiError> {
    let request = body(payload)?;
    request.validate()?;

    let success = parse_id(&request.id)
        .map(|id| registry.deregister(id).is_ok())
        .unwrap_or(false);

    Ok(Json(DeregisterResponse { success }))
}

/// Axum handler for POST /lookup.
pub async fn lookup_handler(
    State(registry): State<ServiceRegistry>,
    payload: Result<Json<LookupRequest>, JsonRejection>,
) -> Result<Json<LookupResponse>, ApiError> {
    let request = body(payload)?;
    request.validate()?;

    Ok(Json(LookupResponse::from_address(
        registry.lookup(&request.name),
    )))
}

/// Axum handler for POST /heartbeat.
pub async fn heartbeat_handler(
    State(registry): State<ServiceRegistry>,
    payload: Result<Json<HeartbeatRequest>, JsonRejection>,
) -> Result<Json<HeartbeatResponse>, ApiError> {
    let request = body(payload)?;
    request.validate()?;

    let success = parse_id(&request.id)
        .map(|id| registry.heartbeat(id).is_ok())
        .unwrap_or(false);

    Ok(Json(HeartbeatResponse { success }))
}
