use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};

use stockledger_infra::LedgerError;
use stockledger_movements::{Movement, MovementId};

use crate::app::{dto, errors};
use crate::app::services::AppServices;
use crate::context::TenantContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_movement).get(list_movements))
        .route(
            "/:id",
            get(get_movement).patch(revise_movement).delete(delete_movement),
        )
        .route("/:id/accept", post(accept_movement))
        .route("/:id/reject", post(reject_movement))
}

fn parse_movement_id(id: &str) -> Result<MovementId, axum::response::Response> {
    dto::parse_id(id, "movement").map(MovementId::new)
}

fn movement_response(
    status: StatusCode,
    result: Result<Movement, LedgerError>,
) -> axum::response::Response {
    match result {
        Ok(movement) => (status, Json(dto::movement_to_json(&movement))).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn create_movement(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Json(body): Json<dto::CreateMovementRequest>,
) -> axum::response::Response {
    let input = match body.into_input() {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    movement_response(
        StatusCode::CREATED,
        services.ledger().create_movement(tenant.ledger(), input),
    )
}

pub async fn list_movements(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
) -> axum::response::Response {
    match services.ledger().movements(tenant.ledger()) {
        Ok(movements) => {
            let items = movements.iter().map(dto::movement_to_json).collect::<Vec<_>>();
            (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
        }
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn get_movement(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let movement_id = match parse_movement_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    movement_response(
        StatusCode::OK,
        services.ledger().movement(tenant.ledger(), movement_id),
    )
}

pub async fn revise_movement(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::ReviseMovementRequest>,
) -> axum::response::Response {
    let movement_id = match parse_movement_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let revision = match body.into_revision() {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    movement_response(
        StatusCode::OK,
        services
            .ledger()
            .revise_movement(tenant.ledger(), movement_id, revision),
    )
}

pub async fn delete_movement(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let movement_id = match parse_movement_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.ledger().delete_movement(tenant.ledger(), movement_id) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn accept_movement(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let movement_id = match parse_movement_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    movement_response(
        StatusCode::OK,
        services.ledger().accept_movement(tenant.ledger(), movement_id),
    )
}

pub async fn reject_movement(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let movement_id = match parse_movement_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    movement_response(
        StatusCode::OK,
        services.ledger().reject_movement(tenant.ledger(), movement_id),
    )
}
