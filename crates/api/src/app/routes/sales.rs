use std::sync::Arc;

use axum::{
    extract::{Extension, Path},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, patch, post},
    Json, Router,
};

use stockledger_infra::LedgerError;
use stockledger_sales::{Sale, SaleId};

use crate::app::{dto, errors};
use crate::app::services::AppServices;
use crate::context::TenantContext;

pub fn router() -> Router {
    Router::new()
        .route("/", post(create_sale).get(list_sales))
        .route("/:id", get(get_sale).delete(delete_sale))
        .route("/:id/lines", post(create_sale_line_item).put(replace_sale_lines))
        .route(
            "/:id/lines/:line_no",
            patch(update_sale_line_item).delete(delete_sale_line_item),
        )
        .route("/:id/complete", post(complete_sale))
        .route("/:id/cancel", post(cancel_sale))
        .route("/:id/payment", post(record_payment))
}

fn parse_sale_id(id: &str) -> Result<SaleId, axum::response::Response> {
    dto::parse_id(id, "sale").map(SaleId::new)
}

fn sale_response(status: StatusCode, result: Result<Sale, LedgerError>) -> axum::response::Response {
    match result {
        Ok(sale) => (status, Json(dto::sale_to_json(&sale))).into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn create_sale(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Json(body): Json<dto::CreateSaleRequest>,
) -> axum::response::Response {
    let input = match body.into_input() {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    sale_response(
        StatusCode::CREATED,
        services.ledger().create_sale(tenant.ledger(), input),
    )
}

pub async fn list_sales(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
) -> axum::response::Response {
    match services.ledger().sales(tenant.ledger()) {
        Ok(sales) => {
            let items = sales.iter().map(dto::sale_to_json).collect::<Vec<_>>();
            (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response()
        }
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn get_sale(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let sale_id = match parse_sale_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    sale_response(StatusCode::OK, services.ledger().sale(tenant.ledger(), sale_id))
}

pub async fn delete_sale(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let sale_id = match parse_sale_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    match services.ledger().delete_sale(tenant.ledger(), sale_id) {
        Ok(()) => StatusCode::NO_CONTENT.into_response(),
        Err(e) => errors::ledger_error_to_response(e),
    }
}

pub async fn create_sale_line_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::SaleLineRequest>,
) -> axum::response::Response {
    let sale_id = match parse_sale_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let draft = match body.into_draft() {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    sale_response(
        StatusCode::CREATED,
        services
            .ledger()
            .create_sale_line_item(tenant.ledger(), sale_id, draft),
    )
}

pub async fn replace_sale_lines(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::ReplaceSaleLinesRequest>,
) -> axum::response::Response {
    let sale_id = match parse_sale_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let drafts = match dto::into_drafts(body.lines) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    sale_response(
        StatusCode::OK,
        services
            .ledger()
            .replace_sale_lines(tenant.ledger(), sale_id, drafts),
    )
}

pub async fn update_sale_line_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path((id, line_no)): Path<(String, u32)>,
    Json(body): Json<dto::UpdateSaleLineRequest>,
) -> axum::response::Response {
    let sale_id = match parse_sale_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let patch = match body.into_patch() {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    sale_response(
        StatusCode::OK,
        services
            .ledger()
            .update_sale_line_item(tenant.ledger(), sale_id, line_no, patch),
    )
}

pub async fn delete_sale_line_item(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path((id, line_no)): Path<(String, u32)>,
) -> axum::response::Response {
    let sale_id = match parse_sale_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    sale_response(
        StatusCode::OK,
        services
            .ledger()
            .delete_sale_line_item(tenant.ledger(), sale_id, line_no),
    )
}

pub async fn complete_sale(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let sale_id = match parse_sale_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    sale_response(
        StatusCode::OK,
        services.ledger().complete_sale(tenant.ledger(), sale_id),
    )
}

pub async fn cancel_sale(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
) -> axum::response::Response {
    let sale_id = match parse_sale_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    sale_response(
        StatusCode::OK,
        services.ledger().cancel_sale(tenant.ledger(), sale_id),
    )
}

pub async fn record_payment(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Path(id): Path<String>,
    Json(body): Json<dto::RecordPaymentRequest>,
) -> axum::response::Response {
    let sale_id = match parse_sale_id(&id) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    sale_response(
        StatusCode::OK,
        services
            .ledger()
            .record_payment(tenant.ledger(), sale_id, body.into_input()),
    )
}
