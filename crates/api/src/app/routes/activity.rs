use std::sync::Arc;

use axum::{
    extract::{Extension, Query},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use stockledger_infra::event_store::Pagination;

use crate::app::{dto, errors};
use crate::app::services::AppServices;
use crate::context::TenantContext;

pub fn router() -> Router {
    Router::new().route("/", get(list_activity))
}

/// The tenant's ledger journal, newest first.
pub async fn list_activity(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(tenant): Extension<TenantContext>,
    Query(query): Query<dto::ActivityQuery>,
) -> axum::response::Response {
    let filter = match query.filter() {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let pagination = Pagination::new(query.limit, query.offset);

    match services.ledger().activity(tenant.ledger(), &filter, pagination) {
        Ok(page) => {
            let items = page.events.iter().map(dto::event_to_json).collect::<Vec<_>>();
            (
                StatusCode::OK,
                Json(serde_json::json!({
                    "items": items,
                    "total": page.total,
                    "limit": page.pagination.limit,
                    "offset": page.pagination.offset,
                    "has_more": page.has_more,
                })),
            )
                .into_response()
        }
        Err(e) => errors::ledger_error_to_response(e),
    }
}
