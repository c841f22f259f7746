use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use stockledger_core::DomainError;
use stockledger_infra::LedgerError;

pub fn ledger_error_to_response(err: LedgerError) -> axum::response::Response {
    match err {
        LedgerError::Domain(e) => domain_error_to_response(e),
        LedgerError::Concurrency(msg) => json_error(StatusCode::CONFLICT, "concurrency_conflict", msg),
        LedgerError::UniqueViolation(msg) => json_error(StatusCode::CONFLICT, "unique_violation", msg),
        LedgerError::Unavailable(msg) => {
            tracing::error!(error = %msg, "event store unavailable");
            json_error(StatusCode::SERVICE_UNAVAILABLE, "unavailable", msg)
        }
        LedgerError::Corrupt(msg) => {
            tracing::error!(error = %msg, "corrupt event stream");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, "corrupt_stream", msg)
        }
    }
}

pub fn domain_error_to_response(err: DomainError) -> axum::response::Response {
    let message = err.to_string();
    match err {
        DomainError::Validation(_) => json_error(StatusCode::BAD_REQUEST, "validation_error", message),
        DomainError::InvalidId(_) => json_error(StatusCode::BAD_REQUEST, "invalid_id", message),
        DomainError::InsufficientStock {
            product_id,
            available,
            requested,
        } => (
            StatusCode::BAD_REQUEST,
            axum::Json(json!({
                "error": "insufficient_stock",
                "message": message,
                "product_id": product_id.to_string(),
                "available": available,
                "requested": requested,
            })),
        )
            .into_response(),
        DomainError::InvalidStateTransition { .. } => {
            json_error(StatusCode::BAD_REQUEST, "invalid_state_transition", message)
        }
        DomainError::PermissionDenied(_) => json_error(StatusCode::FORBIDDEN, "permission_denied", message),
        DomainError::NotFound => json_error(StatusCode::NOT_FOUND, "not_found", message),
        DomainError::Conflict(_) => json_error(StatusCode::CONFLICT, "conflict", message),
        DomainError::InvariantViolation(_) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, "invariant_violation", message)
        }
    }
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

pub fn invalid_id(what: &str) -> axum::response::Response {
    json_error(StatusCode::BAD_REQUEST, "invalid_id", format!("invalid {what} id"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockledger_core::AggregateId;

    #[test]
    fn ledger_errors_map_to_their_statuses() {
        let cases = [
            (
                LedgerError::Domain(DomainError::InsufficientStock {
                    product_id: AggregateId::new(),
                    available: 1,
                    requested: 2,
                }),
                StatusCode::BAD_REQUEST,
            ),
            (
                LedgerError::Domain(DomainError::InvalidStateTransition {
                    entity: "movement",
                    from: "accepted".into(),
                    to: "accepted".into(),
                }),
                StatusCode::BAD_REQUEST,
            ),
            (
                LedgerError::Domain(DomainError::permission_denied("other tenant")),
                StatusCode::FORBIDDEN,
            ),
            (LedgerError::Domain(DomainError::NotFound), StatusCode::NOT_FOUND),
            (LedgerError::Concurrency("stale".into()), StatusCode::CONFLICT),
            (LedgerError::UniqueViolation("dup".into()), StatusCode::CONFLICT),
            (
                LedgerError::Domain(DomainError::invariant("closed")),
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (LedgerError::Unavailable("down".into()), StatusCode::SERVICE_UNAVAILABLE),
            (LedgerError::Corrupt("bad".into()), StatusCode::INTERNAL_SERVER_ERROR),
        ];

        for (err, status) in cases {
            assert_eq!(ledger_error_to_response(err.clone()).status(), status, "{err:?}");
        }
    }
}
