use axum::{routing::get, Router};

pub mod activity;
pub mod movements;
pub mod products;
pub mod sales;
pub mod system;

/// Router for all tenant-scoped endpoints.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .nest("/products", products::router())
        .nest("/sales", sales::router())
        .nest("/movements", movements::router())
        .nest("/activity", activity::router())
}
