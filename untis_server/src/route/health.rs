use axum::Json;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct Health {
    ok: bool,
}

pub async fn handler() -> Json<Health> {
    Json(Health { ok: true })
}
