use axum::{Json, extract::State};

use crate::common::AppState;
use crate::directory::LocationOption;

/// List picker options
///
/// Flat directories list `atms_id` values labelled by name; paired
/// directories list display names, which is what the location input accepts.
/// An empty list means the directory could not be loaded.
#[utoipa::path(
    get,
    path = "/api/locations",
    responses(
        (status = 200, description = "Location options", body = Vec<LocationOption>),
    ),
    tag = "locations"
)]
pub async fn list_locations(State(state): State<AppState>) -> Json<Vec<LocationOption>> {
    Json(state.directory().await.options())
}
