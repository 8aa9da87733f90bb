use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    response::Json,
};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;

use crate::champions::{parse_update, BatchStatus, ChampionError, ChampionService};
use crate::error::ApiError;
use crate::models::{Champion, ChampionLookup};

// Query parameters for searching champions by name
#[derive(Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    name: Option<String>,
    /// Comma separated list of names
    #[serde(default)]
    names: Option<String>,
}

/// Parse a request body as JSON. An empty body reads as `null`.
fn read_json(body: &[u8]) -> Result<Value, String> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    serde_json::from_slice(body).map_err(|e| format!("Invalid JSON: {e}"))
}

// GET /champions/{champion_id} - Get one champion, `false` if it does not exist
pub async fn fetch_champion(
    State(service): State<ChampionService>,
    Path(champion_id): Path<String>,
) -> Result<Json<ChampionLookup>, ApiError> {
    tracing::debug!(champion_id = %champion_id, "Fetching champion");
    let champion = service.get_champion(&champion_id).await?;
    Ok(Json(champion.into()))
}

// GET /champions - List champions in display order
pub async fn fetch_champions(
    State(service): State<ChampionService>,
) -> Result<Json<Vec<Champion>>, ApiError> {
    let champions = service.get_champions().await?;
    Ok(Json(champions))
}

// GET /champions/search?name=Ahri or ?names=Ahri,Braum
pub async fn search_champions(
    State(service): State<ChampionService>,
    Query(params): Query<SearchQuery>,
) -> Result<Json<Vec<Champion>>, ApiError> {
    let champions = match (params.names, params.name) {
        (Some(names), _) => {
            let names: Vec<String> = names
                .split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_string)
                .collect();
            service.find_by_name_in(&names).await?
        }
        (None, Some(name)) => service.find_by_name(&name).await?,
        (None, None) => {
            return Err(ApiError::BadRequest(json!({
                "error": "A name or names query parameter is required"
            })));
        }
    };

    Ok(Json(champions))
}

// POST /champions - Create a champion from a non-empty JSON object
pub async fn create_champion(
    State(service): State<ChampionService>,
    body: Bytes,
) -> Result<Json<Champion>, ApiError> {
    let value = read_json(&body).map_err(|message| ApiError::BadRequest(json!({ "body": message })))?;

    if value.as_object().is_none_or(Map::is_empty) {
        return Err(ApiError::BadRequest(json!({ "body": "Post body must not be empty" })));
    }

    let input: Champion = serde_json::from_value(value)
        .map_err(|e| ApiError::BadRequest(json!({ "body": format!("Invalid champion: {e}") })))?;

    let champion = service.create_champion(input).await?;
    Ok(Json(champion))
}

// PUT /champions - Update one champion identified by the `uid` in the body
pub async fn update_one_champion(
    State(service): State<ChampionService>,
    body: Bytes,
) -> Result<Json<Champion>, ApiError> {
    let value = read_json(&body).map_err(|message| ApiError::UpdateFailed(ChampionError::InvalidBody(message)))?;
    let update = parse_update(value).map_err(ApiError::UpdateFailed)?;

    let champion = service
        .update_champion(update)
        .await
        .map_err(ApiError::UpdateFailed)?;

    Ok(Json(champion))
}

// PUT /champions/batch - Update many champions, reporting each entry's outcome
pub async fn update_multiple_champions(
    State(service): State<ChampionService>,
    body: Bytes,
) -> Result<Json<BTreeMap<String, BatchStatus>>, ApiError> {
    let entries = match read_json(&body) {
        Ok(Value::Array(entries)) if !entries.is_empty() => entries,
        _ => {
            return Err(ApiError::BadRequest(json!({
                "error": "At least one champion is required"
            })));
        }
    };

    let statuses = service.update_champions(entries).await;
    Ok(Json(statuses))
}
