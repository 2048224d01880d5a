use axum::{
    extract::{Query, State},
    Extension, Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::middleware::RequestId;

use super::{map_db_error, ApiError, ApiResponse, AppState};

#[derive(Debug, Serialize)]
pub(super) struct ProductItem {
    id: i64,
    sku: String,
    name: String,
    slug: Option<String>,
    category: Option<String>,
    base_price: Decimal,
    active: bool,
}

#[derive(Debug, Deserialize)]
pub(super) struct ProductQuery {
    pub category: Option<String>,
    pub search: Option<String>,
}

#[derive(Debug, Serialize)]
pub(super) struct DistributorItem {
    id: i64,
    name: String,
    slug: String,
    active: bool,
}

#[derive(Debug, Serialize)]
pub(super) struct StoreItem {
    id: i64,
    name: String,
    slug: String,
    state: String,
    city: String,
    active: bool,
    distributor_id: i64,
    distributor_name: String,
    distributor_slug: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct StoreQuery {
    pub state: Option<String>,
    pub distributor_id: Option<i64>,
    pub slug: Option<String>,
}

#[derive(Debug, Serialize)]
pub(super) struct StateItem {
    state: String,
    store_count: i64,
}

pub(super) async fn list_products(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<ProductQuery>,
) -> Result<Json<ApiResponse<Vec<ProductItem>>>, ApiError> {
    let rows = tilecrm_db::list_products(
        &state.pool,
        tilecrm_db::ProductListFilters {
            category: query.category.as_deref().filter(|c| !c.is_empty()),
            search: query.search.as_deref(),
        },
    )
    .await
    .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let data = rows
        .into_iter()
        .map(|row| ProductItem {
            id: row.id,
            sku: row.sku,
            name: row.name,
            slug: row.slug,
            category: row.category,
            base_price: row.base_price,
            active: row.active,
        })
        .collect();

    Ok(Json(ApiResponse::new(data, req_id.0)))
}

pub(super) async fn list_distributors(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<Vec<DistributorItem>>>, ApiError> {
    let rows = tilecrm_db::list_distributors(&state.pool)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let data = rows
        .into_iter()
        .map(|row| DistributorItem {
            id: row.id,
            name: row.name,
            slug: row.slug,
            active: row.active,
        })
        .collect();

    Ok(Json(ApiResponse::new(data, req_id.0)))
}

pub(super) async fn list_stores(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<StoreQuery>,
) -> Result<Json<ApiResponse<Vec<StoreItem>>>, ApiError> {
    let rows = tilecrm_db::list_stores(
        &state.pool,
        tilecrm_db::StoreListFilters {
            state: query.state.as_deref().filter(|s| !s.is_empty()),
            distributor_id: query.distributor_id,
            slug: query.slug.as_deref().filter(|s| !s.is_empty()),
        },
    )
    .await
    .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let data = rows
        .into_iter()
        .map(|row| StoreItem {
            id: row.id,
            name: row.name,
            slug: row.slug,
            state: row.state,
            city: row.city,
            active: row.active,
            distributor_id: row.distributor_id,
            distributor_name: row.distributor_name,
            distributor_slug: row.distributor_slug,
        })
        .collect();

    Ok(Json(ApiResponse::new(data, req_id.0)))
}

pub(super) async fn list_states(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<Vec<StateItem>>>, ApiError> {
    let rows = tilecrm_db::list_states(&state.pool)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let data = rows
        .into_iter()
        .map(|row| StateItem {
            state: row.state,
            store_count: row.store_count,
        })
        .collect();

    Ok(Json(ApiResponse::new(data, req_id.0)))
}
