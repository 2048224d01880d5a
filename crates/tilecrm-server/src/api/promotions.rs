//! Single-promotion CRUD and read views.
//!
//! - `GET    /api/v1/promotions`                - all promotions, newest first
//! - `POST   /api/v1/promotions`                - create one (product, store) promotion
//! - `GET    /api/v1/promotions/active`         - active and in-window today
//! - `GET    /api/v1/promotions/by-distributor` - grouped under owning distributor
//! - `GET|PATCH|DELETE /api/v1/promotions/:id`

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tilecrm_core::{
    check_promo_price, group_by_distributor, parse_form_date, DistributorGroup, Promotion,
    PromotionForm, ScopeType, ValidationError,
};

use crate::middleware::RequestId;

use super::{
    map_db_error, map_db_error_for, to_promotion, today, validation_error, ApiError, ApiResponse,
    AppState,
};

// ---------------------------------------------------------------------------
// Request / response bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub(super) struct PromotionItem {
    #[serde(flatten)]
    pub promotion: Promotion,
    pub product_name: String,
    pub product_sku: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct CreatePromotionRequest {
    #[serde(flatten)]
    pub form: PromotionForm,
    pub product_id: Option<i64>,
    pub scope_type: Option<String>,
    pub scope_value: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct UpdatePromotionRequest {
    pub name: Option<String>,
    pub promo_price: Option<Decimal>,
    /// An empty string clears the text.
    pub promo_text: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub until_stock: Option<bool>,
}

#[derive(Debug, Serialize)]
pub(super) struct DeletedPromotion {
    id: i64,
    deleted: bool,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn to_items(
    request_id: &str,
    rows: Vec<tilecrm_db::PromotionListRow>,
) -> Result<Vec<PromotionItem>, ApiError> {
    rows.into_iter()
        .map(|row| {
            Ok(PromotionItem {
                promotion: to_promotion(request_id, row.promotion)?,
                product_name: row.product_name,
                product_sku: row.product_sku,
            })
        })
        .collect()
}

fn parse_scope_type(raw: Option<&str>) -> Result<ScopeType, ValidationError> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        None => Ok(ScopeType::Store),
        Some(value) => value
            .parse::<ScopeType>()
            .map_err(|_| ValidationError::UnsupportedScopeType(value.to_string())),
    }
}

/// Validates a sparse update against the stored row and returns the db-level
/// update.
fn build_update(
    body: UpdatePromotionRequest,
    current: &Promotion,
) -> Result<tilecrm_db::PromotionUpdate, ValidationError> {
    let name = match body.name {
        Some(name) if name.trim().is_empty() => return Err(ValidationError::MissingName),
        Some(name) => Some(name.trim().to_owned()),
        None => None,
    };

    let promo_price = body.promo_price.map(check_promo_price).transpose()?;

    let start_date = body
        .start_date
        .as_deref()
        .map(|raw| parse_form_date("start_date", Some(raw)))
        .transpose()?;
    let end_date = body
        .end_date
        .as_deref()
        .map(|raw| parse_form_date("end_date", Some(raw)))
        .transpose()?;

    let start = start_date.unwrap_or(current.start_date);
    let end = end_date.unwrap_or(current.end_date);
    if start > end {
        return Err(ValidationError::InvertedDateRange { start, end });
    }

    Ok(tilecrm_db::PromotionUpdate {
        name,
        promo_price,
        promo_text: body.promo_text.map(|t| t.trim().to_owned()),
        start_date,
        end_date,
        until_stock: body.until_stock,
    })
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

pub(super) async fn list_promotions(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<Vec<PromotionItem>>>, ApiError> {
    let rows = tilecrm_db::list_promotions(&state.pool)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let data = to_items(&req_id.0, rows)?;
    Ok(Json(ApiResponse::new(data, req_id.0)))
}

pub(super) async fn list_active_promotions(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<Vec<PromotionItem>>>, ApiError> {
    let rows = tilecrm_db::list_active_promotions(&state.pool, today())
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let data = to_items(&req_id.0, rows)?;
    Ok(Json(ApiResponse::new(data, req_id.0)))
}

pub(super) async fn list_promotions_by_distributor(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<Vec<DistributorGroup<PromotionItem>>>>, ApiError> {
    let rid = &req_id.0;
    let catalog = tilecrm_db::load_catalog_directory(&state.pool)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;
    let rows = tilecrm_db::list_promotions(&state.pool)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;

    let items = to_items(rid, rows)?;
    let data = group_by_distributor(&catalog, items, |item| {
        item.promotion.scope_value.as_str()
    });

    Ok(Json(ApiResponse::new(data, req_id.0)))
}

/// POST /api/v1/promotions - create a single promotion for one store.
pub(super) async fn create_promotion(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<CreatePromotionRequest>,
) -> Result<(StatusCode, Json<ApiResponse<Promotion>>), ApiError> {
    let rid = &req_id.0;

    let validated = body.form.validate().map_err(|e| validation_error(rid, &e))?;
    let scope_type =
        parse_scope_type(body.scope_type.as_deref()).map_err(|e| validation_error(rid, &e))?;
    let scope_value = body
        .scope_value
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| validation_error(rid, &ValidationError::MissingScopeValue))?;
    let product_id = body
        .product_id
        .ok_or_else(|| ApiError::new(rid, "validation_error", "product_id is required"))?;

    let store = tilecrm_db::get_store_by_slug(&state.pool, scope_value)
        .await
        .map_err(|e| map_db_error_for(rid.clone(), &e, &format!("store '{scope_value}'")))?;

    let mut new_promotion = validated.for_pair(product_id, &store.slug);
    new_promotion.scope_type = scope_type;

    let row = tilecrm_db::insert_promotion(&state.pool, &new_promotion)
        .await
        .map_err(|e| map_db_error_for(rid.clone(), &e, &format!("product {product_id}")))?;
    let promotion = to_promotion(rid, row)?;

    tracing::info!(
        promotion_id = promotion.id,
        product_id,
        store = %promotion.scope_value,
        "promotion created"
    );

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse::new(promotion, req_id.0)),
    ))
}

pub(super) async fn get_promotion(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<Promotion>>, ApiError> {
    let rid = &req_id.0;
    let row = tilecrm_db::get_promotion(&state.pool, id)
        .await
        .map_err(|e| map_db_error_for(rid.clone(), &e, &format!("promotion {id}")))?;
    let promotion = to_promotion(rid, row)?;

    Ok(Json(ApiResponse::new(promotion, req_id.0)))
}

/// PATCH /api/v1/promotions/:id - sparse update of label, price, text,
/// window and `until_stock`.
pub(super) async fn update_promotion(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<i64>,
    Json(body): Json<UpdatePromotionRequest>,
) -> Result<Json<ApiResponse<Promotion>>, ApiError> {
    let rid = &req_id.0;
    let current = tilecrm_db::get_promotion(&state.pool, id)
        .await
        .map_err(|e| map_db_error_for(rid.clone(), &e, &format!("promotion {id}")))?;
    let current = to_promotion(rid, current)?;

    let update = build_update(body, &current).map_err(|e| validation_error(rid, &e))?;
    if update.is_empty() {
        return Err(ApiError::new(
            rid,
            "validation_error",
            "no updatable fields supplied",
        ));
    }

    let row = tilecrm_db::update_promotion(&state.pool, id, &update)
        .await
        .map_err(|e| map_db_error_for(rid.clone(), &e, &format!("promotion {id}")))?;
    let promotion = to_promotion(rid, row)?;

    Ok(Json(ApiResponse::new(promotion, req_id.0)))
}

pub(super) async fn delete_promotion(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<DeletedPromotion>>, ApiError> {
    let rid = &req_id.0;
    tilecrm_db::delete_promotion(&state.pool, id)
        .await
        .map_err(|e| map_db_error_for(rid.clone(), &e, &format!("promotion {id}")))?;

    tracing::info!(promotion_id = id, "promotion deleted");

    Ok(Json(ApiResponse::new(
        DeletedPromotion { id, deleted: true },
        req_id.0,
    )))
}
