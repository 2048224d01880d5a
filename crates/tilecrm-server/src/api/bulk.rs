//! Bulk promotion creation over a cascading scope filter.
//!
//! - `POST /api/v1/promotions/bulk`          - one promotion per (product, store) pair
//! - `POST /api/v1/promotions/scope-preview` - cascade options for a filter

use axum::{extract::State, http::StatusCode, Extension, Json};
use serde::{Deserialize, Serialize};
use tilecrm_core::{build_batch, PromotionForm, ScopeFilter, ScopeSelections};

use crate::middleware::RequestId;

use super::{map_db_error, validation_error, ApiError, ApiResponse, AppState};

#[derive(Debug, Deserialize)]
pub(super) struct BulkCreateRequest {
    #[serde(default)]
    pub form: PromotionForm,
    #[serde(default)]
    pub filter: ScopeSelections,
}

#[derive(Debug, Serialize)]
pub(super) struct BulkFailure {
    product_id: i64,
    store_slug: String,
    reason: String,
}

#[derive(Debug, Serialize)]
pub(super) struct BulkCreateSummary {
    requested: usize,
    created: usize,
    failed: usize,
    failures: Vec<BulkFailure>,
}

#[derive(Debug, Deserialize)]
pub(super) struct ScopePreviewRequest {
    #[serde(default)]
    pub filter: ScopeSelections,
}

#[derive(Debug, Serialize)]
pub(super) struct StoreOption {
    id: i64,
    name: String,
    slug: String,
    state: String,
    city: String,
    distributor_id: i64,
}

#[derive(Debug, Serialize)]
pub(super) struct ScopePreview {
    state_options: Vec<String>,
    city_options: Vec<String>,
    store_options: Vec<StoreOption>,
    resolved_store_count: usize,
    pair_count: usize,
}

fn failure_reason(error: &tilecrm_db::DbError) -> String {
    match error {
        tilecrm_db::DbError::NotFound => "product not found".to_owned(),
        other => other.to_string(),
    }
}

/// POST /api/v1/promotions/bulk - validate, expand to products × stores,
/// and insert each pair independently.
///
/// Per-pair failures are logged and counted; rows already written stay
/// written. Responds 201 when at least one promotion was created.
pub(super) async fn create_bulk(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<BulkCreateRequest>,
) -> Result<(StatusCode, Json<ApiResponse<BulkCreateSummary>>), ApiError> {
    let rid = &req_id.0;

    // Fail fast on the form before touching the catalog.
    body.form.validate().map_err(|e| validation_error(rid, &e))?;

    let catalog = tilecrm_db::load_catalog_directory(&state.pool)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;
    let filter = ScopeFilter::from_selections(&body.filter, &catalog)
        .map_err(|e| validation_error(rid, &e))?;
    let batch = build_batch(&body.form, &filter, &catalog).map_err(|e| validation_error(rid, &e))?;

    let requested = batch.len();
    let mut created = 0_usize;
    let mut failures = Vec::new();

    for promotion in &batch {
        match tilecrm_db::insert_promotion(&state.pool, promotion).await {
            Ok(_) => created += 1,
            Err(e) => {
                tracing::warn!(
                    product_id = promotion.product_id,
                    store = %promotion.scope_value,
                    error = %e,
                    "bulk promotion insert failed"
                );
                failures.push(BulkFailure {
                    product_id: promotion.product_id,
                    store_slug: promotion.scope_value.clone(),
                    reason: failure_reason(&e),
                });
            }
        }
    }

    tracing::info!(
        requested,
        created,
        failed = failures.len(),
        "bulk promotion creation finished"
    );

    let status = if created > 0 {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };

    Ok((
        status,
        Json(ApiResponse::new(
            BulkCreateSummary {
                requested,
                created,
                failed: failures.len(),
                failures,
            },
            req_id.0,
        )),
    ))
}

/// POST /api/v1/promotions/scope-preview - options for each facet under the
/// submitted selections.
pub(super) async fn preview_scope(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<ScopePreviewRequest>,
) -> Result<Json<ApiResponse<ScopePreview>>, ApiError> {
    let rid = &req_id.0;
    let catalog = tilecrm_db::load_catalog_directory(&state.pool)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;
    let filter = ScopeFilter::from_selections(&body.filter, &catalog)
        .map_err(|e| validation_error(rid, &e))?;

    let store_options = filter
        .store_options(&catalog)
        .into_iter()
        .map(|s| StoreOption {
            id: s.id,
            name: s.name.clone(),
            slug: s.slug.clone(),
            state: s.state.clone(),
            city: s.city.clone(),
            distributor_id: s.distributor_id,
        })
        .collect();

    let preview = ScopePreview {
        state_options: filter.state_options(&catalog),
        city_options: filter.city_options(&catalog),
        store_options,
        resolved_store_count: filter.resolve_stores(&catalog).len(),
        pair_count: filter.pair_count(&catalog),
    };

    Ok(Json(ApiResponse::new(preview, req_id.0)))
}
