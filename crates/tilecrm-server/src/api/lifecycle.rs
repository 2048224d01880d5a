//! Promotion activation: single toggle and distributor-wide toggle.

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use tilecrm_core::{plan_group_toggle, Distributor, Promotion};

use crate::middleware::RequestId;

use super::{map_db_error, map_db_error_for, to_promotion, ApiError, ApiResponse, AppState};

#[derive(Debug, Deserialize)]
pub(super) struct GroupToggleRequest {
    pub active: bool,
}

#[derive(Debug, Serialize)]
pub(super) struct GroupToggleSummary {
    distributor: Distributor,
    active: bool,
    changed: usize,
    unchanged: usize,
    failed: usize,
    /// Distributor promotions as stored after the toggle was applied.
    promotions: Vec<Promotion>,
}

async fn load_distributor_promotions(
    pool: &sqlx::PgPool,
    distributor_id: i64,
    request_id: &str,
) -> Result<Vec<Promotion>, ApiError> {
    tilecrm_db::list_promotions_for_distributor(pool, distributor_id)
        .await
        .map_err(|e| map_db_error(request_id.to_owned(), &e))?
        .into_iter()
        .map(|row| to_promotion(request_id, row))
        .collect()
}

/// PUT /api/v1/promotions/:id/toggle - flip `active` on one promotion.
pub(super) async fn toggle_promotion(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<Promotion>>, ApiError> {
    let rid = &req_id.0;
    let row = tilecrm_db::toggle_promotion(&state.pool, id)
        .await
        .map_err(|e| map_db_error_for(rid.clone(), &e, &format!("promotion {id}")))?;
    let promotion = to_promotion(rid, row)?;

    tracing::info!(
        promotion_id = id,
        active = promotion.active,
        "promotion toggled"
    );

    Ok(Json(ApiResponse::new(promotion, req_id.0)))
}

/// PUT /api/v1/distributors/:distributor/promotions/active - set `active` on
/// every promotion whose store belongs to the distributor.
///
/// The distributor is matched by slug, then by name. Only promotions not
/// already in the target state are written; each write is independent.
pub(super) async fn toggle_distributor_promotions(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(key): Path<String>,
    Json(body): Json<GroupToggleRequest>,
) -> Result<Json<ApiResponse<GroupToggleSummary>>, ApiError> {
    let rid = &req_id.0;
    let catalog = tilecrm_db::load_catalog_directory(&state.pool)
        .await
        .map_err(|e| map_db_error(rid.clone(), &e))?;
    let distributor = catalog
        .find_distributor(&key)
        .cloned()
        .ok_or_else(|| {
            ApiError::new(
                rid,
                "not_found",
                format!("distributor '{key}' not found"),
            )
        })?;

    let promotions = load_distributor_promotions(&state.pool, distributor.id, rid).await?;
    let plan = plan_group_toggle(&catalog, &promotions, distributor.id, body.active);

    let mut changed = 0_usize;
    let mut unchanged = plan.unchanged.len();
    let mut failed = 0_usize;

    for id in &plan.to_change {
        match tilecrm_db::set_promotion_active(&state.pool, *id, body.active).await {
            Ok(true) => changed += 1,
            // Written concurrently by someone else.
            Ok(false) => unchanged += 1,
            Err(e) => {
                tracing::warn!(promotion_id = id, error = %e, "group toggle write failed");
                failed += 1;
            }
        }
    }

    tracing::info!(
        distributor = %distributor.slug,
        active = body.active,
        changed,
        unchanged,
        failed,
        "distributor promotions toggled"
    );

    let promotions = load_distributor_promotions(&state.pool, distributor.id, rid).await?;

    Ok(Json(ApiResponse::new(
        GroupToggleSummary {
            distributor,
            active: body.active,
            changed,
            unchanged,
            failed,
            promotions,
        },
        req_id.0,
    )))
}
