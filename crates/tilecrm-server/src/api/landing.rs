//! Public product landing endpoint with per-store price resolution.

use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use tilecrm_core::{resolve_price, store_slug_from_qr_param, Product, ResolvedPrice};

use crate::middleware::RequestId;

use super::{
    map_db_error, map_db_error_for, to_promotion, today, ApiError, ApiResponse, AppState,
};

#[derive(Debug, Deserialize)]
pub(super) struct LandingQuery {
    /// Store slug.
    pub store: Option<String>,
    /// QR-code form: `<distributor_slug>-<store_slug>`.
    pub tienda: Option<String>,
}

#[derive(Debug, Serialize)]
pub(super) struct LandingData {
    product: Product,
    store_slug: Option<String>,
    #[serde(flatten)]
    resolved: ResolvedPrice,
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// GET /api/v1/landing/:identifier - product by SKU or slug with the price
/// effective today at the requested store.
pub(super) async fn get_landing(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(identifier): Path<String>,
    Query(query): Query<LandingQuery>,
) -> Result<Json<ApiResponse<LandingData>>, ApiError> {
    let rid = &req_id.0;
    let product: Product = tilecrm_db::get_product_by_identifier(&state.pool, &identifier)
        .await
        .map_err(|e| map_db_error_for(rid.clone(), &e, &format!("product '{identifier}'")))?
        .into();

    let store_slug = if let Some(store) = non_blank(query.store.as_deref()) {
        Some(store.to_owned())
    } else if let Some(tienda) = non_blank(query.tienda.as_deref()) {
        let catalog = tilecrm_db::load_catalog_directory(&state.pool)
            .await
            .map_err(|e| map_db_error(rid.clone(), &e))?;
        let slug = store_slug_from_qr_param(tienda, &catalog).map(ToOwned::to_owned);
        if slug.is_none() {
            tracing::debug!(tienda, "landing store parameter matched no store");
        }
        slug
    } else {
        None
    };

    let candidates = match store_slug.as_deref() {
        Some(slug) => tilecrm_db::list_promotions_for_product_store(&state.pool, product.id, slug)
            .await
            .map_err(|e| map_db_error(rid.clone(), &e))?
            .into_iter()
            .map(|row| to_promotion(rid, row))
            .collect::<Result<Vec<_>, _>>()?,
        None => Vec::new(),
    };

    let resolved = resolve_price(
        product.id,
        product.base_price,
        store_slug.as_deref(),
        &candidates,
        today(),
    );

    Ok(Json(ApiResponse::new(
        LandingData {
            product,
            store_slug,
            resolved,
        },
        req_id.0,
    )))
}
