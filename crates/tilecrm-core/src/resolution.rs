//! Read-time price resolution for a (product, store) landing request.
//!
//! At most one promotion is effective per pair. When several rows are
//! eligible (duplicate bulk runs), the most recently created one wins, with
//! the larger id breaking exact timestamp ties.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::catalog::{CatalogDirectory, Store};
use crate::promotions::Promotion;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedPrice {
    pub price: Decimal,
    pub promo_text: Option<String>,
    pub is_promotional: bool,
    /// Id of the applied promotion, if any.
    pub promotion_id: Option<i64>,
}

impl ResolvedPrice {
    #[must_use]
    pub fn base(price: Decimal) -> Self {
        Self {
            price,
            promo_text: None,
            is_promotional: false,
            promotion_id: None,
        }
    }

    #[must_use]
    pub fn promotional(promotion: &Promotion) -> Self {
        Self {
            price: promotion.promo_price,
            promo_text: promotion.promo_text.clone(),
            is_promotional: true,
            promotion_id: Some(promotion.id),
        }
    }
}

/// Whether `promotion` applies to `product_id` at `store_slug` on `today`.
///
/// The date window is inclusive on both ends.
#[must_use]
pub fn is_eligible(
    promotion: &Promotion,
    product_id: i64,
    store_slug: &str,
    today: NaiveDate,
) -> bool {
    promotion.product_id == product_id
        && promotion.scope_value == store_slug
        && promotion.active
        && promotion.start_date <= today
        && today <= promotion.end_date
}

/// Resolve the effective price for a product at an optional store.
///
/// `candidates` may contain any promotions; ineligible rows are ignored.
/// Without a store context (absent or blank) the base price is returned.
#[must_use]
pub fn resolve_price(
    product_id: i64,
    base_price: Decimal,
    store_slug: Option<&str>,
    candidates: &[Promotion],
    today: NaiveDate,
) -> ResolvedPrice {
    let Some(store_slug) = store_slug.map(str::trim).filter(|s| !s.is_empty()) else {
        return ResolvedPrice::base(base_price);
    };

    candidates
        .iter()
        .filter(|p| is_eligible(p, product_id, store_slug, today))
        .max_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.id.cmp(&b.id))
        })
        .map_or_else(
            || ResolvedPrice::base(base_price),
            ResolvedPrice::promotional,
        )
}

/// Map the composite `tienda` landing parameter (`<distributor>-<store>`, as
/// printed into QR codes) back to a store slug. A bare store slug is also
/// accepted.
#[must_use]
pub fn store_slug_from_qr_param<'a>(param: &str, catalog: &'a CatalogDirectory) -> Option<&'a str> {
    let param = param.trim();
    if param.is_empty() {
        return None;
    }

    let composite_match = |store: &Store| {
        catalog.distributor_of(store).is_some_and(|d| {
            param
                .strip_prefix(d.slug.as_str())
                .and_then(|rest| rest.strip_prefix('-'))
                == Some(store.slug.as_str())
        })
    };

    catalog
        .stores()
        .iter()
        .find(|&s| composite_match(s))
        .or_else(|| catalog.store_by_slug(param))
        .map(|s| s.slug.as_str())
}
