//! Database operations for the `promotions` table.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use tilecrm_core::{NewPromotion, Promotion, ScopeType};

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `promotions` table.
///
/// `scope_type` is stored as text and parsed on conversion to [`Promotion`].
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PromotionRow {
    pub id: i64,
    pub name: String,
    pub product_id: i64,
    pub scope_type: String,
    /// Store slug.
    pub scope_value: String,
    pub promo_price: Decimal,
    pub promo_text: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub until_stock: bool,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<PromotionRow> for Promotion {
    type Error = DbError;

    fn try_from(row: PromotionRow) -> Result<Self, Self::Error> {
        Ok(Promotion {
            id: row.id,
            name: row.name,
            product_id: row.product_id,
            scope_type: row.scope_type.parse::<ScopeType>()?,
            scope_value: row.scope_value,
            promo_price: row.promo_price,
            promo_text: row.promo_text,
            start_date: row.start_date,
            end_date: row.end_date,
            until_stock: row.until_stock,
            active: row.active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// A promotion joined to the product it discounts, for CRM listings.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PromotionListRow {
    #[sqlx(flatten)]
    pub promotion: PromotionRow,
    pub product_name: String,
    pub product_sku: String,
}

/// Sparse update of a single promotion. `None` leaves the column unchanged;
/// an empty `promo_text` clears it.
#[derive(Debug, Clone, Default)]
pub struct PromotionUpdate {
    pub name: Option<String>,
    pub promo_price: Option<Decimal>,
    pub promo_text: Option<String>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub until_stock: Option<bool>,
}

impl PromotionUpdate {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.promo_price.is_none()
            && self.promo_text.is_none()
            && self.start_date.is_none()
            && self.end_date.is_none()
            && self.until_stock.is_none()
    }
}

const PROMOTION_COLUMNS: &str = "id, name, product_id, scope_type, scope_value, promo_price, \
     promo_text, start_date, end_date, until_stock, active, created_at, updated_at";

const QUALIFIED_COLUMNS: &str = "pr.id, pr.name, pr.product_id, pr.scope_type, \
     pr.scope_value, pr.promo_price, pr.promo_text, pr.start_date, pr.end_date, pr.until_stock, \
     pr.active, pr.created_at, pr.updated_at";

const LIST_COLUMNS: &str = "pr.id, pr.name, pr.product_id, pr.scope_type, pr.scope_value, \
     pr.promo_price, pr.promo_text, pr.start_date, pr.end_date, pr.until_stock, pr.active, \
     pr.created_at, pr.updated_at, p.name AS product_name, p.sku AS product_sku";

// ---------------------------------------------------------------------------
// writes
// ---------------------------------------------------------------------------

/// Inserts one promotion and returns the stored row.
///
/// No de-duplication is attempted; several rows for the same
/// (product, store) pair may coexist.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] when `product_id` references no product,
/// or [`DbError::Sqlx`] for any other failure.
pub async fn insert_promotion(
    pool: &PgPool,
    promotion: &NewPromotion,
) -> Result<PromotionRow, DbError> {
    let sql = format!(
        "INSERT INTO promotions \
             (name, product_id, scope_type, scope_value, promo_price, promo_text, \
              start_date, end_date, until_stock, active) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
         RETURNING {PROMOTION_COLUMNS}"
    );

    let result = sqlx::query_as::<_, PromotionRow>(&sql)
        .bind(&promotion.name)
        .bind(promotion.product_id)
        .bind(promotion.scope_type.as_str())
        .bind(&promotion.scope_value)
        .bind(promotion.promo_price)
        .bind(&promotion.promo_text)
        .bind(promotion.start_date)
        .bind(promotion.end_date)
        .bind(promotion.until_stock)
        .bind(promotion.active)
        .fetch_one(pool)
        .await
        .map_err(DbError::from);

    match result {
        Err(e) if e.is_foreign_key_violation() => Err(DbError::NotFound),
        other => other,
    }
}

/// Flips `active` on one promotion and returns the updated row. Calling it
/// twice restores the original state.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row has `id`, or [`DbError::Sqlx`]
/// if the update fails.
pub async fn toggle_promotion(pool: &PgPool, id: i64) -> Result<PromotionRow, DbError> {
    let sql = format!(
        "UPDATE promotions \
         SET active = NOT active, updated_at = NOW() \
         WHERE id = $1 \
         RETURNING {PROMOTION_COLUMNS}"
    );

    sqlx::query_as::<_, PromotionRow>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(DbError::NotFound)
}

/// Sets `active` on one promotion if it differs from the target.
///
/// Returns `true` when the row was written, `false` when it was already in
/// the target state.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn set_promotion_active(pool: &PgPool, id: i64, active: bool) -> Result<bool, DbError> {
    let result = sqlx::query(
        "UPDATE promotions \
         SET active = $2, updated_at = NOW() \
         WHERE id = $1 AND active <> $2",
    )
    .bind(id)
    .bind(active)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Applies a sparse update and returns the updated row.
///
/// The caller is responsible for validating the merged date window; the
/// table CHECK constraint rejects an inverted one as a last resort.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row has `id`, or [`DbError::Sqlx`]
/// if the update fails.
pub async fn update_promotion(
    pool: &PgPool,
    id: i64,
    update: &PromotionUpdate,
) -> Result<PromotionRow, DbError> {
    let sql = format!(
        "UPDATE promotions SET \
             name        = COALESCE($2, name), \
             promo_price = COALESCE($3, promo_price), \
             promo_text  = CASE WHEN $4::TEXT IS NULL THEN promo_text ELSE NULLIF($4, '') END, \
             start_date  = COALESCE($5, start_date), \
             end_date    = COALESCE($6, end_date), \
             until_stock = COALESCE($7, until_stock), \
             updated_at  = NOW() \
         WHERE id = $1 \
         RETURNING {PROMOTION_COLUMNS}"
    );

    sqlx::query_as::<_, PromotionRow>(&sql)
        .bind(id)
        .bind(&update.name)
        .bind(update.promo_price)
        .bind(&update.promo_text)
        .bind(update.start_date)
        .bind(update.end_date)
        .bind(update.until_stock)
        .fetch_optional(pool)
        .await?
        .ok_or(DbError::NotFound)
}

/// # Errors
///
/// Returns [`DbError::NotFound`] if no row has `id`, or [`DbError::Sqlx`]
/// if the delete fails.
pub async fn delete_promotion(pool: &PgPool, id: i64) -> Result<(), DbError> {
    let result = sqlx::query("DELETE FROM promotions WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// reads
// ---------------------------------------------------------------------------

/// # Errors
///
/// Returns [`DbError::NotFound`] if no row has `id`, or [`DbError::Sqlx`]
/// if the query fails.
pub async fn get_promotion(pool: &PgPool, id: i64) -> Result<PromotionRow, DbError> {
    let sql = format!("SELECT {PROMOTION_COLUMNS} FROM promotions WHERE id = $1");

    sqlx::query_as::<_, PromotionRow>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(DbError::NotFound)
}

/// Returns every promotion with its product, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_promotions(pool: &PgPool) -> Result<Vec<PromotionListRow>, DbError> {
    let sql = format!(
        "SELECT {LIST_COLUMNS} \
         FROM promotions pr \
         JOIN products p ON p.id = pr.product_id \
         ORDER BY pr.created_at DESC, pr.id DESC"
    );

    let rows = sqlx::query_as::<_, PromotionListRow>(&sql)
        .fetch_all(pool)
        .await?;

    Ok(rows)
}

/// Returns active promotions whose inclusive date window contains `today`,
/// newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_active_promotions(
    pool: &PgPool,
    today: NaiveDate,
) -> Result<Vec<PromotionListRow>, DbError> {
    let sql = format!(
        "SELECT {LIST_COLUMNS} \
         FROM promotions pr \
         JOIN products p ON p.id = pr.product_id \
         WHERE pr.active \
           AND pr.start_date <= $1 \
           AND pr.end_date >= $1 \
         ORDER BY pr.created_at DESC, pr.id DESC"
    );

    let rows = sqlx::query_as::<_, PromotionListRow>(&sql)
        .bind(today)
        .fetch_all(pool)
        .await?;

    Ok(rows)
}

/// Returns every promotion targeting `product_id` at `store_slug`,
/// regardless of state or window. Eligibility is decided by
/// [`tilecrm_core::resolve_price`].
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_promotions_for_product_store(
    pool: &PgPool,
    product_id: i64,
    store_slug: &str,
) -> Result<Vec<PromotionRow>, DbError> {
    let sql = format!(
        "SELECT {PROMOTION_COLUMNS} \
         FROM promotions \
         WHERE product_id = $1 AND scope_value = $2 \
         ORDER BY created_at DESC, id DESC"
    );

    let rows = sqlx::query_as::<_, PromotionRow>(&sql)
        .bind(product_id)
        .bind(store_slug)
        .fetch_all(pool)
        .await?;

    Ok(rows)
}

/// Returns promotions whose scope store belongs to `distributor_id`,
/// ordered by id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_promotions_for_distributor(
    pool: &PgPool,
    distributor_id: i64,
) -> Result<Vec<PromotionRow>, DbError> {
    let sql = format!(
        "SELECT {QUALIFIED_COLUMNS} \
         FROM promotions pr \
         JOIN stores s ON s.slug = pr.scope_value \
         WHERE s.distributor_id = $1 \
         ORDER BY pr.id"
    );

    let rows = sqlx::query_as::<_, PromotionRow>(&sql)
        .bind(distributor_id)
        .fetch_all(pool)
        .await?;

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(scope_type: &str) -> PromotionRow {
        let date = NaiveDate::from_ymd_opt(2026, 10, 19).unwrap();
        PromotionRow {
            id: 1,
            name: "Buen Fin".to_string(),
            product_id: 2,
            scope_type: scope_type.to_string(),
            scope_value: "centro".to_string(),
            promo_price: Decimal::new(350, 0),
            promo_text: None,
            start_date: date,
            end_date: date,
            until_stock: false,
            active: true,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn row_converts_to_promotion() {
        let promotion = Promotion::try_from(row("store")).expect("valid row");
        assert_eq!(promotion.scope_type, ScopeType::Store);
        assert_eq!(promotion.scope_value, "centro");
    }

    #[test]
    fn unknown_scope_type_is_a_decode_error() {
        let err = Promotion::try_from(row("global")).unwrap_err();
        assert!(matches!(err, DbError::Decode(_)));
    }

    #[test]
    fn empty_update_is_detected() {
        assert!(PromotionUpdate::default().is_empty());
        let update = PromotionUpdate {
            until_stock: Some(true),
            ..PromotionUpdate::default()
        };
        assert!(!update.is_empty());
    }
}
