//! Read queries for `products`, `distributors`, and `stores`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use tilecrm_core::{CatalogDirectory, Distributor, Product, Store};

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `products` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProductRow {
    pub id: i64,
    pub sku: String,
    pub name: String,
    pub slug: Option<String>,
    pub category: Option<String>,
    /// `NUMERIC(10,2) NOT NULL DEFAULT 0`; never written by promotions.
    pub base_price: Decimal,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Product {
            id: row.id,
            sku: row.sku,
            name: row.name,
            slug: row.slug,
            category: row.category,
            base_price: row.base_price,
        }
    }
}

/// Input filters for product listing.
#[derive(Debug, Clone, Default)]
pub struct ProductListFilters<'a> {
    /// Exact category match.
    pub category: Option<&'a str>,
    /// Case-insensitive substring over name and SKU.
    pub search: Option<&'a str>,
}

/// A row from the `distributors` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DistributorRow {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl From<DistributorRow> for Distributor {
    fn from(row: DistributorRow) -> Self {
        Distributor {
            id: row.id,
            name: row.name,
            slug: row.slug,
        }
    }
}

/// A store joined to its owning distributor.
///
/// `distributor_name` and `distributor_slug` come from the FK join.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StoreRow {
    pub id: i64,
    pub distributor_id: i64,
    pub name: String,
    pub slug: String,
    pub state: String,
    pub city: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub distributor_name: String,
    pub distributor_slug: String,
}

impl From<StoreRow> for Store {
    fn from(row: StoreRow) -> Self {
        Store {
            id: row.id,
            distributor_id: row.distributor_id,
            name: row.name,
            slug: row.slug,
            state: row.state,
            city: row.city,
        }
    }
}

/// Input filters for store listing.
#[derive(Debug, Clone, Default)]
pub struct StoreListFilters<'a> {
    pub state: Option<&'a str>,
    pub distributor_id: Option<i64>,
    pub slug: Option<&'a str>,
}

/// Distinct state with the number of stores located in it.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StateCountRow {
    pub state: String,
    pub store_count: i64,
}

const STORE_COLUMNS: &str = "s.id, s.distributor_id, s.name, s.slug, s.state, s.city, \
     s.active, s.created_at, d.name AS distributor_name, d.slug AS distributor_slug";

// ---------------------------------------------------------------------------
// products
// ---------------------------------------------------------------------------

/// Returns products ordered by name, optionally filtered by category and a
/// search term.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_products(
    pool: &PgPool,
    filters: ProductListFilters<'_>,
) -> Result<Vec<ProductRow>, DbError> {
    let search = filters
        .search
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| format!("%{}%", escape_like(s)));

    let rows = sqlx::query_as::<_, ProductRow>(
        "SELECT id, sku, name, slug, category, base_price, active, created_at \
         FROM products \
         WHERE ($1::TEXT IS NULL OR category = $1) \
           AND ($2::TEXT IS NULL OR name ILIKE $2 OR sku ILIKE $2) \
         ORDER BY name, id",
    )
    .bind(filters.category)
    .bind(search)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Returns the product with `id`.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row exists, or [`DbError::Sqlx`] if
/// the query fails.
pub async fn get_product(pool: &PgPool, id: i64) -> Result<ProductRow, DbError> {
    sqlx::query_as::<_, ProductRow>(
        "SELECT id, sku, name, slug, category, base_price, active, created_at \
         FROM products WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)
}

/// Returns the product whose SKU or slug equals `identifier`,
/// case-insensitively. SKU matches take precedence over slug matches.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no product matches, or [`DbError::Sqlx`]
/// if the query fails.
pub async fn get_product_by_identifier(
    pool: &PgPool,
    identifier: &str,
) -> Result<ProductRow, DbError> {
    sqlx::query_as::<_, ProductRow>(
        "SELECT id, sku, name, slug, category, base_price, active, created_at \
         FROM products \
         WHERE LOWER(sku) = LOWER($1) OR LOWER(slug) = LOWER($1) \
         ORDER BY (LOWER(sku) = LOWER($1)) DESC, id \
         LIMIT 1",
    )
    .bind(identifier.trim())
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)
}

// ---------------------------------------------------------------------------
// distributors
// ---------------------------------------------------------------------------

/// Returns all distributors ordered by name.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_distributors(pool: &PgPool) -> Result<Vec<DistributorRow>, DbError> {
    let rows = sqlx::query_as::<_, DistributorRow>(
        "SELECT id, name, slug, active, created_at \
         FROM distributors \
         ORDER BY name, id",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// # Errors
///
/// Returns [`DbError::NotFound`] if no row exists, or [`DbError::Sqlx`] if
/// the query fails.
pub async fn get_distributor_by_slug(pool: &PgPool, slug: &str) -> Result<DistributorRow, DbError> {
    sqlx::query_as::<_, DistributorRow>(
        "SELECT id, name, slug, active, created_at FROM distributors WHERE slug = $1",
    )
    .bind(slug)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)
}

// ---------------------------------------------------------------------------
// stores
// ---------------------------------------------------------------------------

/// Returns stores with their distributor, ordered by state, city, then name.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_stores(
    pool: &PgPool,
    filters: StoreListFilters<'_>,
) -> Result<Vec<StoreRow>, DbError> {
    let sql = format!(
        "SELECT {STORE_COLUMNS} \
         FROM stores s \
         JOIN distributors d ON d.id = s.distributor_id \
         WHERE ($1::TEXT IS NULL OR s.state = $1) \
           AND ($2::BIGINT IS NULL OR s.distributor_id = $2) \
           AND ($3::TEXT IS NULL OR s.slug = $3) \
         ORDER BY s.state, s.city, s.name, s.id"
    );

    let rows = sqlx::query_as::<_, StoreRow>(&sql)
        .bind(filters.state)
        .bind(filters.distributor_id)
        .bind(filters.slug)
        .fetch_all(pool)
        .await?;

    Ok(rows)
}

/// # Errors
///
/// Returns [`DbError::NotFound`] if no store has `slug`, or [`DbError::Sqlx`]
/// if the query fails.
pub async fn get_store_by_slug(pool: &PgPool, slug: &str) -> Result<StoreRow, DbError> {
    let sql = format!(
        "SELECT {STORE_COLUMNS} \
         FROM stores s \
         JOIN distributors d ON d.id = s.distributor_id \
         WHERE s.slug = $1"
    );

    sqlx::query_as::<_, StoreRow>(&sql)
        .bind(slug)
        .fetch_optional(pool)
        .await?
        .ok_or(DbError::NotFound)
}

/// Returns each distinct store state with its store count, ordered by state.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_states(pool: &PgPool) -> Result<Vec<StateCountRow>, DbError> {
    let rows = sqlx::query_as::<_, StateCountRow>(
        "SELECT state, COUNT(*) AS store_count \
         FROM stores \
         GROUP BY state \
         ORDER BY state",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Loads every distributor and store into an in-memory [`CatalogDirectory`].
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if either query fails.
pub async fn load_catalog_directory(pool: &PgPool) -> Result<CatalogDirectory, DbError> {
    let distributors = list_distributors(pool).await?;
    let stores = list_stores(pool, StoreListFilters::default()).await?;

    Ok(CatalogDirectory::new(
        distributors.into_iter().map(Distributor::from).collect(),
        stores.into_iter().map(Store::from).collect(),
    ))
}

/// Escapes `%`, `_` and `\` so user input matches literally inside `ILIKE`.
fn escape_like(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(ch);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_like_escapes_wildcards() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("alpes"), "alpes");
    }

    #[test]
    fn store_row_converts_without_distributor_columns() {
        let row = StoreRow {
            id: 7,
            distributor_id: 3,
            name: "Centro".to_string(),
            slug: "centro".to_string(),
            state: "Jalisco".to_string(),
            city: "Guadalajara".to_string(),
            active: true,
            created_at: Utc::now(),
            distributor_name: "Casa Piso".to_string(),
            distributor_slug: "casa-piso".to_string(),
        };
        let store = Store::from(row);
        assert_eq!(store.distributor_id, 3);
        assert_eq!(store.slug, "centro");
    }
}
