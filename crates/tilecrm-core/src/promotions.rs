//! Promotion records, the operator form, and the bulk combinator.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::catalog::CatalogDirectory;
use crate::scope::{Facet, ScopeFilter};
use crate::CoreError;

/// Targeting dimension of a promotion. Promotions are always materialized
/// per store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScopeType {
    Store,
}

impl ScopeType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ScopeType::Store => "store",
        }
    }
}

impl std::fmt::Display for ScopeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScopeType {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "store" => Ok(ScopeType::Store),
            other => Err(CoreError::InvalidScopeType(other.to_string())),
        }
    }
}

/// A persisted promotion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Promotion {
    pub id: i64,
    pub name: String,
    pub product_id: i64,
    pub scope_type: ScopeType,
    /// Slug of the targeted store.
    pub scope_value: String,
    pub promo_price: Decimal,
    pub promo_text: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// Informational "while supplies last" flag; never affects resolution.
    pub until_stock: bool,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A promotion ready to insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewPromotion {
    pub name: String,
    pub product_id: i64,
    pub scope_type: ScopeType,
    pub scope_value: String,
    pub promo_price: Decimal,
    pub promo_text: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub until_stock: bool,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("promotion name is required")]
    MissingName,
    #[error("promo_price is required")]
    MissingPrice,
    #[error("promo_price must be greater than zero, got {0}")]
    NonPositivePrice(Decimal),
    #[error("promo_price must have at most two decimal places, got {0}")]
    PriceTooPrecise(Decimal),
    #[error("promo_price must not exceed {max}, got {0}", max = MAX_PROMO_PRICE)]
    PriceTooLarge(Decimal),
    #[error("{field} is required")]
    MissingDate { field: &'static str },
    #[error("{field} must be a YYYY-MM-DD date, got '{value}'")]
    InvalidDate { field: &'static str, value: String },
    #[error("start_date {start} is after end_date {end}")]
    InvertedDateRange { start: NaiveDate, end: NaiveDate },
    #[error("at least one product must be selected")]
    NoProducts,
    #[error("no stores match the selected scope")]
    NoStores,
    #[error("{facet} selection '{value}' is not available under the coarser selections")]
    StaleSelection { facet: Facet, value: String },
    #[error("scope_value is required")]
    MissingScopeValue,
    #[error("unsupported scope_type '{0}'; only 'store' is supported")]
    UnsupportedScopeType(String),
}

/// Largest price a `NUMERIC(10,2)` column holds.
pub const MAX_PROMO_PRICE: Decimal = Decimal::from_parts(1_410_065_407, 2, 0, false, 2);

/// Accept a promo price only if it is stored exactly: positive, at most two
/// decimal places (trailing zeros ignored) and within [`MAX_PROMO_PRICE`].
///
/// # Errors
///
/// Returns the matching price [`ValidationError`].
pub fn check_promo_price(price: Decimal) -> Result<Decimal, ValidationError> {
    if price <= Decimal::ZERO {
        return Err(ValidationError::NonPositivePrice(price));
    }
    if price.normalize().scale() > 2 {
        return Err(ValidationError::PriceTooPrecise(price));
    }
    if price > MAX_PROMO_PRICE {
        return Err(ValidationError::PriceTooLarge(price));
    }
    Ok(price)
}

/// Operator-supplied promotion fields, as submitted.
///
/// Every field may arrive blank; [`PromotionForm::validate`] decides what is
/// acceptable.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromotionForm {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "deserialize_blank_decimal")]
    pub promo_price: Option<Decimal>,
    #[serde(default)]
    pub promo_text: Option<String>,
    #[serde(default)]
    pub start_date: Option<String>,
    #[serde(default)]
    pub end_date: Option<String>,
    #[serde(default)]
    pub until_stock: bool,
}

/// A [`PromotionForm`] that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedForm {
    pub name: String,
    pub promo_price: Decimal,
    pub promo_text: Option<String>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub until_stock: bool,
}

impl PromotionForm {
    /// Check required fields and the date window.
    ///
    /// # Errors
    ///
    /// Returns the first [`ValidationError`] found, checking name, price,
    /// start date, end date, then date ordering.
    pub fn validate(&self) -> Result<ValidatedForm, ValidationError> {
        let name = non_blank(self.name.as_deref()).ok_or(ValidationError::MissingName)?;

        let promo_price = self.promo_price.ok_or(ValidationError::MissingPrice)?;
        let promo_price = check_promo_price(promo_price)?;

        let start_date = parse_form_date("start_date", self.start_date.as_deref())?;
        let end_date = parse_form_date("end_date", self.end_date.as_deref())?;
        if start_date > end_date {
            return Err(ValidationError::InvertedDateRange {
                start: start_date,
                end: end_date,
            });
        }

        Ok(ValidatedForm {
            name: name.to_string(),
            promo_price,
            promo_text: non_blank(self.promo_text.as_deref()).map(str::to_string),
            start_date,
            end_date,
            until_stock: self.until_stock,
        })
    }
}

impl ValidatedForm {
    /// Materialize this form for one (product, store) pair.
    #[must_use]
    pub fn for_pair(&self, product_id: i64, store_slug: &str) -> NewPromotion {
        NewPromotion {
            name: self.name.clone(),
            product_id,
            scope_type: ScopeType::Store,
            scope_value: store_slug.to_string(),
            promo_price: self.promo_price,
            promo_text: self.promo_text.clone(),
            start_date: self.start_date,
            end_date: self.end_date,
            until_stock: self.until_stock,
            active: true,
        }
    }
}

/// Parse a form date field.
///
/// Accepts `YYYY-MM-DD`, or an RFC 3339 timestamp whose calendar date is
/// taken as-is.
///
/// # Errors
///
/// Returns [`ValidationError::MissingDate`] for a blank value and
/// [`ValidationError::InvalidDate`] for anything unparseable.
pub fn parse_form_date(field: &'static str, raw: Option<&str>) -> Result<NaiveDate, ValidationError> {
    let value = non_blank(raw).ok_or(ValidationError::MissingDate { field })?;

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .or_else(|_| DateTime::parse_from_rfc3339(value).map(|dt| dt.date_naive()))
        .map_err(|_| ValidationError::InvalidDate {
            field,
            value: value.to_string(),
        })
}

/// Validate the form and emit one [`NewPromotion`] per (product, store)
/// pair in scope.
///
/// The result has exactly `products × stores` entries, products in
/// ascending id order and stores in catalog order within each product. No
/// de-duplication against existing promotions is attempted.
///
/// # Errors
///
/// Returns a [`ValidationError`] when the form is incomplete, no product is
/// selected, or the scope resolves to no store. Nothing is emitted in that
/// case.
pub fn build_batch(
    form: &PromotionForm,
    filter: &ScopeFilter,
    catalog: &CatalogDirectory,
) -> Result<Vec<NewPromotion>, ValidationError> {
    let validated = form.validate()?;

    if filter.products().is_empty() {
        return Err(ValidationError::NoProducts);
    }

    let stores = filter.resolve_stores(catalog);
    if stores.is_empty() {
        return Err(ValidationError::NoStores);
    }

    let batch = filter
        .products()
        .iter()
        .flat_map(|&product_id| {
            stores
                .iter()
                .map(move |store| (product_id, store.slug.as_str()))
        })
        .map(|(product_id, slug)| validated.for_pair(product_id, slug))
        .collect();

    Ok(batch)
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Accepts a JSON number, a numeric string, a blank string or `null`.
fn deserialize_blank_decimal<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(Decimal),
        Text(String),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Raw::Number(value)) => Ok(Some(value)),
        Some(Raw::Text(text)) if text.trim().is_empty() => Ok(None),
        Some(Raw::Text(text)) => text
            .trim()
            .parse::<Decimal>()
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

#[cfg(test)]
#[path = "promotions_test.rs"]
mod tests;
