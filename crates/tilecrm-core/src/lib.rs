pub mod app_config;
pub mod catalog;
pub mod config;
pub mod lifecycle;
pub mod promotions;
pub mod resolution;
pub mod scope;

use thiserror::Error;

pub use app_config::{AppConfig, Environment};
pub use catalog::{CatalogDirectory, Distributor, Product, Store};
pub use config::{load_app_config, load_app_config_from_env};
pub use lifecycle::{group_by_distributor, plan_group_toggle, DistributorGroup, GroupTogglePlan};
pub use promotions::{
    build_batch, check_promo_price, parse_form_date, NewPromotion, Promotion, PromotionForm,
    ScopeType, ValidatedForm, ValidationError, MAX_PROMO_PRICE,
};
pub use resolution::{is_eligible, resolve_price, store_slug_from_qr_param, ResolvedPrice};
pub use scope::{Facet, ScopeFilter, ScopeSelections};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid scope type: {0}")]
    InvalidScopeType(String),
}
