//! Read-only catalog view: products, distributors and the stores they own.
//!
//! Store ownership is always derived from `Store::distributor_id`, never from
//! a distributor name carried alongside the store.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub sku: String,
    pub name: String,
    pub slug: Option<String>,
    pub category: Option<String>,
    pub base_price: Decimal,
}

impl Product {
    /// Returns `true` if `identifier` names this product by SKU or slug,
    /// compared case-insensitively.
    #[must_use]
    pub fn matches_identifier(&self, identifier: &str) -> bool {
        self.sku.eq_ignore_ascii_case(identifier)
            || self
                .slug
                .as_deref()
                .is_some_and(|s| s.eq_ignore_ascii_case(identifier))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Distributor {
    pub id: i64,
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Store {
    pub id: i64,
    pub distributor_id: i64,
    pub name: String,
    pub slug: String,
    pub state: String,
    pub city: String,
}

/// In-memory snapshot of distributors and stores used by the scope filter,
/// the group toggle and the distributor grouping views.
#[derive(Debug, Clone, Default)]
pub struct CatalogDirectory {
    distributors: Vec<Distributor>,
    stores: Vec<Store>,
}

impl CatalogDirectory {
    #[must_use]
    pub fn new(distributors: Vec<Distributor>, stores: Vec<Store>) -> Self {
        Self {
            distributors,
            stores,
        }
    }

    #[must_use]
    pub fn distributors(&self) -> &[Distributor] {
        &self.distributors
    }

    #[must_use]
    pub fn stores(&self) -> &[Store] {
        &self.stores
    }

    #[must_use]
    pub fn distributor(&self, id: i64) -> Option<&Distributor> {
        self.distributors.iter().find(|d| d.id == id)
    }

    /// The distributor owning `store`, if it is present in this snapshot.
    #[must_use]
    pub fn distributor_of(&self, store: &Store) -> Option<&Distributor> {
        self.distributor(store.distributor_id)
    }

    pub fn stores_of(&self, distributor_id: i64) -> impl Iterator<Item = &Store> {
        self.stores
            .iter()
            .filter(move |s| s.distributor_id == distributor_id)
    }

    #[must_use]
    pub fn store(&self, id: i64) -> Option<&Store> {
        self.stores.iter().find(|s| s.id == id)
    }

    #[must_use]
    pub fn store_by_slug(&self, slug: &str) -> Option<&Store> {
        self.stores.iter().find(|s| s.slug == slug)
    }

    /// Look up a distributor by exact slug, falling back to a
    /// case-insensitive name match.
    #[must_use]
    pub fn find_distributor(&self, key: &str) -> Option<&Distributor> {
        let key = key.trim();
        self.distributors
            .iter()
            .find(|d| d.slug == key)
            .or_else(|| {
                self.distributors
                    .iter()
                    .find(|d| d.name.eq_ignore_ascii_case(key))
            })
    }

    /// Name of the distributor owning `store`, or `None` when the owner is
    /// missing from the snapshot.
    #[must_use]
    pub fn distributor_name_of(&self, store: &Store) -> Option<&str> {
        self.distributor_of(store).map(|d| d.name.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directory() -> CatalogDirectory {
        CatalogDirectory::new(
            vec![
                Distributor {
                    id: 1,
                    name: "Acabados del Norte".to_string(),
                    slug: "acabados-norte".to_string(),
                },
                Distributor {
                    id: 2,
                    name: "Pisos Sur".to_string(),
                    slug: "pisos-sur".to_string(),
                },
            ],
            vec![
                Store {
                    id: 10,
                    distributor_id: 1,
                    name: "Monterrey Centro".to_string(),
                    slug: "mty-centro".to_string(),
                    state: "Nuevo León".to_string(),
                    city: "Monterrey".to_string(),
                },
                Store {
                    id: 20,
                    distributor_id: 2,
                    name: "Mérida Norte".to_string(),
                    slug: "merida-norte".to_string(),
                    state: "Yucatán".to_string(),
                    city: "Mérida".to_string(),
                },
            ],
        )
    }

    #[test]
    fn stores_of_follows_distributor_id() {
        let dir = directory();
        let slugs: Vec<&str> = dir.stores_of(1).map(|s| s.slug.as_str()).collect();
        assert_eq!(slugs, vec!["mty-centro"]);
    }

    #[test]
    fn distributor_of_resolves_owner() {
        let dir = directory();
        let store = dir.store_by_slug("merida-norte").expect("store");
        assert_eq!(dir.distributor_name_of(store), Some("Pisos Sur"));
    }

    #[test]
    fn find_distributor_by_slug_or_name() {
        let dir = directory();
        assert_eq!(dir.find_distributor("pisos-sur").map(|d| d.id), Some(2));
        assert_eq!(
            dir.find_distributor("acabados del norte").map(|d| d.id),
            Some(1)
        );
        assert!(dir.find_distributor("unknown").is_none());
    }

    #[test]
    fn product_matches_sku_or_slug_case_insensitively() {
        let product = Product {
            id: 1,
            sku: "CES-ALPES-60".to_string(),
            name: "Alpes".to_string(),
            slug: Some("alpes-gris".to_string()),
            category: Some("Porcelánico".to_string()),
            base_price: Decimal::new(500, 0),
        };
        assert!(product.matches_identifier("ces-alpes-60"));
        assert!(product.matches_identifier("ALPES-GRIS"));
        assert!(!product.matches_identifier("alpes"));
    }
}
