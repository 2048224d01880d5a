//! Cascading scope filter used by the bulk promotion tool.
//!
//! Facets form a hierarchy: distributor → state → city → store. Every
//! mutation of a facet clears all strictly finer facets, so a filter value
//! can never hold, say, a state picked under a distributor that is no longer
//! selected. Products are selected independently of the store hierarchy.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::catalog::{CatalogDirectory, Store};
use crate::promotions::ValidationError;

/// A level of the store hierarchy, coarsest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Facet {
    Distributor,
    State,
    City,
    Store,
}

impl std::fmt::Display for Facet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Facet::Distributor => write!(f, "distributor"),
            Facet::State => write!(f, "state"),
            Facet::City => write!(f, "city"),
            Facet::Store => write!(f, "store"),
        }
    }
}

/// Raw selections as submitted by a client, before cascade checks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeSelections {
    #[serde(default)]
    pub products: Vec<i64>,
    #[serde(default)]
    pub distributors: Vec<String>,
    #[serde(default)]
    pub states: Vec<String>,
    #[serde(default)]
    pub cities: Vec<String>,
    #[serde(default)]
    pub stores: Vec<i64>,
}

/// Operator selection state for the five facets.
///
/// Fields are private; all changes go through methods that enforce the
/// cascade. Distributors, states and cities are selected by name, products
/// and stores by id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScopeFilter {
    products: BTreeSet<i64>,
    distributors: BTreeSet<String>,
    states: BTreeSet<String>,
    cities: BTreeSet<String>,
    stores: BTreeSet<i64>,
}

impl ScopeFilter {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a filter from submitted selections, applying facets coarse to
    /// fine.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::StaleSelection`] when a finer selection is
    /// not among the options left by the coarser selections (for example a
    /// store that does not belong to the selected distributor).
    pub fn from_selections(
        selections: &ScopeSelections,
        catalog: &CatalogDirectory,
    ) -> Result<Self, ValidationError> {
        let mut filter = Self::new();
        filter.set_products(selections.products.iter().copied());
        filter.set_distributors(selections.distributors.iter().cloned());

        let state_options = filter.state_options(catalog);
        if let Some(stale) = selections
            .states
            .iter()
            .find(|s| !state_options.contains(s))
        {
            return Err(ValidationError::StaleSelection {
                facet: Facet::State,
                value: stale.clone(),
            });
        }
        filter.set_states(selections.states.iter().cloned());

        let city_options = filter.city_options(catalog);
        if let Some(stale) = selections.cities.iter().find(|c| !city_options.contains(c)) {
            return Err(ValidationError::StaleSelection {
                facet: Facet::City,
                value: stale.clone(),
            });
        }
        filter.set_cities(selections.cities.iter().cloned());

        let store_ids: BTreeSet<i64> = filter.store_options(catalog).iter().map(|s| s.id).collect();
        if let Some(stale) = selections.stores.iter().find(|id| !store_ids.contains(id)) {
            return Err(ValidationError::StaleSelection {
                facet: Facet::Store,
                value: stale.to_string(),
            });
        }
        filter.set_stores(selections.stores.iter().copied());

        Ok(filter)
    }

    #[must_use]
    pub fn products(&self) -> &BTreeSet<i64> {
        &self.products
    }

    #[must_use]
    pub fn distributors(&self) -> &BTreeSet<String> {
        &self.distributors
    }

    #[must_use]
    pub fn states(&self) -> &BTreeSet<String> {
        &self.states
    }

    #[must_use]
    pub fn cities(&self) -> &BTreeSet<String> {
        &self.cities
    }

    #[must_use]
    pub fn stores(&self) -> &BTreeSet<i64> {
        &self.stores
    }

    // -- products -----------------------------------------------------------

    pub fn toggle_product(&mut self, id: i64) {
        toggle(&mut self.products, id);
    }

    pub fn set_products(&mut self, ids: impl IntoIterator<Item = i64>) {
        self.products = ids.into_iter().collect();
    }

    pub fn clear_products(&mut self) {
        self.products.clear();
    }

    // -- distributor --------------------------------------------------------

    pub fn toggle_distributor(&mut self, name: &str) {
        toggle(&mut self.distributors, name.to_string());
        self.clear_below(Facet::Distributor);
    }

    pub fn set_distributors(&mut self, names: impl IntoIterator<Item = String>) {
        self.distributors = names.into_iter().collect();
        self.clear_below(Facet::Distributor);
    }

    pub fn clear_distributors(&mut self) {
        self.distributors.clear();
        self.clear_below(Facet::Distributor);
    }

    // -- state --------------------------------------------------------------

    pub fn toggle_state(&mut self, name: &str) {
        toggle(&mut self.states, name.to_string());
        self.clear_below(Facet::State);
    }

    pub fn set_states(&mut self, names: impl IntoIterator<Item = String>) {
        self.states = names.into_iter().collect();
        self.clear_below(Facet::State);
    }

    pub fn clear_states(&mut self) {
        self.states.clear();
        self.clear_below(Facet::State);
    }

    // -- city ---------------------------------------------------------------

    pub fn toggle_city(&mut self, name: &str) {
        toggle(&mut self.cities, name.to_string());
        self.clear_below(Facet::City);
    }

    pub fn set_cities(&mut self, names: impl IntoIterator<Item = String>) {
        self.cities = names.into_iter().collect();
        self.clear_below(Facet::City);
    }

    pub fn clear_cities(&mut self) {
        self.cities.clear();
        self.clear_below(Facet::City);
    }

    // -- store --------------------------------------------------------------

    pub fn toggle_store(&mut self, id: i64) {
        toggle(&mut self.stores, id);
    }

    pub fn set_stores(&mut self, ids: impl IntoIterator<Item = i64>) {
        self.stores = ids.into_iter().collect();
    }

    pub fn clear_stores(&mut self) {
        self.stores.clear();
    }

    fn clear_below(&mut self, facet: Facet) {
        if facet < Facet::State {
            self.states.clear();
        }
        if facet < Facet::City {
            self.cities.clear();
        }
        if facet < Facet::Store {
            self.stores.clear();
        }
    }

    /// Whether `store` satisfies every selection strictly coarser than
    /// `facet`. An empty selection does not restrict.
    fn admits(&self, catalog: &CatalogDirectory, store: &Store, facet: Facet) -> bool {
        if facet > Facet::Distributor && !self.distributors.is_empty() {
            let owned = catalog
                .distributor_name_of(store)
                .is_some_and(|name| self.distributors.contains(name));
            if !owned {
                return false;
            }
        }
        if facet > Facet::State && !self.states.is_empty() && !self.states.contains(&store.state) {
            return false;
        }
        if facet > Facet::City && !self.cities.is_empty() && !self.cities.contains(&store.city) {
            return false;
        }
        true
    }

    /// Distinct states of the stores matching the distributor selection.
    #[must_use]
    pub fn state_options(&self, catalog: &CatalogDirectory) -> Vec<String> {
        catalog
            .stores()
            .iter()
            .filter(|s| self.admits(catalog, s, Facet::State))
            .map(|s| s.state.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Distinct cities of the stores matching the distributor and state
    /// selections.
    #[must_use]
    pub fn city_options(&self, catalog: &CatalogDirectory) -> Vec<String> {
        catalog
            .stores()
            .iter()
            .filter(|s| self.admits(catalog, s, Facet::City))
            .map(|s| s.city.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Stores matching the distributor, state and city selections.
    #[must_use]
    pub fn store_options<'a>(&self, catalog: &'a CatalogDirectory) -> Vec<&'a Store> {
        catalog
            .stores()
            .iter()
            .filter(|s| self.admits(catalog, s, Facet::Store))
            .collect()
    }

    /// The concrete stores in scope.
    ///
    /// Explicit store selections win; otherwise every store matching the
    /// coarser filters (every store in the directory when nothing is
    /// selected).
    #[must_use]
    pub fn resolve_stores<'a>(&self, catalog: &'a CatalogDirectory) -> Vec<&'a Store> {
        if self.stores.is_empty() {
            self.store_options(catalog)
        } else {
            catalog
                .stores()
                .iter()
                .filter(|s| self.stores.contains(&s.id))
                .collect()
        }
    }

    /// Number of promotions a bulk creation with this filter would emit.
    #[must_use]
    pub fn pair_count(&self, catalog: &CatalogDirectory) -> usize {
        pairs(self.products.len(), self.resolve_stores(catalog).len())
    }
}

/// Saturates instead of overflowing on absurd selections.
fn pairs(products: usize, stores: usize) -> usize {
    products.saturating_mul(stores)
}

fn toggle<T: Ord>(set: &mut BTreeSet<T>, value: T) {
    if !set.remove(&value) {
        set.insert(value);
    }
}

#[cfg(test)]
#[path = "scope_test.rs"]
mod tests;
