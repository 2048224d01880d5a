//! Planning for promotion lifecycle changes and distributor-level views.
//!
//! Promotions are tied to a distributor only through their scope store:
//! `scope_value` → `Store` (by slug) → `Store::distributor_id`.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::catalog::{CatalogDirectory, Distributor};
use crate::promotions::Promotion;

/// Which promotions a group toggle must write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupTogglePlan {
    pub distributor_id: i64,
    pub activate: bool,
    /// Promotions whose `active` flag differs from the target.
    pub to_change: Vec<i64>,
    /// Promotions already in the target state.
    pub unchanged: Vec<i64>,
}

/// Plan `toggle_group(distributor, activate)`.
///
/// Only promotions whose scope store is owned by `distributor_id` are
/// considered, and only those not already in the target state are listed
/// in `to_change`. Applying the plan twice is therefore a no-op the second
/// time.
///
/// The target is absolute: activating a group turns on every promotion of
/// the distributor, including ones that were paused one by one. No record
/// of the prior per-row state is kept.
#[must_use]
pub fn plan_group_toggle(
    catalog: &CatalogDirectory,
    promotions: &[Promotion],
    distributor_id: i64,
    activate: bool,
) -> GroupTogglePlan {
    let (to_change, unchanged): (Vec<&Promotion>, Vec<&Promotion>) = promotions
        .iter()
        .filter(|p| owner_id(catalog, &p.scope_value) == Some(distributor_id))
        .partition(|p| p.active != activate);

    GroupTogglePlan {
        distributor_id,
        activate,
        to_change: to_change.into_iter().map(|p| p.id).collect(),
        unchanged: unchanged.into_iter().map(|p| p.id).collect(),
    }
}

/// Items bucketed under the distributor that owns their scope store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistributorGroup<T> {
    /// `None` collects items whose store is unknown to the catalog.
    pub distributor: Option<Distributor>,
    pub items: Vec<T>,
}

/// Group items by owning distributor for the CRM grid.
///
/// Groups are ordered by distributor name; the unassigned bucket, if any,
/// comes last. Item order within a group is preserved.
pub fn group_by_distributor<T, F>(
    catalog: &CatalogDirectory,
    items: Vec<T>,
    scope_value: F,
) -> Vec<DistributorGroup<T>>
where
    F: Fn(&T) -> &str,
{
    let mut owned: BTreeMap<(String, i64), Vec<T>> = BTreeMap::new();
    let mut unassigned = Vec::new();

    for item in items {
        let owner = catalog
            .store_by_slug(scope_value(&item))
            .and_then(|store| catalog.distributor_of(store));
        match owner {
            Some(d) => owned.entry((d.name.clone(), d.id)).or_default().push(item),
            None => unassigned.push(item),
        }
    }

    let mut groups: Vec<DistributorGroup<T>> = owned
        .into_iter()
        .map(|((_, id), items)| DistributorGroup {
            distributor: catalog.distributor(id).cloned(),
            items,
        })
        .collect();

    if !unassigned.is_empty() {
        groups.push(DistributorGroup {
            distributor: None,
            items: unassigned,
        });
    }

    groups
}

fn owner_id(catalog: &CatalogDirectory, store_slug: &str) -> Option<i64> {
    catalog.store_by_slug(store_slug).map(|s| s.distributor_id)
}
