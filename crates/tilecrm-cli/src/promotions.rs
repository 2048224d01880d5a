//! Promotion command handlers for the CLI.
//!
//! These are called from `main` after the database pool is established.
//! Group toggles write each promotion independently; a failed write is
//! logged and counted rather than aborting the run.

use chrono::{NaiveDate, Utc};
use clap::{ArgGroup, Subcommand};
use tilecrm_core::{plan_group_toggle, resolve_price, Product, Promotion};

/// Sub-commands available under `promotions`.
#[derive(Debug, Subcommand)]
pub enum PromotionsCommands {
    /// List promotions, newest first
    List {
        /// Only promotions that are active and in their date window today
        #[arg(long)]
        active_only: bool,
    },
    /// Flip the active flag of one promotion
    Toggle {
        /// Promotion id
        id: i64,
    },
    /// Activate or deactivate every promotion of a distributor's stores
    #[command(group(
        ArgGroup::new("target")
            .required(true)
            .args(["activate", "deactivate"])
    ))]
    ToggleGroup {
        /// Distributor slug or name
        #[arg(long)]
        distributor: String,
        #[arg(long)]
        activate: bool,
        #[arg(long)]
        deactivate: bool,
    },
    /// Show the price a landing page would display today
    Resolve {
        /// Product SKU or slug
        #[arg(long)]
        product: String,
        /// Store slug
        #[arg(long)]
        store: Option<String>,
    },
}

pub(crate) async fn run(pool: &sqlx::PgPool, command: PromotionsCommands) -> anyhow::Result<()> {
    match command {
        PromotionsCommands::List { active_only } => run_list(pool, active_only).await,
        PromotionsCommands::Toggle { id } => run_toggle(pool, id).await,
        PromotionsCommands::ToggleGroup {
            distributor,
            activate,
            ..
        } => run_toggle_group(pool, &distributor, activate).await,
        PromotionsCommands::Resolve { product, store } => {
            run_resolve(pool, &product, store.as_deref()).await
        }
    }
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

fn fmt_active(active: bool) -> &'static str {
    if active {
        "on"
    } else {
        "off"
    }
}

/// Print promotions as a table.
///
/// # Errors
///
/// Returns an error if the database query fails.
async fn run_list(pool: &sqlx::PgPool, active_only: bool) -> anyhow::Result<()> {
    let rows = if active_only {
        tilecrm_db::list_active_promotions(pool, today()).await?
    } else {
        tilecrm_db::list_promotions(pool).await?
    };

    if rows.is_empty() {
        println!("no promotions found");
        return Ok(());
    }

    println!(
        "{:<7}{:<5}{:<16}{:<18}{:>10}  {:<23}NAME",
        "ID", "ON", "SKU", "STORE", "PRICE", "WINDOW"
    );
    for row in rows {
        let p = row.promotion;
        println!(
            "{:<7}{:<5}{:<16}{:<18}{:>10}  {} .. {}  {}",
            p.id,
            fmt_active(p.active),
            row.product_sku,
            p.scope_value,
            p.promo_price,
            p.start_date,
            p.end_date,
            p.name
        );
    }

    Ok(())
}

/// # Errors
///
/// Returns an error if the promotion does not exist or the update fails.
async fn run_toggle(pool: &sqlx::PgPool, id: i64) -> anyhow::Result<()> {
    let row = match tilecrm_db::toggle_promotion(pool, id).await {
        Ok(row) => row,
        Err(tilecrm_db::DbError::NotFound) => anyhow::bail!("promotion {id} not found"),
        Err(e) => return Err(e.into()),
    };

    tracing::info!(promotion_id = id, active = row.active, "promotion toggled");
    println!("promotion {id} is now {}", fmt_active(row.active));
    Ok(())
}

/// Apply a distributor-wide activation change.
///
/// # Errors
///
/// Returns an error if the distributor is unknown or the catalog cannot be
/// loaded. Per-promotion write failures are counted, not propagated.
async fn run_toggle_group(
    pool: &sqlx::PgPool,
    distributor_key: &str,
    activate: bool,
) -> anyhow::Result<()> {
    let catalog = tilecrm_db::load_catalog_directory(pool).await?;
    let distributor = catalog
        .find_distributor(distributor_key)
        .ok_or_else(|| anyhow::anyhow!("distributor '{distributor_key}' not found"))?;

    let promotions = tilecrm_db::list_promotions_for_distributor(pool, distributor.id)
        .await?
        .into_iter()
        .map(Promotion::try_from)
        .collect::<Result<Vec<_>, _>>()?;
    let plan = plan_group_toggle(&catalog, &promotions, distributor.id, activate);

    let mut changed = 0_usize;
    let mut failed = 0_usize;
    for id in &plan.to_change {
        match tilecrm_db::set_promotion_active(pool, *id, activate).await {
            Ok(true) => changed += 1,
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(promotion_id = id, error = %e, "group toggle write failed");
                failed += 1;
            }
        }
    }

    tracing::info!(
        distributor = %distributor.slug,
        activate,
        changed,
        failed,
        "distributor promotions toggled"
    );
    println!(
        "{}: {changed} changed, {} already {}, {failed} failed",
        distributor.name,
        plan.unchanged.len(),
        fmt_active(activate)
    );
    Ok(())
}

/// # Errors
///
/// Returns an error if the product does not exist or a query fails.
async fn run_resolve(
    pool: &sqlx::PgPool,
    identifier: &str,
    store: Option<&str>,
) -> anyhow::Result<()> {
    let product: Product = match tilecrm_db::get_product_by_identifier(pool, identifier).await {
        Ok(row) => row.into(),
        Err(tilecrm_db::DbError::NotFound) => anyhow::bail!("product '{identifier}' not found"),
        Err(e) => return Err(e.into()),
    };

    let store = store.map(str::trim).filter(|s| !s.is_empty());
    let candidates = match store {
        Some(slug) => tilecrm_db::list_promotions_for_product_store(pool, product.id, slug)
            .await?
            .into_iter()
            .map(Promotion::try_from)
            .collect::<Result<Vec<_>, _>>()?,
        None => Vec::new(),
    };

    let resolved = resolve_price(product.id, product.base_price, store, &candidates, today());

    println!("{} ({})", product.name, product.sku);
    println!("  store:  {}", store.unwrap_or("-"));
    println!("  price:  {}", resolved.price);
    match resolved.promotion_id {
        Some(id) => println!(
            "  promo:  #{id} {}",
            resolved.promo_text.as_deref().unwrap_or("")
        ),
        None => println!("  promo:  none (base price {})", product.base_price),
    }
    Ok(())
}
