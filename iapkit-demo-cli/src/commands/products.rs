//! Products command - fetch product metadata

use anyhow::Result;

use crate::{ui, KindArg};

use super::{product_ids, DemoContext};

#[tracing::instrument(skip(ctx))]
pub async fn run(ctx: &DemoContext, ids: &[String], kind: KindArg) -> Result<()> {
    ctx.connect().await?;

    let ids = product_ids(ids);
    let products = ctx.session.fetch_products(&ids, kind.into()).await?;

    ui::header("Products");
    if products.is_empty() {
        ui::warning("No matching products in the catalog");
    }
    for product in &products {
        ui::product(product);
    }

    let missing: Vec<&str> = ids
        .iter()
        .filter(|id| !products.iter().any(|p| &p.id == *id))
        .map(|id| id.as_str())
        .collect();
    if !missing.is_empty() {
        ui::info(&format!("Not found: {}", missing.join(", ")));
    }
    Ok(())
}
