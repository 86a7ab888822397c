//! Restore command - list owned purchases

use anyhow::Result;

use crate::ui;

use super::DemoContext;

#[tracing::instrument(skip(ctx))]
pub async fn run(ctx: &DemoContext) -> Result<()> {
    ctx.connect().await?;

    let purchases = ctx.session.restore_purchases().await?;
    ui::header("Owned Purchases");
    if purchases.is_empty() {
        ui::info("Nothing to restore");
    }
    for purchase in &purchases {
        ui::purchase(purchase);
    }
    ui::success(&format!("Restored {} purchases", purchases.len()));
    Ok(())
}
