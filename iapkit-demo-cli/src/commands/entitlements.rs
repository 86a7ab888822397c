//! Entitlements command - active subscriptions and storefront

use anyhow::Result;

use crate::ui;

use super::{product_ids, DemoContext};

#[tracing::instrument(skip(ctx))]
pub async fn run(ctx: &DemoContext, ids: &[String]) -> Result<()> {
    ctx.connect().await?;

    let ids = product_ids(ids);
    let filter = if ids.is_empty() { None } else { Some(&ids[..]) };
    let active = ctx.session.get_active_subscriptions(filter).await?;
    let storefront = ctx.session.get_storefront().await?;

    ui::header("Entitlements");
    ui::key_value("Storefront", &storefront);
    if active.is_empty() {
        ui::info("No active subscriptions");
    }
    for sub in &active {
        ui::key_value(
            sub.product_id.as_str(),
            &format!(
                "token {}{}",
                sub.purchase_token,
                if sub.auto_renewing { ", auto-renewing" } else { "" }
            ),
        );
    }
    Ok(())
}
