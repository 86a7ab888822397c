//! Demo command - scripted walkthrough of a billing session

use anyhow::Result;
use iapkit_lib::backend::LaunchBehavior;
use iapkit_lib::{IapError, ProductKind, ProductQuery, Purchase, PurchaseRequest};
use std::sync::Arc;

use crate::ui;

use super::{product_ids, DemoContext};

#[tracing::instrument(skip(ctx))]
pub async fn run(ctx: &DemoContext) -> Result<()> {
    ui::header("1. Connect");
    ctx.connect().await?;
    ui::success("Connected to the simulated store");

    ctx.session
        .add_purchase_update_listener(Arc::new(|purchase: &Purchase| {
            tracing::info!(token = %purchase.token, "listener saw purchase update");
        }));
    ctx.session
        .add_purchase_error_listener(Arc::new(|err: &IapError| {
            tracing::info!(code = err.code() as i32, "listener saw purchase error");
        }));

    ui::header("2. Fetch products (twice, second from cache)");
    let ids = product_ids(&[
        "coins_100".to_string(),
        "remove_ads".to_string(),
        "pro_monthly".to_string(),
    ]);
    let products = ctx.session.fetch_products(&ids, ProductQuery::All).await?;
    for product in &products {
        ui::product(product);
    }
    let before = ctx.backend.product_queries().len();
    ctx.session.fetch_products(&ids, ProductQuery::All).await?;
    ui::key_value(
        "Backend queries on second fetch",
        &(ctx.backend.product_queries().len() - before).to_string(),
    );

    ui::header("3. Buy and finish twice");
    let purchases = ctx
        .session
        .request_purchase(PurchaseRequest::in_app("remove_ads"))
        .await?;
    for purchase in &purchases {
        ui::purchase(purchase);
        ctx.session.finish_transaction(purchase, false).await?;
        ctx.session.finish_transaction(purchase, false).await?;
    }
    ui::success("Second finish was a no-op");

    ui::header("4. Cancelled purchase");
    ctx.backend.script_launch(LaunchBehavior::Cancel);
    match ctx
        .session
        .request_purchase(PurchaseRequest::in_app("coins_100"))
        .await
    {
        Err(err) if err.is_user_cancelled() => ui::info("User cancelled (informational)"),
        Err(err) => return Err(err.into()),
        Ok(_) => ui::warning("Expected a cancellation"),
    }

    ui::header("5. Unsolicited purchase from another device");
    ctx.backend.emit_purchases(vec![Purchase::new(
        "other-device-token",
        "pro_monthly",
        ProductKind::Subs,
    )]);
    if let Some(result) = ctx.session.status().last_result {
        ui::key_value("Last result", &result.message);
    }

    ui::header("6. Restore and entitlements");
    let restored = ctx.session.restore_purchases().await?;
    for purchase in &restored {
        ui::purchase(purchase);
    }
    let active = ctx.session.has_active_subscriptions(None).await?;
    ui::key_value("Active subscription", &active.to_string());
    ui::key_value("Storefront", &ctx.session.get_storefront().await?);

    ui::status(&ctx.session.status());
    Ok(())
}
