//! Buy command - purchase a product and finish the transaction

use anyhow::Result;
use iapkit_lib::backend::LaunchBehavior;
use iapkit_lib::{IapError, PurchaseRequest, PurchaseState};

use crate::{ui, OutcomeArg};

use super::DemoContext;

fn behavior(outcome: OutcomeArg) -> LaunchBehavior {
    match outcome {
        OutcomeArg::Complete => LaunchBehavior::Complete,
        OutcomeArg::Pending => LaunchBehavior::Pending,
        OutcomeArg::Cancel => LaunchBehavior::Cancel,
        OutcomeArg::Fail => LaunchBehavior::Fail(IapError::ServiceUnavailable(
            "simulated store failure".to_string(),
        )),
    }
}

#[tracing::instrument(skip(ctx))]
pub async fn run(
    ctx: &DemoContext,
    id: &str,
    subscription: bool,
    outcome: OutcomeArg,
    consume: bool,
) -> Result<()> {
    ctx.connect().await?;
    ctx.backend.script_launch(behavior(outcome));

    let request = if subscription {
        PurchaseRequest::subscription(id)
    } else {
        PurchaseRequest::in_app(id)
    };

    let purchases = match ctx.session.request_purchase(request).await {
        Ok(purchases) => purchases,
        Err(err) if err.is_user_cancelled() => {
            ui::info("Purchase cancelled");
            return Ok(());
        }
        Err(err) => {
            ui::error(&format!("Purchase failed: {}", err));
            return Err(err.into());
        }
    };

    ui::header("Purchase");
    for purchase in &purchases {
        ui::purchase(purchase);
        if purchase.state == PurchaseState::Pending {
            ui::warning("Payment pending; finish the transaction once it clears");
            continue;
        }
        ctx.session.finish_transaction(purchase, consume).await?;
        ui::success(if consume {
            "Purchase consumed"
        } else {
            "Purchase acknowledged"
        });
    }
    Ok(())
}
