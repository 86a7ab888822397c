//! Concurrency stress tests for BillingSession
//!
//! These tests verify the session's guarantees under contention.

mod common;

#[cfg(test)]
mod concurrency_tests {
    use super::common::{ids, TestContext};
    use iapkit_lib::backend::{BackendCall, LaunchBehavior};
    use iapkit_lib::{IapError, ProductKind, ProductQuery, Purchase, PurchaseRequest};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::task::JoinSet;

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_finish_same_token() {
        let ctx = TestContext::connected().await;
        let purchase = Purchase::new("tok-race", "sku.a", ProductKind::InApp);
        ctx.backend.emit_purchases(vec![purchase.clone()]);

        let mut tasks = JoinSet::new();
        for _ in 0..50 {
            let session = ctx.session.clone();
            let purchase = purchase.clone();
            tasks.spawn(async move { session.finish_transaction(&purchase, false).await });
        }

        let mut ok = 0;
        while let Some(result) = tasks.join_next().await {
            result.unwrap().unwrap();
            ok += 1;
        }

        assert_eq!(ok, 50);
        assert_eq!(
            ctx.backend
                .count_calls(|c| matches!(c, BackendCall::Acknowledge(_))),
            1,
            "Exactly one finish should reach the backend"
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_finish_distinct_tokens() {
        let ctx = TestContext::connected().await;
        let purchases: Vec<Purchase> = (0..20)
            .map(|i| Purchase::new(format!("tok-{}", i), "sku.b", ProductKind::InApp))
            .collect();
        ctx.backend.emit_purchases(purchases.clone());

        let mut tasks = JoinSet::new();
        for purchase in purchases {
            let session = ctx.session.clone();
            tasks.spawn(async move { session.finish_transaction(&purchase, true).await });
        }
        while let Some(result) = tasks.join_next().await {
            result.unwrap().unwrap();
        }

        assert_eq!(
            ctx.backend
                .count_calls(|c| matches!(c, BackendCall::Consume(_))),
            20
        );
        assert!(ctx.backend.owned().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_requests_open_one_slot() {
        let ctx = TestContext::connected().await;
        ctx.session
            .fetch_products(&ids(&["sku.a"]), ProductQuery::InApp)
            .await
            .unwrap();
        for _ in 0..10 {
            ctx.backend.script_launch(LaunchBehavior::Defer);
        }

        let mut tasks = JoinSet::new();
        for _ in 0..10 {
            let session = ctx.session.clone();
            tasks.spawn(async move {
                session
                    .request_purchase(PurchaseRequest::in_app("sku.a"))
                    .await
            });
        }

        // Every request but the one holding the slot is rejected.
        let mut rejected = 0;
        while rejected < 9 {
            let result = tasks.join_next().await.unwrap().unwrap();
            assert_eq!(result.unwrap_err(), IapError::PurchaseInProgress);
            rejected += 1;
        }

        while !ctx.backend.has_deferred() {
            tokio::task::yield_now().await;
        }
        assert!(ctx.session.status().is_purchasing(&"sku.a".into()));
        assert!(ctx.backend.complete_deferred(LaunchBehavior::Complete));

        let winner = tasks.join_next().await.unwrap().unwrap();
        assert_eq!(winner.unwrap().len(), 1);
        assert!(tasks.join_next().await.is_none());
        assert!(ctx.session.status().purchasing.is_empty());
        assert_eq!(
            ctx.backend
                .count_calls(|c| matches!(c, BackendCall::LaunchFlow { .. })),
            1
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_listeners_change_during_pushes() {
        let ctx = TestContext::connected().await;
        let delivered = Arc::new(AtomicUsize::new(0));
        let mut tasks = JoinSet::new();

        for i in 0..20 {
            let session = ctx.session.clone();
            let backend = ctx.backend.clone();
            let delivered = delivered.clone();
            tasks.spawn(async move {
                let listener: Arc<dyn iapkit_lib::listeners::PurchaseUpdateListener> =
                    Arc::new(move |_: &Purchase| {
                        delivered.fetch_add(1, Ordering::SeqCst);
                    });
                session.add_purchase_update_listener(listener.clone());
                backend.emit(Ok(vec![Purchase::new(
                    format!("push-{}", i),
                    "sku.c",
                    ProductKind::InApp,
                )]));
                session.remove_purchase_update_listener(&listener)
            });
        }

        while let Some(removed) = tasks.join_next().await {
            assert!(removed.unwrap());
        }
        // Each push reached at least the listener added just before it.
        assert!(delivered.load(Ordering::SeqCst) >= 20);
    }
}
