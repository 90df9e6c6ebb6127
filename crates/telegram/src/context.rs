//! Ambient delivery context.
//!
//! A `DeliveryContext` rides along every asynchronous continuation of a
//! Telegram delivery via a tokio task-local, so diagnostics deep inside
//! the HTTP stack can tag events without threading the value through
//! every signature. Nested scopes shadow the outer one; concurrent tasks
//! started from the same scope each observe an independent copy.

use std::future::Future;

use serde::Serialize;

/// Request-scoped correlation identifiers for one delivery.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DeliveryContext {
    pub delivery_id: String,
    pub account_id: Option<String>,
    pub chat_id: Option<String>,
    pub operation: Option<String>,
}

/// Partial overlay for [`with_partial`]; unset fields inherit.
#[derive(Debug, Clone, Default)]
pub struct PartialContext {
    pub delivery_id: Option<String>,
    pub account_id: Option<String>,
    pub chat_id: Option<String>,
    pub operation: Option<String>,
}

tokio::task_local! {
    static CURRENT: DeliveryContext;
}

/// Bind `ctx` for the duration of `fut`, across every suspension point
/// inside it.
pub async fn run_with<F: Future>(ctx: DeliveryContext, fut: F) -> F::Output {
    CURRENT.scope(ctx, fut).await
}

/// Inherit the current context, overlay `partial`, and mint a fresh
/// `delivery_id` iff none was supplied (by the overlay or the parent).
pub async fn with_partial<F: Future>(partial: PartialContext, fut: F) -> F::Output {
    let mut ctx = current().unwrap_or_default();
    if let Some(id) = partial.delivery_id {
        ctx.delivery_id = id;
    } else if ctx.delivery_id.is_empty() {
        ctx.delivery_id = uuid::Uuid::new_v4().to_string();
    }
    if let Some(account) = partial.account_id {
        ctx.account_id = Some(account);
    }
    if let Some(chat) = partial.chat_id {
        ctx.chat_id = Some(chat);
    }
    if let Some(op) = partial.operation {
        ctx.operation = Some(op);
    }
    CURRENT.scope(ctx, fut).await
}

/// The context bound to the current task, if any.
pub fn current() -> Option<DeliveryContext> {
    CURRENT.try_with(|ctx| ctx.clone()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(id: &str) -> DeliveryContext {
        DeliveryContext {
            delivery_id: id.into(),
            account_id: Some("acc".into()),
            chat_id: Some("123".into()),
            operation: Some("sendVoice".into()),
        }
    }

    #[tokio::test]
    async fn context_survives_suspension_points() {
        run_with(ctx("d1"), async {
            assert_eq!(current().unwrap().delivery_id, "d1");
            tokio::time::sleep(std::time::Duration::from_millis(1)).await;
            assert_eq!(current().unwrap().delivery_id, "d1");
        })
        .await;
        assert_eq!(current(), None);
    }

    #[tokio::test]
    async fn nested_scope_shadows_then_restores() {
        run_with(ctx("outer"), async {
            run_with(ctx("inner"), async {
                assert_eq!(current().unwrap().delivery_id, "inner");
            })
            .await;
            assert_eq!(current().unwrap().delivery_id, "outer");
        })
        .await;
    }

    #[tokio::test]
    async fn with_partial_inherits_and_overlays() {
        run_with(ctx("d1"), async {
            let partial = PartialContext {
                operation: Some("sendMessage".into()),
                ..Default::default()
            };
            with_partial(partial, async {
                let c = current().unwrap();
                // Inherited.
                assert_eq!(c.delivery_id, "d1");
                assert_eq!(c.account_id.as_deref(), Some("acc"));
                // Overlaid.
                assert_eq!(c.operation.as_deref(), Some("sendMessage"));
            })
            .await;
        })
        .await;
    }

    #[tokio::test]
    async fn with_partial_mints_delivery_id_when_absent() {
        with_partial(PartialContext::default(), async {
            assert!(!current().unwrap().delivery_id.is_empty());
        })
        .await;
    }

    #[tokio::test]
    async fn concurrent_tasks_observe_independent_views() {
        run_with(ctx("parent"), async {
            let snapshot = current().unwrap();
            let a = tokio::spawn(run_with(snapshot.clone(), async {
                tokio::time::sleep(std::time::Duration::from_millis(2)).await;
                current().unwrap().delivery_id
            }));
            let b = tokio::spawn(run_with(
                DeliveryContext {
                    delivery_id: "sibling".into(),
                    ..snapshot.clone()
                },
                async { current().unwrap().delivery_id },
            ));

            assert_eq!(a.await.unwrap(), "parent");
            assert_eq!(b.await.unwrap(), "sibling");
            // Sibling reassignment did not leak into this scope.
            assert_eq!(current().unwrap().delivery_id, "parent");
        })
        .await;
    }
}
