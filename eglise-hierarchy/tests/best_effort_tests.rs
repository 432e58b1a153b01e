//! Post-commit rebuilds and qualification cleanup never undo a mutation
//!
//! Failures are injected with SQLite triggers that abort the targeted
//! statement.

mod helpers;

use eglise_common::{Error, Qualification};
use eglise_hierarchy::NewGroup;
use helpers::setup;

#[tokio::test]
async fn failing_rebuild_does_not_fail_the_mutation() {
    let fx = setup().await;
    let nina = fx.user("Nina").await;
    let alice = fx.user("Alice").await;
    let network = fx.network("Nord", nina.id).await;
    assert_eq!(fx.hierarchy.impact_chain(fx.church.id).await.unwrap().len(), 1);

    sqlx::query(
        "CREATE TRIGGER impact_chain_no_delete BEFORE DELETE ON impact_chain \
         BEGIN SELECT RAISE(ABORT, 'impact chain is read-only'); END",
    )
    .execute(fx.hierarchy.pool())
    .await
    .unwrap();

    let err = fx.hierarchy.rebuild(fx.church.id).await.unwrap_err();
    assert!(matches!(err, Error::Database(_)), "got {:?}", err);

    let group = fx
        .hierarchy
        .create_group(NewGroup {
            network_id: Some(network.id),
            responsable1_id: Some(alice.id),
            qualification: Some(Qualification::Qualification12),
            ..Default::default()
        })
        .await
        .unwrap();

    assert_eq!(fx.hierarchy.get_group(group.id).await.unwrap().id, group.id);
    assert_eq!(fx.qualification_of(alice.id).await, Qualification::Leader);

    // The in-transaction slot row landed even though the rebuild did not
    let chain = fx.hierarchy.impact_chain(fx.church.id).await.unwrap();
    assert_eq!(chain.len(), 2);
    assert!(chain.iter().any(|e| e.user_id == alice.id && e.group_id == Some(group.id)));
}

#[tokio::test]
async fn failing_qualification_cleanup_does_not_abort_the_deletion() {
    let fx = setup().await;
    let nina = fx.user("Nina").await;
    let alice = fx.user("Alice").await;
    let network = fx.network("Nord", nina.id).await;
    let group = fx.group(network.id, alice.id).await;

    sqlx::query(
        "CREATE TRIGGER users_no_regulier BEFORE UPDATE OF qualification ON users \
         WHEN NEW.qualification = 'REGULIER' \
         BEGIN SELECT RAISE(ABORT, 'demotion refused'); END",
    )
    .execute(fx.hierarchy.pool())
    .await
    .unwrap();

    fx.hierarchy.delete_group(group.id).await.unwrap();

    assert!(matches!(
        fx.hierarchy.get_group(group.id).await,
        Err(Error::NotFound(_))
    ));
    assert_eq!(fx.qualification_of(alice.id).await, Qualification::Leader);
    assert!(fx
        .hierarchy
        .list_network_groups(network.id)
        .await
        .unwrap()
        .is_empty());
}
