//! Concurrent mutations touching the same users

mod helpers;

use eglise_common::{Error, Qualification};
use eglise_hierarchy::NewGroup;
use helpers::setup;
use tokio::task::JoinSet;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_assignments_of_one_responsible_yield_one_group() {
    let fx = setup().await;
    let nina = fx.user("Nina").await;
    let carol = fx.user("Carol").await;
    let network = fx.network("Nord", nina.id).await;

    let (network_id, carol_id) = (network.id, carol.id);
    let mut join_set = JoinSet::new();
    for i in 0..4 {
        let hierarchy = fx.hierarchy.clone();
        join_set.spawn(async move {
            hierarchy
                .create_group(NewGroup {
                    network_id: Some(network_id),
                    name: Some(format!("Groupe {}", i)),
                    responsable1_id: Some(carol_id),
                    ..Default::default()
                })
                .await
        });
    }

    let mut created = 0;
    let mut conflicts = 0;
    while let Some(result) = join_set.join_next().await {
        match result.unwrap() {
            Ok(_) => created += 1,
            Err(Error::Conflict(_)) => conflicts += 1,
            Err(e) => panic!("unexpected error: {:?}", e),
        }
    }

    assert_eq!(created, 1);
    assert_eq!(conflicts, 3);
    assert_eq!(fx.hierarchy.list_network_groups(network.id).await.unwrap().len(), 1);
    assert_eq!(fx.qualification_of(carol.id).await, Qualification::Leader);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_member_adds_all_land() {
    let fx = setup().await;
    let nina = fx.user("Nina").await;
    let alice = fx.user("Alice").await;
    let network = fx.network("Nord", nina.id).await;
    let group = fx.group(network.id, alice.id).await;

    let mut users = Vec::new();
    for i in 0..8 {
        users.push(fx.user(&format!("Membre{}", i)).await);
    }

    let mut join_set = JoinSet::new();
    for user in &users {
        let hierarchy = fx.hierarchy.clone();
        let (group_id, user_id) = (group.id, user.id);
        join_set.spawn(async move { hierarchy.add_group_member(group_id, user_id).await });
    }
    while let Some(result) = join_set.join_next().await {
        result.unwrap().unwrap();
    }

    let members = fx.hierarchy.list_group_members(group.id).await.unwrap();
    assert_eq!(members.len(), users.len() + 1);
    for user in &users {
        assert_eq!(fx.qualification_of(user.id).await, Qualification::Regulier);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn rebuilds_interleaved_with_mutations_settle() {
    let fx = setup().await;
    let nina = fx.user("Nina").await;
    let network = fx.network("Nord", nina.id).await;

    let mut leaders = Vec::new();
    for i in 0..6 {
        leaders.push(fx.user(&format!("Leader{}", i)).await);
    }

    let mut join_set = JoinSet::new();
    for leader in &leaders {
        let hierarchy = fx.hierarchy.clone();
        let (network_id, user_id) = (network.id, leader.id);
        join_set.spawn(async move {
            hierarchy
                .create_group(NewGroup {
                    network_id: Some(network_id),
                    responsable1_id: Some(user_id),
                    ..Default::default()
                })
                .await
                .map(|_| ())
        });
        let hierarchy = fx.hierarchy.clone();
        let church_id = fx.church.id;
        join_set.spawn(async move { hierarchy.rebuild(church_id).await.map(|_| ()) });
    }
    while let Some(result) = join_set.join_next().await {
        result.unwrap().unwrap();
    }

    let rebuilt = fx.hierarchy.rebuild(fx.church.id).await.unwrap();
    assert_eq!(rebuilt.len(), 1 + leaders.len());
}
