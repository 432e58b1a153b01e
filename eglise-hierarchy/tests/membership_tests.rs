//! Group, unit and companion membership rules

mod helpers;

use eglise_common::db::MembershipAction;
use eglise_common::{Error, Qualification};
use eglise_hierarchy::{NetworkPatch, NewChurch, NewGroup, NewSession, NewUnit, NewUser};
use helpers::setup;

#[tokio::test]
async fn a_user_belongs_to_one_group_at_a_time() {
    let fx = setup().await;
    let nina = fx.user("Nina").await;
    let alice = fx.user("Alice").await;
    let bob = fx.user("Bob").await;
    let dave = fx.user("Dave").await;
    let network = fx.network("Nord", nina.id).await;
    let first = fx.group(network.id, alice.id).await;
    let second = fx.group(network.id, bob.id).await;

    let membership = fx.hierarchy.add_group_member(first.id, dave.id).await.unwrap();
    assert_eq!(membership.container_id, first.id);

    let err = fx
        .hierarchy
        .add_group_member(second.id, dave.id)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));
}

#[tokio::test]
async fn excluded_users_cannot_join_a_group() {
    let fx = setup().await;
    let nina = fx.user("Nina").await;
    let alice = fx.user("Alice").await;
    let gouv = fx.user("Gilles").await;
    let network = fx.network("Nord", nina.id).await;
    let group = fx.group(network.id, alice.id).await;

    let err = fx.hierarchy.add_group_member(group.id, nina.id).await.unwrap_err();
    assert!(matches!(err, Error::Conflict(_)), "network responsible: {:?}", err);

    fx.hierarchy
        .set_user_qualification(gouv.id, Qualification::Gouvernance)
        .await
        .unwrap();
    let err = fx.hierarchy.add_group_member(group.id, gouv.id).await.unwrap_err();
    assert!(matches!(err, Error::Validation(_)), "excluded tier: {:?}", err);
}

#[tokio::test]
async fn users_of_another_church_are_rejected() {
    let fx = setup().await;
    let nina = fx.user("Nina").await;
    let alice = fx.user("Alice").await;
    let network = fx.network("Nord", nina.id).await;
    let group = fx.group(network.id, alice.id).await;

    let other = fx
        .hierarchy
        .create_church(NewChurch {
            name: Some("Autre".into()),
            responsable_id: None,
        })
        .await
        .unwrap();
    let stranger = fx
        .hierarchy
        .create_user(NewUser {
            first_name: Some("Xavier".into()),
            last_name: None,
            eglise_id: Some(other.id),
        })
        .await
        .unwrap();

    let err = fx
        .hierarchy
        .add_group_member(group.id, stranger.id)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    let err = fx
        .hierarchy
        .create_group(NewGroup {
            network_id: Some(network.id),
            responsable1_id: Some(stranger.id),
            ..Default::default()
        })
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Validation(_)));
}

#[tokio::test]
async fn tier_holders_keep_their_tier_on_join() {
    let fx = setup().await;
    let nina = fx.user("Nina").await;
    let alice = fx.user("Alice").await;
    let dave = fx.user("Dave").await;
    let network = fx.network("Nord", nina.id).await;
    let group = fx.group(network.id, alice.id).await;

    fx.hierarchy
        .set_user_qualification(dave.id, Qualification::Qualification1728)
        .await
        .unwrap();
    fx.hierarchy.add_group_member(group.id, dave.id).await.unwrap();

    assert_eq!(
        fx.qualification_of(dave.id).await,
        Qualification::Qualification1728
    );
}

#[tokio::test]
async fn new_responsible_moves_into_the_group_they_lead() {
    let fx = setup().await;
    let nina = fx.user("Nina").await;
    let alice = fx.user("Alice").await;
    let dave = fx.user("Dave").await;
    let network = fx.network("Nord", nina.id).await;
    let first = fx.group(network.id, alice.id).await;
    fx.hierarchy.add_group_member(first.id, dave.id).await.unwrap();

    let second = fx.group(network.id, dave.id).await;

    let members = fx.hierarchy.list_group_members(second.id).await.unwrap();
    assert_eq!(members.len(), 1);
    assert_eq!(members[0].user_id, dave.id);
    assert!(fx
        .hierarchy
        .list_group_members(first.id)
        .await
        .unwrap()
        .iter()
        .all(|m| m.user_id != dave.id));

    let history = fx.hierarchy.group_member_history(first.id).await.unwrap();
    let last = history.iter().rev().find(|h| h.user_id == dave.id).unwrap();
    assert_eq!(last.action, MembershipAction::Left);
    assert_eq!(fx.qualification_of(dave.id).await, Qualification::Leader);
}

#[tokio::test]
async fn removing_a_non_member_is_not_found() {
    let fx = setup().await;
    let nina = fx.user("Nina").await;
    let alice = fx.user("Alice").await;
    let dave = fx.user("Dave").await;
    let network = fx.network("Nord", nina.id).await;
    let group = fx.group(network.id, alice.id).await;

    let err = fx
        .hierarchy
        .remove_group_member(group.id, dave.id)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));
}

#[tokio::test]
async fn companions_are_exclusive() {
    let fx = setup().await;
    let nina = fx.user("Nina").await;
    let omar = fx.user("Omar").await;
    let alice = fx.user("Alice").await;
    let eve = fx.user("Eve").await;
    let north = fx.network("Nord", nina.id).await;
    let south = fx.network("Sud", omar.id).await;
    let group = fx.group(north.id, alice.id).await;

    fx.hierarchy.add_network_companion(north.id, eve.id).await.unwrap();
    assert_eq!(
        fx.qualification_of(eve.id).await,
        Qualification::CompagnonOeuvre
    );

    let err = fx.hierarchy.add_network_companion(south.id, eve.id).await.unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));
    let err = fx.hierarchy.add_group_member(group.id, eve.id).await.unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));
    let err = fx.hierarchy.add_network_companion(north.id, alice.id).await.unwrap_err();
    assert!(matches!(err, Error::Conflict(_)), "group member: {:?}", err);
    let err = fx.hierarchy.add_network_companion(north.id, omar.id).await.unwrap_err();
    assert!(matches!(err, Error::Conflict(_)), "network responsible: {:?}", err);

    let err = fx
        .hierarchy
        .remove_network_companion(south.id, eve.id)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound(_)));

    fx.hierarchy
        .remove_network_companion(north.id, eve.id)
        .await
        .unwrap();
    assert_eq!(
        fx.qualification_of(eve.id).await,
        Qualification::MembreIrregulier
    );
    assert!(fx.hierarchy.list_network_companions(north.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn unit_membership_rules() {
    let fx = setup().await;
    let sam = fx.user("Sam").await;
    let ursula = fx.user("Ursula").await;
    let victor = fx.user("Victor").await;
    let wendy = fx.user("Wendy").await;
    let session = fx
        .hierarchy
        .create_session(NewSession {
            eglise_id: Some(fx.church.id),
            name: Some("Session".into()),
            responsable1_id: Some(sam.id),
            responsable2_id: None,
        })
        .await
        .unwrap();
    let unit = fx
        .hierarchy
        .create_unit(NewUnit {
            session_id: Some(session.id),
            name: Some("Unite".into()),
            responsable1_id: Some(ursula.id),
            responsable2_id: None,
        })
        .await
        .unwrap();

    let members = fx.hierarchy.list_unit_members(unit.id).await.unwrap();
    assert_eq!(members.len(), 1, "responsible is enrolled");

    fx.hierarchy.add_unit_member(unit.id, victor.id).await.unwrap();
    assert_eq!(
        fx.qualification_of(victor.id).await,
        Qualification::MembreSession
    );

    let err = fx.hierarchy.add_unit_member(unit.id, sam.id).await.unwrap_err();
    assert!(matches!(err, Error::Conflict(_)), "session responsible: {:?}", err);

    fx.hierarchy
        .set_user_qualification(wendy.id, Qualification::Gouvernance)
        .await
        .unwrap();
    let err = fx.hierarchy.add_unit_member(unit.id, wendy.id).await.unwrap_err();
    assert!(matches!(err, Error::Validation(_)));

    let err = fx.hierarchy.remove_unit_member(unit.id, ursula.id).await.unwrap_err();
    assert!(matches!(err, Error::Conflict(_)));

    fx.hierarchy.remove_unit_member(unit.id, victor.id).await.unwrap();
    assert_eq!(fx.qualification_of(victor.id).await, Qualification::Irregulier);

    let history = fx.hierarchy.unit_member_history(unit.id).await.unwrap();
    let actions: Vec<_> = history
        .iter()
        .filter(|h| h.user_id == victor.id)
        .map(|h| h.action)
        .collect();
    assert_eq!(actions, vec![MembershipAction::Joined, MembershipAction::Left]);
}

#[tokio::test]
async fn group_member_named_network_responsible_leaves_the_group() {
    let fx = setup().await;
    let nina = fx.user("Nina").await;
    let alice = fx.user("Alice").await;
    let dave = fx.user("Dave").await;
    let network = fx.network("Nord", nina.id).await;
    let group = fx.group(network.id, alice.id).await;
    fx.hierarchy.add_group_member(group.id, dave.id).await.unwrap();

    fx.hierarchy
        .update_network(
            network.id,
            NetworkPatch {
                responsable2_id: Some(Some(dave.id)),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(
        fx.qualification_of(dave.id).await,
        Qualification::ResponsableReseau
    );
    let members = fx.hierarchy.list_group_members(group.id).await.unwrap();
    assert!(members.iter().all(|m| m.user_id != dave.id));
    let history = fx.hierarchy.group_member_history(group.id).await.unwrap();
    assert!(history
        .iter()
        .any(|h| h.user_id == dave.id && h.action == MembershipAction::Left));
}

#[tokio::test]
async fn network_responsible_leading_a_group_is_not_a_member_until_released() {
    let fx = setup().await;
    let nina = fx.user("Nina").await;
    let omar = fx.user("Omar").await;
    let network = fx.network("Nord", nina.id).await;

    let group = fx.group(network.id, nina.id).await;
    let members = fx.hierarchy.list_group_members(group.id).await.unwrap();
    assert!(members.iter().all(|m| m.user_id != nina.id));

    fx.hierarchy
        .update_network(
            network.id,
            NetworkPatch {
                responsable1_id: Some(omar.id),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(fx.qualification_of(nina.id).await, Qualification::Leader);
    let members = fx.hierarchy.list_group_members(group.id).await.unwrap();
    assert!(members.iter().any(|m| m.user_id == nina.id));
}

#[tokio::test]
async fn group_leader_named_network_responsible_leaves_their_group() {
    let fx = setup().await;
    let nina = fx.user("Nina").await;
    let omar = fx.user("Omar").await;
    let alice = fx.user("Alice").await;
    let north = fx.network("Nord", nina.id).await;
    let group = fx.group(north.id, alice.id).await;

    let south = fx.network("Sud", omar.id).await;
    fx.hierarchy
        .update_network(
            south.id,
            NetworkPatch {
                responsable2_id: Some(Some(alice.id)),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let members = fx.hierarchy.list_group_members(group.id).await.unwrap();
    assert!(members.iter().all(|m| m.user_id != alice.id));

    fx.hierarchy.delete_network(south.id).await.unwrap();

    assert_eq!(fx.qualification_of(alice.id).await, Qualification::Leader);
    let members = fx.hierarchy.list_group_members(group.id).await.unwrap();
    assert!(members.iter().any(|m| m.user_id == alice.id));
}
