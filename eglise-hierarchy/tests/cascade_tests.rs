//! Deletion cascades

mod helpers;

use eglise_common::db::MembershipAction;
use eglise_common::{Error, Qualification};
use eglise_hierarchy::{NewSession, NewUnit};
use helpers::setup;

#[tokio::test]
async fn network_delete_cascades_and_spares_siblings() {
    let fx = setup().await;
    let nina = fx.user("Nina").await;
    let omar = fx.user("Omar").await;
    let alice = fx.user("Alice").await;
    let bob = fx.user("Bob").await;
    let dave = fx.user("Dave").await;
    let eve = fx.user("Eve").await;

    let north = fx.network("Nord", nina.id).await;
    let south = fx.network("Sud", omar.id).await;
    let doomed = fx.group(north.id, alice.id).await;
    let kept = fx.group(south.id, bob.id).await;
    fx.hierarchy.add_group_member(doomed.id, dave.id).await.unwrap();
    fx.hierarchy.add_network_companion(north.id, eve.id).await.unwrap();

    fx.hierarchy.delete_network(north.id).await.unwrap();

    assert!(matches!(
        fx.hierarchy.get_network(north.id).await,
        Err(Error::NotFound(_))
    ));
    assert!(matches!(
        fx.hierarchy.get_group(doomed.id).await,
        Err(Error::NotFound(_))
    ));
    assert!(fx.hierarchy.list_group_members(doomed.id).await.unwrap().is_empty());
    assert!(fx.hierarchy.list_network_companions(north.id).await.unwrap().is_empty());

    assert_eq!(fx.qualification_of(nina.id).await, Qualification::Leader);
    assert_eq!(fx.qualification_of(alice.id).await, Qualification::Regulier);
    assert_eq!(fx.qualification_of(dave.id).await, Qualification::MembreIrregulier);
    assert_eq!(fx.qualification_of(eve.id).await, Qualification::MembreIrregulier);

    // History survives the group
    let history = fx.hierarchy.group_member_history(doomed.id).await.unwrap();
    let dave_actions: Vec<_> = history
        .iter()
        .filter(|h| h.user_id == dave.id)
        .map(|h| h.action)
        .collect();
    assert_eq!(dave_actions, vec![MembershipAction::Joined, MembershipAction::Left]);

    let chain = fx.hierarchy.impact_chain(fx.church.id).await.unwrap();
    assert!(chain.iter().all(|e| e.network_id != Some(north.id)));
    assert!(chain.iter().all(|e| e.group_id != Some(doomed.id)));
    assert!(chain.iter().any(|e| e.user_id == bob.id && e.group_id == Some(kept.id)));

    assert_eq!(fx.hierarchy.get_group(kept.id).await.unwrap().responsable1_id, bob.id);
    assert_eq!(fx.qualification_of(omar.id).await, Qualification::ResponsableReseau);
    assert_eq!(fx.qualification_of(bob.id).await, Qualification::Leader);
}

#[tokio::test]
async fn released_responsibles_can_lead_again() {
    let fx = setup().await;
    let nina = fx.user("Nina").await;
    let alice = fx.user("Alice").await;
    let network = fx.network("Nord", nina.id).await;
    let group = fx.group(network.id, alice.id).await;

    fx.hierarchy.delete_group(group.id).await.unwrap();
    assert_eq!(fx.qualification_of(alice.id).await, Qualification::Regulier);

    fx.group(network.id, alice.id).await;
    assert_eq!(fx.qualification_of(alice.id).await, Qualification::Leader);
}

#[tokio::test]
async fn session_delete_resets_everyone_reached() {
    let fx = setup().await;
    let sam = fx.user("Sam").await;
    let ursula = fx.user("Ursula").await;
    let victor = fx.user("Victor").await;

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
    fx.hierarchy.add_unit_member(unit.id, victor.id).await.unwrap();

    fx.hierarchy.delete_session(session.id).await.unwrap();

    for user in [&sam, &ursula, &victor] {
        assert_eq!(fx.qualification_of(user.id).await, Qualification::Irregulier);
    }
    assert!(matches!(
        fx.hierarchy.get_unit(unit.id).await,
        Err(Error::NotFound(_))
    ));
    let history = fx.hierarchy.unit_member_history(unit.id).await.unwrap();
    assert!(history
        .iter()
        .any(|h| h.user_id == victor.id && h.action == MembershipAction::Left));
}

#[tokio::test]
async fn unit_delete_demotes_members_and_responsibles() {
    let fx = setup().await;
    let sam = fx.user("Sam").await;
    let ursula = fx.user("Ursula").await;
    let victor = fx.user("Victor").await;
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
    fx.hierarchy.add_unit_member(unit.id, victor.id).await.unwrap();

    fx.hierarchy.delete_unit(unit.id).await.unwrap();

    assert_eq!(fx.qualification_of(ursula.id).await, Qualification::MembreSession);
    assert_eq!(fx.qualification_of(victor.id).await, Qualification::Irregulier);
    assert_eq!(fx.qualification_of(sam.id).await, Qualification::ResponsableSession);
    assert!(fx.hierarchy.list_session_units(session.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn church_delete_detaches_users() {
    let fx = setup().await;
    let nina = fx.user("Nina").await;
    let alice = fx.user("Alice").await;
    let sam = fx.user("Sam").await;
    let network = fx.network("Nord", nina.id).await;
    fx.group(network.id, alice.id).await;
    fx.hierarchy
        .create_session(NewSession {
            eglise_id: Some(fx.church.id),
            name: Some("Session".into()),
            responsable1_id: Some(sam.id),
            responsable2_id: None,
        })
        .await
        .unwrap();

    fx.hierarchy.delete_church(fx.church.id).await.unwrap();

    assert!(matches!(
        fx.hierarchy.get_church(fx.church.id).await,
        Err(Error::NotFound(_))
    ));
    assert!(fx.hierarchy.list_church_networks(fx.church.id).await.unwrap().is_empty());
    assert!(fx.hierarchy.list_church_sessions(fx.church.id).await.unwrap().is_empty());
    assert!(fx.hierarchy.impact_chain(fx.church.id).await.unwrap().is_empty());

    let alice = fx.hierarchy.get_user(alice.id).await.unwrap();
    assert_eq!(alice.eglise_id, None);
    assert_eq!(alice.qualification, Qualification::Regulier);
    assert_eq!(fx.qualification_of(sam.id).await, Qualification::Irregulier);

    // Nothing left holding a responsibility
    fx.hierarchy.delete_user(nina.id).await.unwrap();
}

#[tokio::test]
async fn deleting_unknown_entities_is_not_found() {
    let fx = setup().await;
    let id = uuid::Uuid::new_v4();
    assert!(matches!(fx.hierarchy.delete_network(id).await, Err(Error::NotFound(_))));
    assert!(matches!(fx.hierarchy.delete_group(id).await, Err(Error::NotFound(_))));
    assert!(matches!(fx.hierarchy.delete_session(id).await, Err(Error::NotFound(_))));
    assert!(matches!(fx.hierarchy.delete_unit(id).await, Err(Error::NotFound(_))));
    assert!(matches!(fx.hierarchy.delete_church(id).await, Err(Error::NotFound(_))));
}
