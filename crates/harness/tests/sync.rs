use guestlist_core::{GuestField, NewGuest};
use guestlist_engine::{BoardConfig, BoardStatus, EngineError, GuestDraft};
use guestlist_harness::{TestClient, TestNetwork};
use guestlist_storage::{GuestStore, StorageError};

// ============================================================================
// Live updates
// ============================================================================

#[test]
fn board_is_loading_until_first_snapshot() -> Result<(), Box<dyn std::error::Error>> {
    let net = TestNetwork::new()?;
    let mut client = TestClient::connect(net.shared_store(), BoardConfig::default())?;
    assert!(client.board.is_loading());
    assert_eq!(client.board.last_synced(), None);

    assert_eq!(client.pump(42), 1);
    assert_eq!(client.board.status(), &BoardStatus::Live);
    assert_eq!(client.board.last_synced(), Some(42));
    assert!(!client.board.is_offline());
    Ok(())
}

#[test]
fn writes_reach_every_client() -> Result<(), Box<dyn std::error::Error>> {
    let mut net = TestNetwork::new()?;
    net.add_client()?;
    net.add_client()?;
    let id = net.seed(&[NewGuest::new(1, "Dana")])?[0];
    let now = net.now();

    net.client_mut(0).edit_and_blur(id, GuestField::HandledBy, "Avi", now)?;
    net.settle();

    for index in 0..2 {
        let row = net.client(index).board.row(id).ok_or("row missing")?;
        assert_eq!(row.record().handled_by, "Avi");
        assert_eq!(row.draft(GuestField::HandledBy), Some("Avi"));
    }
    assert_eq!(net.client(1).writes(), 0);
    Ok(())
}

#[test]
fn every_write_stamps_a_newer_server_time() -> Result<(), Box<dyn std::error::Error>> {
    let mut net = TestNetwork::new()?;
    net.add_client()?;
    let id = net.seed(&[NewGuest::new(1, "Dana")])?[0];
    let before = net.client(0).board.row(id).ok_or("row missing")?.record().last_updated;

    let now = net.now();
    net.client_mut(0).edit_and_blur(id, GuestField::Age, "30", now)?;
    net.settle();

    let after = net.client(0).board.row(id).ok_or("row missing")?.record().last_updated;
    assert!(after > before);
    Ok(())
}

#[test]
fn rows_follow_deletions() -> Result<(), Box<dyn std::error::Error>> {
    let mut net = TestNetwork::new()?;
    net.add_client()?;
    net.add_client()?;
    let ids = net.seed(&[NewGuest::new(1, "Dana"), NewGuest::new(2, "Gil")])?;
    assert_eq!(net.client(1).board.row_count(), 2);

    net.client_mut(0).delete_guest(ids[0])?;
    net.settle();
    assert_eq!(net.client(1).board.row_count(), 1);
    assert!(net.client(1).board.row(ids[0]).is_none());
    assert_eq!(net.client(1).visible_names(), vec!["Gil"]);
    Ok(())
}

#[test]
fn deleting_a_missing_guest_is_a_no_op() -> Result<(), Box<dyn std::error::Error>> {
    let mut net = TestNetwork::new()?;
    net.add_client()?;
    net.add_client()?;
    let id = net.seed(&[NewGuest::new(1, "Dana")])?[0];

    net.client_mut(0).delete_guest(id)?;
    // Client 1 has not seen the deletion yet.
    net.client_mut(1).delete_guest(id)?;
    net.settle();
    assert_eq!(net.store().count()?, 0);
    Ok(())
}

#[test]
fn detached_client_stops_receiving() -> Result<(), Box<dyn std::error::Error>> {
    let mut net = TestNetwork::new()?;
    net.add_client()?;
    net.add_client()?;
    net.client_mut(1).detach();

    net.seed(&[NewGuest::new(1, "Dana")])?;
    assert_eq!(net.client_mut(1).pump(0), 0);
    assert_eq!(net.client(1).board.row_count(), 0);
    assert_eq!(net.client(0).board.row_count(), 1);
    assert_eq!(net.store().subscriber_count(), 1);
    Ok(())
}

// ============================================================================
// Connectivity
// ============================================================================

#[test]
fn offline_snapshots_raise_the_banner() -> Result<(), Box<dyn std::error::Error>> {
    let mut net = TestNetwork::new()?;
    net.add_client()?;
    let id = net.seed(&[NewGuest::new(1, "Dana")])?[0];
    assert_eq!(net.client(0).board.last_synced(), Some(0));

    net.store().set_online(false);
    net.advance(100);
    assert!(net.client(0).board.is_offline());
    assert_eq!(net.client(0).board.last_synced(), Some(0));
    assert_eq!(net.client(0).board.row_count(), 1);

    let added = net.client_mut(0).add_guest(&GuestDraft {
        name: "Gil".into(),
        ..Default::default()
    });
    assert!(matches!(
        added,
        Err(EngineError::Write(StorageError::Unavailable(_)))
    ));
    assert!(matches!(
        net.client_mut(0).delete_guest(id),
        Err(EngineError::Write(StorageError::Unavailable(_)))
    ));

    net.store().set_online(true);
    net.advance(100);
    assert!(!net.client(0).board.is_offline());
    assert_eq!(net.client(0).board.last_synced(), Some(200));
    Ok(())
}

// ============================================================================
// Subscription failure and recovery
// ============================================================================

#[test]
fn dropped_listener_fails_board_until_refresh() -> Result<(), Box<dyn std::error::Error>> {
    let mut net = TestNetwork::new()?;
    net.add_client()?;
    net.seed(&[NewGuest::new(1, "Dana")])?;

    assert_eq!(net.store().drop_listeners("listener lost"), 1);
    net.settle();
    assert!(matches!(net.client(0).board.status(), BoardStatus::Failed(_)));
    assert_eq!(net.client(0).board.subscription(), None);

    // No further deliveries while failed.
    net.store().add(&NewGuest::new(2, "Gil"))?;
    assert_eq!(net.client_mut(0).pump(0), 0);

    let now = net.now();
    assert!(net.client_mut(0).refresh(now)?);
    assert!(net.client(0).board.is_loading());
    net.settle();
    assert_eq!(net.client(0).board.status(), &BoardStatus::Live);
    assert_eq!(net.client(0).board.row_count(), 2);
    Ok(())
}

#[test]
fn attach_failure_is_reported_synchronously() -> Result<(), Box<dyn std::error::Error>> {
    let mut net = TestNetwork::new()?;
    net.store().inject_subscribe_fault("permission denied");

    let attached = net.add_client();
    assert!(matches!(attached, Err(EngineError::Subscription(_))));
    assert_eq!(net.store().subscriber_count(), 0);

    // The fault is one-shot.
    net.add_client()?;
    assert_eq!(net.client(0).board.status(), &BoardStatus::Live);
    Ok(())
}

#[test]
fn failed_reconnect_is_logged_not_raised() -> Result<(), Box<dyn std::error::Error>> {
    let mut net = TestNetwork::new()?;
    net.add_client()?;
    net.store().drop_listeners("listener lost");
    net.store().inject_reconnect_fault("dns failure");

    let now = net.now();
    assert!(!net.client_mut(0).refresh(now)?);
    assert!(matches!(net.client(0).board.status(), BoardStatus::Failed(_)));
    assert!(net.client(0).board.is_offline());
    assert!(!net.store().is_online());

    assert!(net.client_mut(0).refresh(now)?);
    net.settle();
    assert_eq!(net.client(0).board.status(), &BoardStatus::Live);
    assert!(!net.client(0).board.is_offline());
    Ok(())
}

#[test]
fn refresh_replaces_a_live_listener() -> Result<(), Box<dyn std::error::Error>> {
    let mut net = TestNetwork::new()?;
    net.add_client()?;
    net.seed(&[NewGuest::new(1, "Dana")])?;
    let before = net.client(0).board.subscription().ok_or("not subscribed")?;

    let now = net.now();
    assert!(net.client_mut(0).refresh(now)?);
    let after = net.client(0).board.subscription().ok_or("not subscribed")?;
    assert_ne!(after, before);
    assert_eq!(net.store().subscriber_count(), 1);

    assert_eq!(net.client_mut(0).pump(now), 1);
    assert_eq!(net.client(0).board.status(), &BoardStatus::Live);
    assert_eq!(net.client(0).board.row_count(), 1);
    Ok(())
}
