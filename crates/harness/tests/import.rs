use guestlist_core::{ConfirmationStatus, NewGuest};
use guestlist_harness::TestNetwork;
use guestlist_storage::{ImportOptions, ImportReport, SqliteStore, import_guests, parse_guest_csv};

const SHEET: &str = "\
רשימת מוזמנים,,,,,,,
,,,,,,,
מספר,שם,טלפון,גיל,מגדר,מסגרת,באחריות,הערות
3,Gil,0529999999,51,M,Scouts,Rina,
1,Dana,0501234567,34,F,Choir,Avi,\"tea, no sugar\"
,Nameless row,,,,,,
2,Bat,0541111111,,F,Choir,,
4,,0500000000,,,,,
";

#[test]
fn imported_sheet_shows_up_sorted_with_defaults() -> Result<(), Box<dyn std::error::Error>> {
    let mut net = TestNetwork::new()?;
    net.add_client()?;

    let parsed = parse_guest_csv(SHEET);
    assert_eq!(parsed.guests.len(), 3);
    assert_eq!(parsed.skipped, 2);

    let report = import_guests(&mut *net.store(), &parsed.guests, &ImportOptions { batch_size: 2 })?;
    assert_eq!(report, ImportReport { imported: 3, batches: 2 });
    // One snapshot per batch.
    assert_eq!(net.client_mut(0).pump(0), 2);

    let board = &net.client(0).board;
    let names: Vec<&str> = board.view().records().iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["Dana", "Bat", "Gil"]);
    assert_eq!(board.view().frameworks(), ["Choir", "Scouts"]);
    assert_eq!(board.view().next_row_number(), Some(4));

    let dana = &board.view().records()[0];
    assert_eq!(dana.notes, "tea, no sugar");
    assert!(!dana.already_spoke);
    assert_eq!(dana.confirmation_status, ConfirmationStatus::NotYetHandled);
    assert_eq!(dana.handled_by, "");
    Ok(())
}

#[test]
fn default_batch_is_500_writes() -> Result<(), Box<dyn std::error::Error>> {
    let mut net = TestNetwork::new()?;
    net.add_client()?;
    let guests: Vec<NewGuest> = (1..=1001).map(|n| NewGuest::new(n, format!("g{n}"))).collect();

    let report = import_guests(&mut *net.store(), &guests, &ImportOptions::default())?;
    assert_eq!(report.batches, 3);
    assert_eq!(net.client_mut(0).pump(0), 3);
    assert_eq!(net.client(0).board.stats().total, 1001);
    Ok(())
}

#[test]
fn reset_all_clears_statuses_in_one_snapshot() -> Result<(), Box<dyn std::error::Error>> {
    let mut net = TestNetwork::new()?;
    net.add_client()?;
    net.add_client()?;
    let ids = net.seed(&[
        NewGuest {
            already_spoke: true,
            confirmation_status: ConfirmationStatus::Confirmed,
            ..NewGuest::new(1, "Dana")
        },
        NewGuest {
            confirmation_status: ConfirmationStatus::Maybe,
            handled_by: "Avi".into(),
            ..NewGuest::new(2, "Gil")
        },
    ])?;

    assert_eq!(net.client_mut(0).reset_all()?, 2);
    assert_eq!(net.client_mut(1).pump(0), 1);

    let board = &net.client(1).board;
    assert_eq!(board.stats().pending, 2);
    assert_eq!(board.stats().spoke, 0);
    let gil = board.row(ids[1]).ok_or("row missing")?.record();
    assert_eq!(gil.handled_by, "Avi");
    Ok(())
}

#[test]
fn store_reopens_from_disk() -> Result<(), Box<dyn std::error::Error>> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("guests.db");
    let path = path.to_str().ok_or("non-utf8 path")?;

    let first_stamp = {
        let mut net = TestNetwork::with_store(SqliteStore::open(path)?);
        net.add_client()?;
        let parsed = parse_guest_csv(SHEET);
        import_guests(&mut *net.store(), &parsed.guests, &ImportOptions::default())?;
        net.settle();
        net.client(0).board.view().records()[0].last_updated
    };

    let mut net = TestNetwork::with_store(SqliteStore::open(path)?);
    net.add_client()?;
    assert_eq!(net.client(0).board.view().total(), 3);

    let id = net.client(0).find("Dana").ok_or("Dana missing")?;
    let now = net.now();
    net.client_mut(0)
        .set_status(id, ConfirmationStatus::Declined, now)?;
    net.settle();
    let record = net.client(0).board.row(id).ok_or("row missing")?.record().clone();
    assert_eq!(record.confirmation_status, ConfirmationStatus::Declined);
    assert!(record.last_updated > first_stamp);
    Ok(())
}
