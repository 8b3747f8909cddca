use rusqlite::{Connection, Transaction};
use tracing::{debug, error, info, warn};

use guestlist_core::{
    FieldValue, GuestField, GuestId, GuestPatch, GuestRecord, NewGuest, ServerClock,
    SubscriptionId, Timestamp, guest::GUESTS_COLLECTION,
};

use crate::error::StorageError;
use crate::subscriptions::SubscriptionRegistry;
use crate::traits::{ErrorCallback, GuestStore, Snapshot, SnapshotCallback};

/// Convert Vec<u8> to fixed-size array with proper error handling.
fn to_array<const N: usize>(v: Vec<u8>, label: &str) -> Result<[u8; N], StorageError> {
    v.try_into()
        .map_err(|_| StorageError::Serialization(format!("invalid {label} length")))
}

type RawFieldRow = (Vec<u8>, Vec<u8>, Option<String>, Option<Vec<u8>>);

const SELECT_DOCUMENTS: &str = "SELECT d.doc_id, d.last_updated, f.field_key, f.value
     FROM documents d LEFT JOIN fields f ON f.doc_id = d.doc_id
     WHERE d.collection = ?1 ORDER BY d.rowid";

const SELECT_DOCUMENT: &str = "SELECT d.doc_id, d.last_updated, f.field_key, f.value
     FROM documents d LEFT JOIN fields f ON f.doc_id = d.doc_id
     WHERE d.collection = ?1 AND d.doc_id = ?2";

fn read_raw(row: &rusqlite::Row) -> rusqlite::Result<RawFieldRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

/// Fold joined document/field rows into records. Rows of one document must
/// be contiguous.
fn collect_documents<I>(rows: I) -> Result<Vec<GuestRecord>, StorageError>
where
    I: Iterator<Item = rusqlite::Result<RawFieldRow>>,
{
    let mut records = Vec::new();
    let mut current: Option<(GuestId, Timestamp, Vec<(String, FieldValue)>)> = None;

    for row in rows {
        let (id_bytes, ts_bytes, key, value) = row?;
        let id = GuestId::from_bytes(to_array::<16>(id_bytes, "doc_id")?);

        let starts_new = current.as_ref().is_none_or(|(cur, _, _)| *cur != id);
        if starts_new {
            if let Some((cid, cts, fields)) = current.take() {
                records.push(GuestRecord::from_fields(cid, cts, fields));
            }
            let ts = Timestamp::from_bytes(&to_array::<12>(ts_bytes, "last_updated")?);
            current = Some((id, ts, Vec::new()));
        }

        if let (Some(key), Some(bytes), Some((_, _, fields))) = (key, value, current.as_mut()) {
            let value = FieldValue::from_msgpack(&bytes)
                .map_err(|e| StorageError::Serialization(e.to_string()))?;
            fields.push((key, value));
        }
    }

    if let Some((cid, cts, fields)) = current {
        records.push(GuestRecord::from_fields(cid, cts, fields));
    }
    Ok(records)
}

fn insert_document(tx: &Transaction, id: GuestId, ts: Timestamp) -> Result<(), StorageError> {
    tx.execute(
        "INSERT INTO documents (doc_id, collection, created_at, last_updated) VALUES (?1, ?2, ?3, ?3)",
        rusqlite::params![
            id.as_bytes().as_slice(),
            GUESTS_COLLECTION,
            &ts.to_bytes()[..],
        ],
    )?;
    Ok(())
}

/// Stamp `lastUpdated`. Returns false when the document does not exist.
fn touch_document(tx: &Transaction, id: GuestId, ts: Timestamp) -> Result<bool, StorageError> {
    let changed = tx.execute(
        "UPDATE documents SET last_updated = ?1 WHERE doc_id = ?2 AND collection = ?3",
        rusqlite::params![&ts.to_bytes()[..], id.as_bytes().as_slice(), GUESTS_COLLECTION],
    )?;
    Ok(changed > 0)
}

fn write_fields<'a, I>(tx: &Transaction, id: GuestId, fields: I, ts: Timestamp) -> Result<(), StorageError>
where
    I: IntoIterator<Item = &'a (GuestField, FieldValue)>,
{
    for (field, value) in fields {
        let value_bytes = value
            .to_msgpack()
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        tx.execute(
            "INSERT INTO fields (doc_id, field_key, value, updated_at) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(doc_id, field_key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            rusqlite::params![
                id.as_bytes().as_slice(),
                field.key(),
                value_bytes,
                &ts.to_bytes()[..],
            ],
        )?;
    }
    Ok(())
}

/// Document store for the `guests` collection with live listeners.
///
/// Connectivity is simulated: while offline, listeners receive from-cache
/// snapshots and every write fails with [`StorageError::Unavailable`], since
/// there is no offline write queue.
pub struct SqliteStore {
    conn: Connection,
    clock: ServerClock,
    subscriptions: SubscriptionRegistry,
    sequence: u64,
    online: bool,
    subscribe_fault: Option<String>,
    reconnect_fault: Option<String>,
}

impl SqliteStore {
    pub fn open(path: &str) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;
        crate::schema::init_schema(&conn)?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        crate::schema::init_schema(&conn)?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, StorageError> {
        let last: Option<Vec<u8>> =
            conn.query_row("SELECT max(last_updated) FROM documents", [], |row| row.get(0))?;
        let clock = match last {
            Some(bytes) => {
                ServerClock::resume_after(Timestamp::from_bytes(&to_array::<12>(bytes, "last_updated")?))
            }
            None => ServerClock::new(),
        };
        Ok(Self {
            conn,
            clock,
            subscriptions: SubscriptionRegistry::new(),
            sequence: 0,
            online: true,
            subscribe_fault: None,
            reconnect_fault: None,
        })
    }

    pub fn is_online(&self) -> bool {
        self.online
    }

    /// Flip connectivity. Listeners get a snapshot reflecting the new state.
    pub fn set_online(&mut self, online: bool) {
        if self.online == online {
            return;
        }
        self.online = online;
        info!(online, "connectivity changed");
        self.publish();
    }

    /// Make the next `subscribe` call fail to attach.
    pub fn inject_subscribe_fault(&mut self, reason: impl Into<String>) {
        self.subscribe_fault = Some(reason.into());
    }

    /// Make the next `force_reconnect` call fail.
    pub fn inject_reconnect_fault(&mut self, reason: impl Into<String>) {
        self.reconnect_fault = Some(reason.into());
    }

    /// Drop every live listener, reporting `reason` to each one.
    pub fn drop_listeners(&mut self, reason: &str) -> usize {
        let dropped = self
            .subscriptions
            .fail_all(&StorageError::Subscription(reason.to_string()));
        warn!(dropped, reason, "live listeners dropped");
        dropped
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn fetch_all(&self) -> Result<Vec<GuestRecord>, StorageError> {
        let mut stmt = self.conn.prepare(SELECT_DOCUMENTS)?;
        let rows = stmt.query_map(rusqlite::params![GUESTS_COLLECTION], read_raw)?;
        collect_documents(rows)
    }

    pub fn get(&self, id: GuestId) -> Result<Option<GuestRecord>, StorageError> {
        let mut stmt = self.conn.prepare(SELECT_DOCUMENT)?;
        let rows = stmt.query_map(
            rusqlite::params![GUESTS_COLLECTION, id.as_bytes().as_slice()],
            read_raw,
        )?;
        Ok(collect_documents(rows)?.into_iter().next())
    }

    pub fn count(&self) -> Result<u64, StorageError> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM documents WHERE collection = ?1",
            rusqlite::params![GUESTS_COLLECTION],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn snapshot(&mut self) -> Result<Snapshot, StorageError> {
        let records = self.fetch_all()?;
        self.sequence += 1;
        Ok(Snapshot {
            sequence: self.sequence,
            records,
            from_cache: !self.online,
        })
    }

    fn publish(&mut self) {
        if self.subscriptions.is_empty() {
            return;
        }
        match self.snapshot() {
            Ok(snapshot) => self.subscriptions.broadcast(&snapshot),
            Err(e) => {
                error!(error = %e, "failed to build snapshot");
                self.subscriptions
                    .fail_all(&StorageError::Subscription(e.to_string()));
            }
        }
    }

    fn require_online(&self, op: &'static str) -> Result<(), StorageError> {
        if self.online {
            Ok(())
        } else {
            warn!(op, "write rejected while offline");
            Err(StorageError::Unavailable(format!("{op}: network unavailable")))
        }
    }
}

impl GuestStore for SqliteStore {
    fn subscribe(
        &mut self,
        on_update: SnapshotCallback,
        on_error: ErrorCallback,
    ) -> Result<SubscriptionId, StorageError> {
        if let Some(reason) = self.subscribe_fault.take() {
            error!(%reason, "listener failed to attach");
            return Err(StorageError::Subscription(reason));
        }

        let id = self.subscriptions.register(on_update, on_error);
        match self.snapshot() {
            Ok(snapshot) => {
                self.subscriptions.deliver_to(id, &snapshot);
                debug!(%id, sequence = snapshot.sequence, "listener attached");
                Ok(id)
            }
            Err(e) => {
                self.subscriptions.remove(id);
                Err(StorageError::Subscription(e.to_string()))
            }
        }
    }

    fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let removed = self.subscriptions.remove(id);
        debug!(%id, removed, "listener detached");
        removed
    }

    fn add(&mut self, guest: &NewGuest) -> Result<GuestId, StorageError> {
        self.require_online("add")?;
        let id = GuestId::new();
        let ts = self.clock.tick()?;

        let tx = self.conn.transaction()?;
        insert_document(&tx, id, ts)?;
        write_fields(&tx, id, guest.to_fields().iter(), ts)?;
        tx.commit()?;

        debug!(%id, row_number = guest.row_number, "guest added");
        self.publish();
        Ok(id)
    }

    fn update(&mut self, id: GuestId, patch: &GuestPatch) -> Result<(), StorageError> {
        self.require_online("update")?;
        if let Err(e) = patch.validate() {
            warn!(%id, error = %e, "patch does not match the guest shape; writing anyway");
        }
        let ts = self.clock.tick()?;

        let tx = self.conn.transaction()?;
        if !touch_document(&tx, id, ts)? {
            return Err(StorageError::NotFound(format!("guest {id}")));
        }
        write_fields(&tx, id, patch.iter(), ts)?;
        tx.commit()?;

        debug!(%id, fields = patch.len(), "guest updated");
        self.publish();
        Ok(())
    }

    fn remove(&mut self, id: GuestId) -> Result<(), StorageError> {
        self.require_online("remove")?;
        let removed = self.conn.execute(
            "DELETE FROM documents WHERE doc_id = ?1 AND collection = ?2",
            rusqlite::params![id.as_bytes().as_slice(), GUESTS_COLLECTION],
        )?;
        if removed == 0 {
            return Err(StorageError::NotFound(format!("guest {id}")));
        }

        debug!(%id, "guest removed");
        self.publish();
        Ok(())
    }

    fn force_reconnect(&mut self) -> Result<(), StorageError> {
        info!("forcing reconnect");
        self.online = false;
        if let Some(reason) = self.reconnect_fault.take() {
            error!(%reason, "reconnect failed");
            self.publish();
            return Err(StorageError::Unavailable(reason));
        }
        self.online = true;
        self.publish();
        Ok(())
    }

    fn add_batch(&mut self, guests: &[NewGuest]) -> Result<Vec<GuestId>, StorageError> {
        self.require_online("add_batch")?;
        if guests.is_empty() {
            return Ok(Vec::new());
        }

        let mut ids = Vec::with_capacity(guests.len());
        let tx = self.conn.transaction()?;
        for guest in guests {
            let id = GuestId::new();
            let ts = self.clock.tick()?;
            insert_document(&tx, id, ts)?;
            write_fields(&tx, id, guest.to_fields().iter(), ts)?;
            ids.push(id);
        }
        tx.commit()?;

        debug!(count = ids.len(), "guest batch added");
        self.publish();
        Ok(ids)
    }

    fn reset_statuses(&mut self, ids: &[GuestId]) -> Result<(), StorageError> {
        self.require_online("reset_statuses")?;
        let patch = GuestPatch::reset_status();

        let tx = self.conn.transaction()?;
        for &id in ids {
            let ts = self.clock.tick()?;
            if !touch_document(&tx, id, ts)? {
                return Err(StorageError::NotFound(format!("guest {id}")));
            }
            write_fields(&tx, id, patch.iter(), ts)?;
        }
        tx.commit()?;

        info!(count = ids.len(), "guest statuses reset");
        self.publish();
        Ok(())
    }
}
