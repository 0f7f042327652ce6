//! Ledger events.
//!
//! Every write that produces side effects records one [`Event`] per effect
//! and announces them with a single runtime notification. Event ids are
//! derived from the transaction context with [`derive_id`], so every
//! replica executing the same transaction mints the same ids.

use iot_ledger_storage::{EntityStore, Record, RecordValue, RoleType, StorageError, derive_id};
use serde::{Deserialize, Serialize};

use crate::{certificate::extract_organizational_unit, error::ChaincodeResult};

/// Namespace of event records.
pub const EVENT_NAMESPACE: &str = "Event";

/// Stored value of an [`Event`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EventValue {
    /// Transaction time in Unix seconds.
    pub timestamp: i64,
    /// Organizational unit of the submitting identity.
    pub creator: String,
    /// Namespace of the affected record.
    #[serde(rename = "entityType")]
    pub entity_type: String,
    /// Id of the affected record.
    #[serde(rename = "entityID")]
    pub entity_id: String,
    /// Request that caused the effect, e.g. `addIotGps`.
    pub action: String,
    /// Free-form payload, usually the affected record's value.
    #[serde(default)]
    pub other: serde_json::Value,
}

impl EventValue {
    /// Creates an event value; `timestamp` and `creator` are stamped when
    /// the event is emitted.
    #[must_use]
    pub fn new(
        action: impl Into<String>,
        entity_type: impl Into<String>,
        entity_id: impl Into<String>,
        other: serde_json::Value,
    ) -> Self {
        Self {
            timestamp: 0,
            creator: String::new(),
            entity_type: entity_type.into(),
            entity_id: entity_id.into(),
            action: action.into(),
            other,
        }
    }
}

impl RecordValue for EventValue {
    const NAMESPACE: &'static str = EVENT_NAMESPACE;
}

/// A persisted event.
pub type Event = Record<EventValue>;

/// Ordered events produced by one request.
#[derive(Debug, Clone, Default)]
pub struct EventBatch {
    events: Vec<EventValue>,
}

impl EventBatch {
    /// Creates an empty batch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an event.
    pub fn push(&mut self, event: EventValue) -> &mut Self {
        self.events.push(event);
        self
    }

    /// Returns the number of events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Returns `true` if the batch holds no events.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Iterates the events in order.
    pub fn iter(&self) -> impl Iterator<Item = &EventValue> {
        self.events.iter()
    }
}

impl FromIterator<EventValue> for EventBatch {
    fn from_iter<I: IntoIterator<Item = EventValue>>(iter: I) -> Self {
        Self { events: iter.into_iter().collect() }
    }
}

/// Persists every event in `batch` and emits one notification naming them.
///
/// Event `i` (zero-based) is keyed by `derive_id(tx_timestamp, tx_id, i + 1)`.
/// The notification name is the JSON array of `Event.<action>.<id>` labels
/// and carries no payload. It is set only after every event is stored, so a
/// failed write leaves no notification behind. An empty batch writes
/// nothing and emits nothing.
///
/// # Errors
///
/// - [`ChaincodeError::Unparseable`](crate::ChaincodeError::Unparseable) if
///   the creator certificate cannot be read.
/// - Any storage error from the transaction context or an event write.
#[tracing::instrument(skip_all, fields(events = batch.len()))]
pub fn emit_events(store: EntityStore<'_>, batch: &EventBatch) -> ChaincodeResult<Vec<String>> {
    if batch.is_empty() {
        return Ok(Vec::new());
    }

    let stub = store.stub();
    let timestamp = stub.tx_timestamp()?;
    let creator = extract_organizational_unit(&stub.creator()?)?;

    let mut labels = Vec::with_capacity(batch.len());
    for (sequence, value) in (1u32..).zip(batch.iter()) {
        let id = derive_id(timestamp, stub.tx_id(), sequence)?;
        let event = Event::with_uuid(
            id,
            EventValue { timestamp: timestamp.seconds, creator: creator.clone(), ..value.clone() },
        );
        store.upsert(&event, &[], RoleType::default())?;
        labels.push(format!("{EVENT_NAMESPACE}.{}.{}", event.value.action, event.id()));
    }

    let name = serde_json::to_string(&labels)
        .map_err(|e| StorageError::persist_with_source("cannot encode event labels", e))?;
    stub.set_event(&name, None)?;

    tracing::debug!(%name, "emitted events");
    Ok(labels)
}
