use chrono::{DateTime, Duration, Utc};

use lightq_core::MessageId;

/// Predicate a [`DurableStore`](crate::DurableStore) evaluates against the
/// live collection. Every CAS transition in the engine is expressed as one
/// of these, not as an optimistic read-then-write at the caller.
#[derive(Debug, Clone)]
pub enum Filter {
    /// `_id = id`.
    ById(MessageId),
    /// `_id = id AND consumed = false`.
    ByIdUnconsumed(MessageId),
    /// `_id = id AND consumed = true`.
    ByIdConsumed(MessageId),
    /// `_id = id AND consumed = false AND reservedUntil > now`.
    ByIdReserved { id: MessageId, now: DateTime<Utc> },
    /// `_id = id AND` reservable predicate (see [`Filter::Reservable`]).
    ByIdReservable { id: MessageId, now: DateTime<Utc> },
    /// `consumed = false AND (reservedUntil IS NULL OR reservedUntil <= now)
    /// AND (scheduledAt IS NULL OR scheduledAt <= now)`, sorted by
    /// `createdAt asc` by the caller.
    Reservable { now: DateTime<Utc> },
    /// `scheduledAt <= now AND consumed = false`, used by the promoter.
    DueScheduled { now: DateTime<Utc> },
    /// `_id IN ids AND consumed = false`, used by batch ack.
    ByIdsUnconsumed(Vec<MessageId>),
    /// `consumed = <bool>`, used by the admin view.
    Consumed(bool),
    /// Unfiltered — used by the admin view's "all" mode.
    Any,
}

/// Atomic mutation applied by a CAS operation. Each variant corresponds to
/// exactly one transition in the ack state machine or reservation engine.
#[derive(Debug, Clone)]
pub enum Update {
    /// `deliveryCount += 1; reservedUntil = now + visibility_timeout;
    /// lastDeliveryAt = now`.
    Reserve {
        now: DateTime<Utc>,
        visibility_timeout: Duration,
    },
    /// `consumed = true; reservedUntil = null`.
    Ack { now: DateTime<Utc> },
    /// `reservedUntil = now; lastError = reason`.
    Nack {
        now: DateTime<Utc>,
        reason: Option<String>,
    },
    /// `reservedUntil = until`.
    Extend { until: DateTime<Utc> },
    /// `scheduledAt = null` (the promoter has activated this message).
    UnsetScheduled,
    /// `consumed = true; reservedUntil = null` (the live side of a DLQ move).
    MoveToDlq,
}

/// Sort order for [`DurableStore::find`](crate::DurableStore::find).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sort {
    CreatedAtAsc,
}
