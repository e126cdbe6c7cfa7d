//! Persistence boundary.
//!
//! DESIGN
//! ======
//! Services talk to a `Store` trait object rather than a pool so the same
//! logic runs against Postgres in production and against `MemoryStore` in
//! tests and local demos. Every mutating call publishes a `StoreEvent` on a
//! broadcast channel; dashboards subscribe to it instead of polling.
//!
//! CONSISTENCY
//! ===========
//! Last write wins everywhere except attendance, which is insert-if-absent on
//! `(reg_no, date)`. No operation spans more than one key atomically.

pub mod memory;
pub mod model;
pub mod postgres;

use async_trait::async_trait;
use serde::Serialize;
use time::{Date, OffsetDateTime};
use tokio::sync::broadcast;

pub use memory::MemoryStore;
pub use model::{
    AttendanceRecord, InsertOutcome, PasswordConfig, RegNo, RegNoError, ResetCode, StaffSession, Student,
};
pub use postgres::PgStore;

const EVENT_CHANNEL_CAPACITY: usize = 64;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("malformed {entity} row: {reason}")]
    Malformed { entity: &'static str, reason: String },
}

/// Change notification published after every successful write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum StoreEvent {
    StudentsChanged,
    AttendanceChanged,
    PasswordChanged,
}

#[async_trait]
pub trait Store: Send + Sync {
    // --- students ---
    async fn upsert_student(&self, student: &Student) -> Result<(), StoreError>;
    async fn get_student(&self, reg_no: &RegNo) -> Result<Option<Student>, StoreError>;
    /// All students in the order they were added.
    async fn list_students(&self) -> Result<Vec<Student>, StoreError>;
    /// Returns `false` when no such student existed.
    async fn remove_student(&self, reg_no: &RegNo) -> Result<bool, StoreError>;

    // --- attendance ---
    async fn insert_attendance(&self, record: &AttendanceRecord) -> Result<InsertOutcome, StoreError>;
    /// Records for one date, most recent first.
    async fn list_attendance(&self, date: Date) -> Result<Vec<AttendanceRecord>, StoreError>;
    /// Records with `from <= date <= to`, oldest date first.
    async fn list_attendance_range(&self, from: Date, to: Date) -> Result<Vec<AttendanceRecord>, StoreError>;
    /// Delete every attendance record, returning how many were removed.
    async fn clear_attendance(&self) -> Result<u64, StoreError>;

    // --- staff password ---
    async fn password_config(&self) -> Result<Option<PasswordConfig>, StoreError>;
    async fn put_password_config(&self, config: &PasswordConfig) -> Result<(), StoreError>;

    // --- reset codes ---
    /// Replace any live code for `code.email`.
    async fn put_reset_code(&self, code: &ResetCode) -> Result<(), StoreError>;
    async fn reset_code(&self, email: &str) -> Result<Option<ResetCode>, StoreError>;
    /// Settle one guess against the live code for `email` in a single step.
    ///
    /// A code that is expired or has used up `max_attempts` is discarded and
    /// never matches. A miss costs one attempt and discards the code when the
    /// cap is reached. A match leaves the counter alone and, with `consume`,
    /// removes the code so it cannot be replayed. Concurrent guesses are
    /// serialized: no guess is compared once earlier misses exhausted the cap.
    async fn check_reset_code(
        &self,
        email: &str,
        code_hash: &str,
        now: OffsetDateTime,
        max_attempts: u32,
        consume: bool,
    ) -> Result<bool, StoreError>;
    async fn delete_reset_code(&self, email: &str) -> Result<(), StoreError>;

    // --- staff sessions ---
    async fn create_session(&self, session: &StaffSession) -> Result<(), StoreError>;
    async fn session(&self, token: &str) -> Result<Option<StaffSession>, StoreError>;
    async fn delete_session(&self, token: &str) -> Result<(), StoreError>;
    async fn delete_all_sessions(&self) -> Result<(), StoreError>;

    /// Subscribe to change notifications.
    fn subscribe(&self) -> broadcast::Receiver<StoreEvent>;
}

pub(crate) fn event_channel() -> broadcast::Sender<StoreEvent> {
    broadcast::channel(EVENT_CHANNEL_CAPACITY).0
}

/// Publish an event; having no subscribers is not an error.
pub(crate) fn publish(events: &broadcast::Sender<StoreEvent>, event: StoreEvent) {
    let _ = events.send(event);
}
