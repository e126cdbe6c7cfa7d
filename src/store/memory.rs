//! In-process store.
//!
//! Backs the test suite and `STORE_BACKEND=memory` demo runs. State lives in
//! one `RwLock`ed struct; nothing survives a restart.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use time::{Date, OffsetDateTime};
use tokio::sync::{RwLock, broadcast};

use super::{
    AttendanceRecord, InsertOutcome, PasswordConfig, RegNo, ResetCode, StaffSession, Store, StoreError, StoreEvent,
    Student, event_channel, publish,
};

#[derive(Default)]
struct Inner {
    students: HashMap<RegNo, Student>,
    /// Insertion sequence per student key, for stable ordering on ties.
    student_seq: HashMap<RegNo, u64>,
    next_seq: u64,
    attendance: BTreeMap<(RegNo, Date), AttendanceRecord>,
    password: Option<PasswordConfig>,
    reset_codes: HashMap<String, ResetCode>,
    sessions: HashMap<String, StaffSession>,
}

#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<RwLock<Inner>>,
    events: broadcast::Sender<StoreEvent>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self { inner: Arc::new(RwLock::new(Inner::default())), events: event_channel() }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn upsert_student(&self, student: &Student) -> Result<(), StoreError> {
        {
            let mut inner = self.inner.write().await;
            if !inner.student_seq.contains_key(&student.reg_no) {
                let seq = inner.next_seq;
                inner.next_seq += 1;
                inner.student_seq.insert(student.reg_no.clone(), seq);
            }
            inner.students.insert(student.reg_no.clone(), student.clone());
        }
        publish(&self.events, StoreEvent::StudentsChanged);
        Ok(())
    }

    async fn get_student(&self, reg_no: &RegNo) -> Result<Option<Student>, StoreError> {
        Ok(self.inner.read().await.students.get(reg_no).cloned())
    }

    async fn list_students(&self) -> Result<Vec<Student>, StoreError> {
        let inner = self.inner.read().await;
        let mut students: Vec<&Student> = inner.students.values().collect();
        students.sort_by_key(|s| (s.added, inner.student_seq.get(&s.reg_no).copied().unwrap_or(u64::MAX)));
        Ok(students.into_iter().cloned().collect())
    }

    async fn remove_student(&self, reg_no: &RegNo) -> Result<bool, StoreError> {
        let removed = {
            let mut inner = self.inner.write().await;
            inner.student_seq.remove(reg_no);
            inner.students.remove(reg_no).is_some()
        };
        if removed {
            publish(&self.events, StoreEvent::StudentsChanged);
        }
        Ok(removed)
    }

    async fn insert_attendance(&self, record: &AttendanceRecord) -> Result<InsertOutcome, StoreError> {
        let key = (record.reg_no.clone(), record.date);
        {
            let mut inner = self.inner.write().await;
            if let Some(existing) = inner.attendance.get(&key) {
                return Ok(InsertOutcome::Existing(existing.clone()));
            }
            inner.attendance.insert(key, record.clone());
        }
        publish(&self.events, StoreEvent::AttendanceChanged);
        Ok(InsertOutcome::Inserted)
    }

    async fn list_attendance(&self, date: Date) -> Result<Vec<AttendanceRecord>, StoreError> {
        let inner = self.inner.read().await;
        let mut records: Vec<AttendanceRecord> = inner
            .attendance
            .values()
            .filter(|r| r.date == date)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));
        Ok(records)
    }

    async fn list_attendance_range(&self, from: Date, to: Date) -> Result<Vec<AttendanceRecord>, StoreError> {
        let inner = self.inner.read().await;
        let mut records: Vec<AttendanceRecord> = inner
            .attendance
            .values()
            .filter(|r| r.date >= from && r.date <= to)
            .cloned()
            .collect();
        records.sort_by(|a, b| a.date.cmp(&b.date).then(a.recorded_at.cmp(&b.recorded_at)));
        Ok(records)
    }

    async fn clear_attendance(&self) -> Result<u64, StoreError> {
        let removed = {
            let mut inner = self.inner.write().await;
            let n = inner.attendance.len() as u64;
            inner.attendance.clear();
            n
        };
        publish(&self.events, StoreEvent::AttendanceChanged);
        Ok(removed)
    }

    async fn password_config(&self) -> Result<Option<PasswordConfig>, StoreError> {
        Ok(self.inner.read().await.password.clone())
    }

    async fn put_password_config(&self, config: &PasswordConfig) -> Result<(), StoreError> {
        self.inner.write().await.password = Some(config.clone());
        publish(&self.events, StoreEvent::PasswordChanged);
        Ok(())
    }

    async fn put_reset_code(&self, code: &ResetCode) -> Result<(), StoreError> {
        self.inner
            .write()
            .await
            .reset_codes
            .insert(code.email.clone(), code.clone());
        Ok(())
    }

    async fn reset_code(&self, email: &str) -> Result<Option<ResetCode>, StoreError> {
        Ok(self.inner.read().await.reset_codes.get(email).cloned())
    }

    async fn check_reset_code(
        &self,
        email: &str,
        code_hash: &str,
        now: OffsetDateTime,
        max_attempts: u32,
        consume: bool,
    ) -> Result<bool, StoreError> {
        let mut inner = self.inner.write().await;
        let Some(code) = inner.reset_codes.get_mut(email) else {
            return Ok(false);
        };
        if code.expires_at <= now || code.attempts >= max_attempts {
            inner.reset_codes.remove(email);
            return Ok(false);
        }
        if code.code_hash == code_hash {
            if consume {
                inner.reset_codes.remove(email);
            }
            return Ok(true);
        }
        code.attempts += 1;
        if code.attempts >= max_attempts {
            inner.reset_codes.remove(email);
        }
        Ok(false)
    }

    async fn delete_reset_code(&self, email: &str) -> Result<(), StoreError> {
        self.inner.write().await.reset_codes.remove(email);
        Ok(())
    }

    async fn create_session(&self, session: &StaffSession) -> Result<(), StoreError> {
        self.inner
            .write()
            .await
            .sessions
            .insert(session.token.clone(), session.clone());
        Ok(())
    }

    async fn session(&self, token: &str) -> Result<Option<StaffSession>, StoreError> {
        Ok(self.inner.read().await.sessions.get(token).cloned())
    }

    async fn delete_session(&self, token: &str) -> Result<(), StoreError> {
        self.inner.write().await.sessions.remove(token);
        Ok(())
    }

    async fn delete_all_sessions(&self) -> Result<(), StoreError> {
        self.inner.write().await.sessions.clear();
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
#[path = "memory_test.rs"]
mod tests;
