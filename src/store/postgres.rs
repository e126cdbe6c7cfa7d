//! Postgres-backed store.
//!
//! Tables are created by the migrations in `src/db/migrations`. Rows are
//! decoded field by field into the typed records; a row whose key fails
//! registration-number validation is reported as `StoreError::Malformed`.
//!
//! Change events are published in-process only, so a feed subscriber sees
//! writes made through this server instance.

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use time::{Date, OffsetDateTime};
use tokio::sync::broadcast;

use super::{
    AttendanceRecord, InsertOutcome, PasswordConfig, RegNo, ResetCode, StaffSession, Store, StoreError, StoreEvent,
    Student, event_channel, publish,
};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
    events: broadcast::Sender<StoreEvent>,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool, events: event_channel() }
    }
}

fn decode_reg_no(row: &PgRow, entity: &'static str) -> Result<RegNo, StoreError> {
    let raw: String = row.try_get("reg_no")?;
    RegNo::parse(&raw).map_err(|e| StoreError::Malformed { entity, reason: e.to_string() })
}

fn student_from_row(row: &PgRow) -> Result<Student, StoreError> {
    Ok(Student {
        reg_no: decode_reg_no(row, "student")?,
        name: row.try_get("name")?,
        email: row.try_get("email")?,
        parent_email: row.try_get("parent_email")?,
        added: row.try_get("added")?,
    })
}

fn attendance_from_row(row: &PgRow) -> Result<AttendanceRecord, StoreError> {
    Ok(AttendanceRecord {
        reg_no: decode_reg_no(row, "attendance")?,
        name: row.try_get("name")?,
        date: row.try_get("attendance_date")?,
        time: row.try_get("time_of_day")?,
        face: row.try_get("face")?,
        recorded_at: row.try_get("recorded_at")?,
    })
}

fn reset_code_from_row(row: &PgRow) -> Result<ResetCode, StoreError> {
    let attempts: i32 = row.try_get("attempts")?;
    Ok(ResetCode {
        email: row.try_get("email")?,
        code_hash: row.try_get("code_hash")?,
        expires_at: row.try_get("expires_at")?,
        attempts: u32::try_from(attempts)
            .map_err(|_| StoreError::Malformed { entity: "reset code", reason: format!("attempts = {attempts}") })?,
    })
}

const ATTENDANCE_COLUMNS: &str = "reg_no, name, attendance_date, time_of_day, face, recorded_at";
const INSERT_ATTEMPTS: usize = 3;

impl PgStore {
    /// Insert unless the `(reg_no, date)` key is taken. Returns whether a row was written.
    async fn try_insert_attendance(&self, record: &AttendanceRecord) -> Result<bool, StoreError> {
        let inserted = sqlx::query(
            r"INSERT INTO attendance (reg_no, attendance_date, name, time_of_day, face, recorded_at)
              VALUES ($1, $2, $3, $4, $5, $6)
              ON CONFLICT (reg_no, attendance_date) DO NOTHING
              RETURNING reg_no",
        )
        .bind(record.reg_no.as_str())
        .bind(record.date)
        .bind(&record.name)
        .bind(&record.time)
        .bind(&record.face)
        .bind(record.recorded_at)
        .fetch_optional(&self.pool)
        .await?;
        Ok(inserted.is_some())
    }

    async fn find_attendance(&self, record: &AttendanceRecord) -> Result<Option<AttendanceRecord>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {ATTENDANCE_COLUMNS} FROM attendance WHERE reg_no = $1 AND attendance_date = $2"
        ))
        .bind(record.reg_no.as_str())
        .bind(record.date)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(attendance_from_row).transpose()
    }
}

#[async_trait]
impl Store for PgStore {
    async fn upsert_student(&self, student: &Student) -> Result<(), StoreError> {
        sqlx::query(
            r"INSERT INTO students (reg_no, name, email, parent_email, added)
              VALUES ($1, $2, $3, $4, $5)
              ON CONFLICT (reg_no) DO UPDATE
              SET name = EXCLUDED.name,
                  email = EXCLUDED.email,
                  parent_email = EXCLUDED.parent_email,
                  added = EXCLUDED.added",
        )
        .bind(student.reg_no.as_str())
        .bind(&student.name)
        .bind(&student.email)
        .bind(&student.parent_email)
        .bind(student.added)
        .execute(&self.pool)
        .await?;
        publish(&self.events, StoreEvent::StudentsChanged);
        Ok(())
    }

    async fn get_student(&self, reg_no: &RegNo) -> Result<Option<Student>, StoreError> {
        let row = sqlx::query("SELECT reg_no, name, email, parent_email, added FROM students WHERE reg_no = $1")
            .bind(reg_no.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(student_from_row).transpose()
    }

    async fn list_students(&self) -> Result<Vec<Student>, StoreError> {
        let rows = sqlx::query("SELECT reg_no, name, email, parent_email, added FROM students ORDER BY added, seq")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(student_from_row).collect()
    }

    async fn remove_student(&self, reg_no: &RegNo) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM students WHERE reg_no = $1")
            .bind(reg_no.as_str())
            .execute(&self.pool)
            .await?;
        let removed = result.rows_affected() > 0;
        if removed {
            publish(&self.events, StoreEvent::StudentsChanged);
        }
        Ok(removed)
    }

    async fn insert_attendance(&self, record: &AttendanceRecord) -> Result<InsertOutcome, StoreError> {
        // A concurrent clear can delete the conflicting row between the two
        // statements; insert again when that happens.
        for _ in 0..INSERT_ATTEMPTS {
            if self.try_insert_attendance(record).await? {
                publish(&self.events, StoreEvent::AttendanceChanged);
                return Ok(InsertOutcome::Inserted);
            }
            if let Some(existing) = self.find_attendance(record).await? {
                return Ok(InsertOutcome::Existing(existing));
            }
        }
        Err(StoreError::Database(sqlx::Error::RowNotFound))
    }

    async fn list_attendance(&self, date: Date) -> Result<Vec<AttendanceRecord>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {ATTENDANCE_COLUMNS} FROM attendance WHERE attendance_date = $1 ORDER BY recorded_at DESC"
        ))
        .bind(date)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(attendance_from_row).collect()
    }

    async fn list_attendance_range(&self, from: Date, to: Date) -> Result<Vec<AttendanceRecord>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {ATTENDANCE_COLUMNS} FROM attendance
             WHERE attendance_date BETWEEN $1 AND $2
             ORDER BY attendance_date, recorded_at"
        ))
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(attendance_from_row).collect()
    }

    async fn clear_attendance(&self) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM attendance")
            .execute(&self.pool)
            .await?;
        publish(&self.events, StoreEvent::AttendanceChanged);
        Ok(result.rows_affected())
    }

    async fn password_config(&self) -> Result<Option<PasswordConfig>, StoreError> {
        let row = sqlx::query("SELECT hash, email, last_updated FROM admin_password WHERE id = 1")
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(PasswordConfig {
            hash: row.try_get("hash")?,
            email: row.try_get("email")?,
            last_updated: row.try_get("last_updated")?,
        }))
    }

    async fn put_password_config(&self, config: &PasswordConfig) -> Result<(), StoreError> {
        sqlx::query(
            r"INSERT INTO admin_password (id, hash, email, last_updated)
              VALUES (1, $1, $2, $3)
              ON CONFLICT (id) DO UPDATE
              SET hash = EXCLUDED.hash, email = EXCLUDED.email, last_updated = EXCLUDED.last_updated",
        )
        .bind(&config.hash)
        .bind(&config.email)
        .bind(config.last_updated)
        .execute(&self.pool)
        .await?;
        publish(&self.events, StoreEvent::PasswordChanged);
        Ok(())
    }

    async fn put_reset_code(&self, code: &ResetCode) -> Result<(), StoreError> {
        let attempts = i32::try_from(code.attempts).unwrap_or(i32::MAX);
        sqlx::query(
            r"INSERT INTO password_reset_codes (email, code_hash, expires_at, attempts)
              VALUES ($1, $2, $3, $4)
              ON CONFLICT (email) DO UPDATE
              SET code_hash = EXCLUDED.code_hash,
                  expires_at = EXCLUDED.expires_at,
                  attempts = EXCLUDED.attempts",
        )
        .bind(&code.email)
        .bind(&code.code_hash)
        .bind(code.expires_at)
        .bind(attempts)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn reset_code(&self, email: &str) -> Result<Option<ResetCode>, StoreError> {
        let row = sqlx::query("SELECT email, code_hash, expires_at, attempts FROM password_reset_codes WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(reset_code_from_row).transpose()
    }

    async fn check_reset_code(
        &self,
        email: &str,
        code_hash: &str,
        now: OffsetDateTime,
        max_attempts: u32,
        consume: bool,
    ) -> Result<bool, StoreError> {
        let max_attempts = i32::try_from(max_attempts).unwrap_or(i32::MAX);
        // The row lock taken by UPDATE serializes concurrent guesses, and the
        // attempts predicate is re-evaluated against the locked row.
        let row = sqlx::query(
            r"UPDATE password_reset_codes
              SET attempts = attempts + CASE WHEN code_hash = $2 THEN 0 ELSE 1 END
              WHERE email = $1 AND expires_at > $3 AND attempts < $4
              RETURNING code_hash = $2 AS matched, attempts",
        )
        .bind(email)
        .bind(code_hash)
        .bind(now)
        .bind(max_attempts)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            sqlx::query(
                "DELETE FROM password_reset_codes WHERE email = $1 AND (expires_at <= $2 OR attempts >= $3)",
            )
            .bind(email)
            .bind(now)
            .bind(max_attempts)
            .execute(&self.pool)
            .await?;
            return Ok(false);
        };

        let matched: bool = row.try_get("matched")?;
        if !matched {
            let attempts: i32 = row.try_get("attempts")?;
            if attempts >= max_attempts {
                sqlx::query("DELETE FROM password_reset_codes WHERE email = $1 AND attempts >= $2")
                    .bind(email)
                    .bind(max_attempts)
                    .execute(&self.pool)
                    .await?;
            }
            return Ok(false);
        }
        if !consume {
            return Ok(true);
        }

        // Only one concurrent consumer gets the row back.
        let consumed = sqlx::query(
            "DELETE FROM password_reset_codes WHERE email = $1 AND code_hash = $2 RETURNING email",
        )
        .bind(email)
        .bind(code_hash)
        .fetch_optional(&self.pool)
        .await?;
        Ok(consumed.is_some())
    }

    async fn delete_reset_code(&self, email: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM password_reset_codes WHERE email = $1")
            .bind(email)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn create_session(&self, session: &StaffSession) -> Result<(), StoreError> {
        sqlx::query("INSERT INTO staff_sessions (token, created_at, expires_at) VALUES ($1, $2, $3)")
            .bind(&session.token)
            .bind(session.created_at)
            .bind(session.expires_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn session(&self, token: &str) -> Result<Option<StaffSession>, StoreError> {
        let row = sqlx::query("SELECT token, created_at, expires_at FROM staff_sessions WHERE token = $1")
            .bind(token)
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        Ok(Some(StaffSession {
            token: row.try_get("token")?,
            created_at: row.try_get("created_at")?,
            expires_at: row.try_get("expires_at")?,
        }))
    }

    async fn delete_session(&self, token: &str) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM staff_sessions WHERE token = $1")
            .bind(token)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_all_sessions(&self) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM staff_sessions")
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }
}

#[cfg(all(test, feature = "live-db-tests"))]
#[path = "postgres_test.rs"]
mod tests;
