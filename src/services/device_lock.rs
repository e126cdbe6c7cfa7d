//! Device lock — binds one client session to one registration number.
//!
//! The first successful submission binds the lock; later submissions for a
//! different student from the same client are refused until the lock is
//! reset. Routes persist the binding in the `device_lock` cookie. This only
//! discourages submitting for friends from one phone; it is not access
//! control, since clearing cookies clears the lock.

use serde::Serialize;

use crate::store::RegNo;

pub const DEVICE_LOCK_COOKIE: &str = "device_lock";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeviceLockError {
    #[error("this device is locked to {bound}")]
    Locked { bound: RegNo },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeviceLock {
    bound: Option<RegNo>,
}

impl DeviceLock {
    #[must_use]
    pub fn bound_to(reg_no: RegNo) -> Self {
        Self { bound: Some(reg_no) }
    }

    /// Rebuild the lock from a cookie value. Unparsable values are treated
    /// as unbound.
    #[must_use]
    pub fn from_cookie(value: Option<&str>) -> Self {
        Self { bound: value.and_then(|v| RegNo::parse(v).ok()) }
    }

    #[must_use]
    pub fn bound(&self) -> Option<&RegNo> {
        self.bound.as_ref()
    }

    /// # Errors
    ///
    /// [`DeviceLockError::Locked`] when bound to a different student.
    pub fn check(&self, reg_no: &RegNo) -> Result<(), DeviceLockError> {
        match &self.bound {
            Some(bound) if bound != reg_no => Err(DeviceLockError::Locked { bound: bound.clone() }),
            _ => Ok(()),
        }
    }

    pub fn reset(&mut self) {
        self.bound = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reg(raw: &str) -> RegNo {
        RegNo::parse(raw).unwrap()
    }

    #[test]
    fn unbound_accepts_anyone() {
        assert!(DeviceLock::default().check(&reg("A1")).is_ok());
    }

    #[test]
    fn bound_rejects_other_students_only() {
        let lock = DeviceLock::bound_to(reg("A1"));
        assert!(lock.check(&reg("a1")).is_ok());
        assert_eq!(lock.check(&reg("B2")), Err(DeviceLockError::Locked { bound: reg("A1") }));
    }

    #[test]
    fn reset_clears_binding() {
        let mut lock = DeviceLock::bound_to(reg("A1"));
        lock.reset();
        assert_eq!(lock.bound(), None);
        assert!(lock.check(&reg("B2")).is_ok());
    }

    #[test]
    fn from_cookie_ignores_garbage() {
        assert_eq!(DeviceLock::from_cookie(Some("a1")).bound(), Some(&reg("A1")));
        assert_eq!(DeviceLock::from_cookie(Some("<script>")).bound(), None);
        assert_eq!(DeviceLock::from_cookie(None), DeviceLock::default());
    }
}
