use super::*;
use crate::state::test_helpers::t0;
use crate::store::MemoryStore;
use time::Duration;
use time::macros::date;

const PHOTO: &str = "data:image/jpeg;base64,/9j/4AAQSkZJRg==";
const MAX: usize = 1024;

fn submission(name: &str, reg_no: &str) -> Submission {
    Submission { name: name.into(), reg_no: reg_no.into(), photo: Some(PHOTO.into()) }
}

fn reg(raw: &str) -> RegNo {
    RegNo::parse(raw).unwrap()
}

// =============================================================================
// validation
// =============================================================================

#[test]
fn photo_shapes() {
    assert!(validate_photo(PHOTO, MAX).is_ok());
    assert!(validate_photo("data:image/svg+xml;base64,PHN2Zz4=", MAX).is_ok());
    assert!(matches!(validate_photo("http://x/y.jpg", MAX), Err(AttendanceError::InvalidPhoto(_))));
    assert!(matches!(validate_photo("data:image/png,raw", MAX), Err(AttendanceError::InvalidPhoto(_))));
    assert!(matches!(validate_photo("data:image/;base64,AAAA", MAX), Err(AttendanceError::InvalidPhoto(_))));
    assert!(matches!(validate_photo("data:image/png;base64,", MAX), Err(AttendanceError::InvalidPhoto(_))));
    assert!(matches!(validate_photo("data:image/png;base64,<>", MAX), Err(AttendanceError::InvalidPhoto(_))));
    assert!(matches!(validate_photo(PHOTO, 10), Err(AttendanceError::InvalidPhoto("photo is too large"))));
}

#[tokio::test]
async fn invalid_submissions_store_nothing() {
    let store = MemoryStore::new();
    let lock = DeviceLock::default();

    let cases = [
        (submission("Ada", "  "), "MissingRegNo"),
        (submission("  ", "A1"), "MissingName"),
        (Submission { photo: None, ..submission("Ada", "A1") }, "MissingPhoto"),
        (Submission { photo: Some("nope".into()), ..submission("Ada", "A1") }, "InvalidPhoto"),
    ];
    for (sub, expected) in cases {
        let err = submit_attendance(&store, &lock, sub, t0(), MAX).await.unwrap_err();
        let matched = match expected {
            "MissingRegNo" => matches!(err, AttendanceError::MissingRegNo),
            "MissingName" => matches!(err, AttendanceError::MissingName),
            "MissingPhoto" => matches!(err, AttendanceError::MissingPhoto),
            _ => matches!(err, AttendanceError::InvalidPhoto(_)),
        };
        assert!(matched, "expected {expected}, got {err:?}");
    }
    assert!(store.list_attendance(t0().date()).await.unwrap().is_empty());
}

// =============================================================================
// submission
// =============================================================================

#[tokio::test]
async fn first_submission_records_and_binds_lock() {
    let store = MemoryStore::new();
    let (outcome, lock) = submit_attendance(&store, &DeviceLock::default(), submission(" Ada ", "csc-1"), t0(), MAX)
        .await
        .unwrap();

    let SubmitOutcome::Recorded(record) = outcome else {
        panic!("expected a new record");
    };
    assert_eq!(record.reg_no, reg("CSC-1"));
    assert_eq!(record.name, "Ada");
    assert_eq!(record.date, date!(2026 - 10 - 16));
    assert_eq!(record.time, "09:00:00");
    assert_eq!(record.face.as_deref(), Some(PHOTO));
    assert_eq!(lock.bound(), Some(&reg("CSC-1")));
}

#[tokio::test]
async fn second_submission_same_day_stores_one_record() {
    let store = MemoryStore::new();
    let (_, lock) = submit_attendance(&store, &DeviceLock::default(), submission("Ada", "A1"), t0(), MAX)
        .await
        .unwrap();
    let (again, _) = submit_attendance(&store, &lock, submission("Ada", "A1"), t0() + Duration::hours(1), MAX)
        .await
        .unwrap();

    assert!(matches!(&again, SubmitOutcome::AlreadyRecorded(r) if r.time == "09:00:00"));
    assert_eq!(store.list_attendance(t0().date()).await.unwrap().len(), 1);
}

#[tokio::test]
async fn locked_device_rejects_other_student() {
    let store = MemoryStore::new();
    let lock = DeviceLock::bound_to(reg("A1"));
    let err = submit_attendance(&store, &lock, submission("Bea", "B2"), t0(), MAX).await.unwrap_err();
    assert!(matches!(err, AttendanceError::Locked(DeviceLockError::Locked { ref bound }) if *bound == reg("A1")));
    assert!(store.list_attendance(t0().date()).await.unwrap().is_empty());

    let mut lock = lock;
    lock.reset();
    assert!(submit_attendance(&store, &lock, submission("Bea", "B2"), t0(), MAX).await.is_ok());
}

// =============================================================================
// staff operations
// =============================================================================

#[tokio::test]
async fn clear_requires_exact_confirmation() {
    let store = MemoryStore::new();
    submit_attendance(&store, &DeviceLock::default(), submission("Ada", "A1"), t0(), MAX)
        .await
        .unwrap();

    for bad in ["", "delete", " DELETE", "yes"] {
        assert!(matches!(clear_attendance(&store, bad).await, Err(AttendanceError::ConfirmationRequired)));
    }
    assert_eq!(list_attendance(&store, t0().date()).await.unwrap().len(), 1);
    assert_eq!(clear_attendance(&store, "DELETE").await.unwrap(), 1);
    assert!(list_attendance(&store, t0().date()).await.unwrap().is_empty());
}
