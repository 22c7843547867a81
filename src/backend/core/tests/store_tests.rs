//! Tests for the job store: identity, state machine, results and sweep.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use proptest::prelude::*;

use exportd_core::error::ErrorCode;
use exportd_core::jobs::{package_directory, ExportParams, FileKind, JobStatus, JobStore};

fn params() -> ExportParams {
    ExportParams {
        directory: "./out".to_string(),
        ..Default::default()
    }
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

// ============================================================================
// Identity
// ============================================================================

#[tokio::test]
async fn test_concurrent_creates_get_unique_ids() {
    let tmp = tempfile::tempdir().unwrap();
    let store = Arc::new(JobStore::new(tmp.path(), Duration::from_secs(3600)));

    let handles: Vec<_> = (0..50)
        .map(|_| {
            let store = Arc::clone(&store);
            tokio::spawn(async move { store.create_job(&params()).await.unwrap() })
        })
        .collect();

    let mut ids = HashSet::new();
    for handle in handles {
        assert!(ids.insert(handle.await.unwrap()));
    }
    assert_eq!(store.len(), 50);
    assert_eq!(store.list_jobs().len(), 50);
}

// ============================================================================
// Results
// ============================================================================

#[tokio::test]
async fn test_results_match_packaged_directory() {
    let tmp = tempfile::tempdir().unwrap();
    let store = JobStore::new(tmp.path(), Duration::from_secs(3600));
    let id = store.create_job(&params()).await.unwrap();
    let dir = store.job_dir(id).unwrap();

    std::fs::create_dir_all(dir.join("modules/queues")).unwrap();
    std::fs::write(dir.join("genesyscloud.tf.json"), "{}").unwrap();
    std::fs::write(dir.join("terraform.tfvars"), "a = 1").unwrap();
    std::fs::write(dir.join("modules/queues/export_errors.json"), "[]").unwrap();
    package_directory(&dir).await.unwrap();
    store.complete_job(id, true, None).unwrap();

    let results = store.get_job_results(id).await.unwrap();
    assert_eq!(results.export_directory, dir.display().to_string());

    let listed: Vec<(&str, FileKind)> = results.files.iter().map(|f| (f.name.as_str(), f.kind)).collect();
    assert_eq!(
        listed,
        vec![
            ("genesyscloud.tf.json", FileKind::Definition),
            ("modules/queues/export_errors.json", FileKind::Json),
            ("terraform.tfvars", FileKind::Definition),
        ]
    );

    let archive = store.get_job_files(id).await.unwrap();
    let archive = zip::ZipArchive::new(std::io::Cursor::new(archive)).unwrap();
    assert_eq!(archive.len(), results.files.len());
}

#[tokio::test]
async fn test_failed_job_has_no_results() {
    let tmp = tempfile::tempdir().unwrap();
    let store = JobStore::new(tmp.path(), Duration::from_secs(3600));
    let id = store.create_job(&params()).await.unwrap();

    store.complete_job(id, false, Some("boom".into())).unwrap();
    let job = store.get_job_status(id).unwrap();
    assert_eq!(job.status, JobStatus::Failed);
    assert_eq!(job.error_message.as_deref(), Some("boom"));
    assert!(job.completed_at.is_none());

    let err = store.get_job_results(id).await.unwrap_err();
    assert_eq!(err.code(), ErrorCode::JobNotCompleted);
}

// ============================================================================
// Sweep
// ============================================================================

#[tokio::test]
async fn test_sweep_ignores_status() {
    let tmp = tempfile::tempdir().unwrap();
    let store = JobStore::new(tmp.path(), Duration::from_secs(3600));

    let running = store.create_job(&params()).await.unwrap();
    store.update_job_progress(running, 50).unwrap();
    let done = store.create_job(&params()).await.unwrap();
    store.complete_job(done, true, None).unwrap();

    let cutoff = Utc::now() + chrono::Duration::seconds(1);
    assert_eq!(store.cleanup_jobs_created_before(cutoff).await, 2);
    assert!(store.is_empty());
    assert!(!tmp.path().join(running.to_string()).exists());
    assert!(!tmp.path().join(done.to_string()).exists());
}

#[tokio::test]
async fn test_sweep_keeps_recent_jobs() {
    let tmp = tempfile::tempdir().unwrap();
    let store = JobStore::new(tmp.path(), Duration::from_secs(3600));
    let id = store.create_job(&params()).await.unwrap();

    let cutoff = Utc::now() - chrono::Duration::minutes(5);
    assert_eq!(store.cleanup_jobs_created_before(cutoff).await, 0);
    assert!(store.job_dir(id).unwrap().is_dir());
}

#[tokio::test]
async fn test_sweep_removes_only_jobs_before_cutoff() {
    let tmp = tempfile::tempdir().unwrap();
    let store = JobStore::new(tmp.path(), Duration::from_secs(3600));

    let old = store.create_job(&params()).await.unwrap();
    let old_dir = store.job_dir(old).unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    let cutoff = Utc::now();
    tokio::time::sleep(Duration::from_millis(10)).await;
    let recent = store.create_job(&params()).await.unwrap();
    let recent_dir = store.job_dir(recent).unwrap();

    assert_eq!(store.cleanup_jobs_created_before(cutoff).await, 1);
    assert_eq!(store.len(), 1);
    assert_eq!(store.get_job_status(old).unwrap_err().code(), ErrorCode::JobNotFound);
    assert!(!old_dir.exists());
    assert_eq!(store.get_job_status(recent).unwrap().status, JobStatus::Pending);
    assert!(recent_dir.is_dir());
}

#[tokio::test]
async fn test_sweep_tolerates_missing_directory() {
    let tmp = tempfile::tempdir().unwrap();
    let store = JobStore::new(tmp.path(), Duration::from_secs(3600));
    let id = store.create_job(&params()).await.unwrap();
    std::fs::remove_dir_all(store.job_dir(id).unwrap()).unwrap();

    let cutoff = Utc::now() + chrono::Duration::seconds(1);
    assert_eq!(store.cleanup_jobs_created_before(cutoff).await, 1);
}

// ============================================================================
// State Machine
// ============================================================================

#[derive(Debug, Clone)]
enum Op {
    Progress(u8),
    Complete(bool),
    Cancel,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        any::<u8>().prop_map(Op::Progress),
        any::<bool>().prop_map(Op::Complete),
        Just(Op::Cancel),
    ]
}

proptest! {
    #[test]
    fn prop_terminal_states_are_final(ops in prop::collection::vec(op(), 1..24)) {
        let rt = runtime();
        let tmp = tempfile::tempdir().unwrap();
        let store = JobStore::new(tmp.path(), Duration::from_secs(3600));
        let id = rt.block_on(store.create_job(&params())).unwrap();

        let mut terminal: Option<JobStatus> = None;
        let mut last_progress = 0u8;

        for op in ops {
            match op {
                Op::Progress(p) => store.update_job_progress(id, p).unwrap(),
                Op::Complete(ok) => {
                    store.complete_job(id, ok, Some("failed".into())).unwrap();
                }
                Op::Cancel => {
                    store.cancel_job(id).unwrap();
                }
            }

            let job = store.get_job_status(id).unwrap();
            prop_assert!(job.progress <= 100);

            match terminal {
                Some(status) => prop_assert_eq!(job.status, status),
                None => {
                    prop_assert!(job.progress >= last_progress);
                    if job.status.is_terminal() {
                        terminal = Some(job.status);
                    }
                }
            }
            if job.status == JobStatus::Completed {
                prop_assert_eq!(job.progress, 100);
            }
            last_progress = job.progress;
        }
    }
}
