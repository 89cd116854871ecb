//! Worker-pool scheduler across compilation units: a fixed pool of
//! `std::thread` workers pulling units off a shared queue and reporting
//! results back over an `std::sync::mpsc` channel. Codegen is CPU-bound,
//! not I/O-bound, so a plain OS-thread pool fits without pulling in an
//! async runtime (see DESIGN.md).

use std::sync::mpsc;
use std::sync::Arc;
use std::thread;

use home_cache::CacheStore;

use crate::driver::{compile_unit, UnitResult};
use crate::error::CompileError;
use crate::session::CompileSession;

/// One source file submitted to the scheduler.
pub struct CompileJob {
    pub unit_name: String,
    pub source: String,
}

pub struct JobResult {
    pub unit_name: String,
    pub result: Result<UnitResult, CompileError>,
}

/// Runs every job to completion across `worker_count` threads (clamped to
/// at least 1), returning results in the same order `jobs` was given
/// regardless of which thread finished first.
pub fn run_pool(jobs: Vec<CompileJob>, session: &CompileSession, cache: Option<Arc<CacheStore>>, worker_count: usize) -> Vec<JobResult> {
    let worker_count = worker_count.max(1).min(jobs.len().max(1));
    if jobs.is_empty() {
        return Vec::new();
    }

    let (job_tx, job_rx) = mpsc::channel::<(usize, CompileJob)>();
    let job_rx = Arc::new(std::sync::Mutex::new(job_rx));
    let (result_tx, result_rx) = mpsc::channel::<(usize, JobResult)>();

    let job_count = jobs.len();
    for (index, job) in jobs.into_iter().enumerate() {
        job_tx.send((index, job)).expect("receiver outlives every send in this scope");
    }
    drop(job_tx);

    thread::scope(|scope| {
        for _ in 0..worker_count {
            let job_rx = Arc::clone(&job_rx);
            let result_tx = result_tx.clone();
            let session = session.clone();
            let cache = cache.clone();
            scope.spawn(move || {
                loop {
                    let next = {
                        let rx = job_rx.lock().expect("job queue mutex is never poisoned by a panicking worker in practice");
                        rx.recv()
                    };
                    let Ok((index, job)) = next else { break };
                    let deps = Vec::new();
                    let result = compile_unit(&job.source, &session, cache.as_deref(), &deps);
                    let outcome = JobResult { unit_name: job.unit_name, result };
                    if result_tx.send((index, outcome)).is_err() {
                        break;
                    }
                }
            });
        }
        drop(result_tx);

        let mut slots: Vec<Option<JobResult>> = (0..job_count).map(|_| None).collect();
        for (index, outcome) in result_rx {
            slots[index] = Some(outcome);
        }
        slots.into_iter().map(|slot| slot.expect("every submitted job reports exactly one result")).collect()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runs_every_job_and_preserves_submission_order() {
        let session = CompileSession::default();
        let jobs = vec![
            CompileJob { unit_name: "a".to_string(), source: "fn main() -> i32 { return 1; }".to_string() },
            CompileJob { unit_name: "b".to_string(), source: "fn main() -> i32 { return 2; }".to_string() },
            CompileJob { unit_name: "c".to_string(), source: "fn main() -> i32 { return 3; }".to_string() },
        ];
        let results = run_pool(jobs, &session, None, 2);
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].unit_name, "a");
        assert_eq!(results[1].unit_name, "b");
        assert_eq!(results[2].unit_name, "c");
        for r in &results {
            assert!(r.result.is_ok());
        }
    }

    #[test]
    fn a_single_unit_with_a_parse_error_does_not_block_the_others() {
        let session = CompileSession::default();
        let jobs = vec![
            CompileJob { unit_name: "broken".to_string(), source: "fn main( {".to_string() },
            CompileJob { unit_name: "fine".to_string(), source: "fn main() -> i32 { return 1; }".to_string() },
        ];
        let results = run_pool(jobs, &session, None, 2);
        let broken = results[0].result.as_ref().unwrap();
        assert!(broken.object_bytes.is_none());
        assert!(!broken.diagnostics.is_empty());
        let fine = results[1].result.as_ref().unwrap();
        assert!(fine.object_bytes.is_some());
    }
}
