//! Batch fault studies.
//!
//! Independent `(snapshot, case)` jobs fan out over a rayon thread pool.
//! Jobs share snapshots read-only through `Arc`; a failing job is recorded
//! and does not stop the others.

use std::sync::Arc;

use ikss_core::{Network, ScResult};
#[cfg(feature = "parallel")]
use rayon::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::ShortCircuitConfig;
use crate::short_circuit::{FaultCase, ResultSet, ShortCircuitCalculator};

/// One calculation of a study.
#[derive(Debug, Clone)]
pub struct FaultStudyJob {
    pub job_id: String,
    pub network: Arc<Network>,
    pub case: FaultCase,
}

impl FaultStudyJob {
    pub fn new(job_id: impl Into<String>, network: Arc<Network>, case: FaultCase) -> Self {
        Self {
            job_id: job_id.into(),
            network,
            case,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FaultStudyRecord {
    pub job_id: String,
    pub case: FaultCase,
    /// "ok" or "error"
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ResultSet>,
}

impl FaultStudyRecord {
    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

/// Success/failure counts plus every job record, in job order.
#[derive(Debug, Clone, Serialize)]
pub struct FaultStudySummary {
    pub success: usize,
    pub failure: usize,
    pub jobs: Vec<FaultStudyRecord>,
}

/// Run all jobs with `threads` workers (0 picks the CPU count).
pub fn run_fault_study(
    jobs: &[FaultStudyJob],
    config: &ShortCircuitConfig,
    threads: usize,
) -> ScResult<FaultStudySummary> {
    config.validate()?;
    let calculator = ShortCircuitCalculator::new().with_config(config.clone());

    let records = execute(jobs, &calculator, threads)?;

    let success = records.iter().filter(|record| record.is_ok()).count();
    let failure = records.len() - success;
    info!(jobs = records.len(), success, failure, "fault study finished");
    Ok(FaultStudySummary {
        success,
        failure,
        jobs: records,
    })
}

#[cfg(feature = "parallel")]
fn execute(
    jobs: &[FaultStudyJob],
    calculator: &ShortCircuitCalculator,
    threads: usize,
) -> ScResult<Vec<FaultStudyRecord>> {
    let thread_count = if threads == 0 {
        num_cpus::get()
    } else {
        threads
    };
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(thread_count)
        .build()
        .map_err(|err| {
            ikss_core::ScError::Other(format!("building thread pool for fault study: {err}"))
        })?;

    Ok(pool.install(|| {
        jobs.par_iter()
            .map(|job| run_job(job, calculator))
            .collect()
    }))
}

#[cfg(not(feature = "parallel"))]
fn execute(
    jobs: &[FaultStudyJob],
    calculator: &ShortCircuitCalculator,
    _threads: usize,
) -> ScResult<Vec<FaultStudyRecord>> {
    Ok(jobs.iter().map(|job| run_job(job, calculator)).collect())
}

fn run_job(job: &FaultStudyJob, calculator: &ShortCircuitCalculator) -> FaultStudyRecord {
    let (status, error, result) = match calculator.compute(&job.network, job.case) {
        Ok(result) => ("ok".to_string(), None, Some(result)),
        Err(err) => {
            warn!(job = %job.job_id, error = %err, "fault study job failed");
            ("error".to_string(), Some(err.to_string()), None)
        }
    };
    FaultStudyRecord {
        job_id: job.job_id.clone(),
        case: job.case,
        status,
        error,
        result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ikss_core::*;

    fn feeder(with_min: bool) -> Network {
        let mut network = Network::new();
        network.add_bus(Bus::new(BusId::new(0), "Source", Kilovolts(10.0)));
        network.add_bus(Bus::new(BusId::new(1), "Load", Kilovolts(10.0)));
        let grid = GridSource::new(
            GridId::new(0),
            "Grid",
            BusId::new(0),
            MegavoltAmperes(250.0),
            0.1,
        );
        network.add_grid(if with_min {
            grid.with_min(MegavoltAmperes(150.0), 0.1)
        } else {
            grid
        });
        network
            .add_branch(Branch::from_line_parameters(
                BranchId::new(0),
                "Cable",
                BusId::new(0),
                BusId::new(1),
                0.206,
                0.08,
                2.5,
            ))
            .unwrap();
        network
    }

    #[test]
    fn test_study_records_failures_per_job() {
        let good = Arc::new(feeder(true));
        let no_min = Arc::new(feeder(false));
        let jobs = vec![
            FaultStudyJob::new("good-max", good.clone(), FaultCase::Max),
            FaultStudyJob::new("good-min", good, FaultCase::Min),
            FaultStudyJob::new("no-min", no_min, FaultCase::Min),
        ];

        let summary = run_fault_study(&jobs, &ShortCircuitConfig::default(), 2).unwrap();
        assert_eq!(summary.success, 2);
        assert_eq!(summary.failure, 1);
        assert_eq!(summary.jobs[2].job_id, "no-min");
        assert_eq!(summary.jobs[2].status, "error");
        assert!(summary.jobs[2].result.is_none());

        let max = summary.jobs[0].result.as_ref().unwrap();
        let min = summary.jobs[1].result.as_ref().unwrap();
        for bus in [BusId::new(0), BusId::new(1)] {
            assert!(min.ikss(bus).unwrap() <= max.ikss(bus).unwrap());
        }
    }

    #[test]
    fn test_study_matches_single_run() {
        let network = Arc::new(feeder(true));
        let jobs = vec![FaultStudyJob::new("only", network.clone(), FaultCase::Max)];
        let summary = run_fault_study(&jobs, &ShortCircuitConfig::default(), 0).unwrap();
        let direct =
            crate::short_circuit::compute_fault_currents(&network, FaultCase::Max, false).unwrap();
        assert_eq!(
            summary.jobs[0].result.as_ref().unwrap().ikss(BusId::new(1)),
            direct.ikss(BusId::new(1))
        );
    }
}
