//! Batch execution of API commands
//!
//! Runs commands on a bounded pool of concurrent workers and joins on all of
//! them. A failing command is recorded in its own outcome and never cancels
//! the others.

use crate::client::ApiClient;
use crate::command::RawCommand;
use crate::db::{AsyncJobRecord, DbConnection};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::{sleep, timeout_at, Instant};
use tracing::{error, info, warn};

/// How one command ended
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobResult {
    Succeeded { body: Value },
    Failed { error: String },
    TimedOut,
}

/// Outcome of one command in a batch
#[derive(Debug, Clone, Serialize)]
pub struct JobOutcome {
    /// Position of the command in the submitted batch
    pub index: usize,
    pub command: String,
    pub job_id: Option<String>,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub duration: Duration,
    pub result: JobResult,
    /// Persisted job state, when a database connection is available
    pub db_record: Option<AsyncJobRecord>,
}

impl JobOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self.result, JobResult::Succeeded { .. })
    }
}

/// Outcomes of a batch, in submission order
#[derive(Debug, Clone, Serialize)]
pub struct JobBatchReport {
    pub outcomes: Vec<JobOutcome>,
    pub elapsed: Duration,
}

impl JobBatchReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_success()).count()
    }

    pub fn failed(&self) -> Vec<&JobOutcome> {
        self.outcomes.iter().filter(|o| !o.is_success()).collect()
    }

    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(JobOutcome::is_success)
    }
}

/// Bounded worker pool over one API client
pub struct JobRunner {
    api: ApiClient,
    db: Option<Arc<DbConnection>>,
    batch_timeout: Duration,
}

impl JobRunner {
    pub fn new(api: ApiClient, db: Option<Arc<DbConnection>>, batch_timeout: Duration) -> Self {
        Self {
            api,
            db,
            batch_timeout,
        }
    }

    /// Run distinct commands with `workers` in flight at most
    pub async fn submit_cmds_and_wait(&self, commands: Vec<RawCommand>, workers: usize) -> JobBatchReport {
        self.run(commands, workers, Duration::ZERO).await
    }

    /// Run the same command `times` times
    pub async fn submit_job_n_times(
        &self,
        command: RawCommand,
        times: usize,
        workers: usize,
        interval: Duration,
    ) -> JobBatchReport {
        self.run(vec![command; times], workers, interval).await
    }

    /// Run distinct commands, waiting `interval` between submissions
    pub async fn submit_jobs(
        &self,
        commands: Vec<RawCommand>,
        workers: usize,
        interval: Duration,
    ) -> JobBatchReport {
        self.run(commands, workers, interval).await
    }

    async fn run(&self, commands: Vec<RawCommand>, workers: usize, interval: Duration) -> JobBatchReport {
        let workers = workers.max(1);
        let total = commands.len();
        info!("Submitting {} commands on {} workers", total, workers);

        let clock = Instant::now();
        let deadline = clock + self.batch_timeout;
        let batch_started_at = Utc::now();
        let names: Vec<String> = commands.iter().map(|c| c.name.clone()).collect();

        let semaphore = Arc::new(Semaphore::new(workers));
        let mut join_set = JoinSet::new();

        for (index, command) in commands.into_iter().enumerate() {
            if index > 0 && !interval.is_zero() {
                sleep(interval).await;
            }

            let sem = semaphore.clone();
            let api = self.api.clone();
            let db = self.db.clone();

            join_set.spawn(async move {
                let Ok(_permit) = sem.acquire().await else {
                    return Self::unfinished(index, command.name, Utc::now(), false);
                };
                Self::execute_one(index, command, &api, db.as_deref()).await
            });
        }

        let mut slots: Vec<Option<JobOutcome>> = (0..total).map(|_| None).collect();
        let mut timed_out = false;

        loop {
            match timeout_at(deadline, join_set.join_next()).await {
                Ok(Some(Ok(outcome))) => {
                    let index = outcome.index;
                    slots[index] = Some(outcome);
                }
                Ok(Some(Err(e))) => {
                    error!("Job task error: {}", e);
                }
                Ok(None) => break,
                Err(_) => {
                    warn!(
                        "Batch did not finish within {:?}, aborting remaining jobs",
                        self.batch_timeout
                    );
                    timed_out = true;
                    join_set.abort_all();
                    break;
                }
            }
        }

        let outcomes: Vec<JobOutcome> = slots
            .into_iter()
            .zip(names)
            .enumerate()
            .map(|(index, (slot, name))| {
                slot.unwrap_or_else(|| Self::unfinished(index, name, batch_started_at, timed_out))
            })
            .collect();

        let report = JobBatchReport {
            outcomes,
            elapsed: clock.elapsed(),
        };
        info!(
            "Batch finished: {}/{} succeeded in {:.2}s",
            report.succeeded(),
            total,
            report.elapsed.as_secs_f64()
        );
        report
    }

    async fn execute_one(
        index: usize,
        command: RawCommand,
        api: &ApiClient,
        db: Option<&DbConnection>,
    ) -> JobOutcome {
        let started_at = Utc::now();
        let clock = Instant::now();

        let (job_id, result) = match api.execute_raw(&command).await {
            Ok(output) => (output.job_id, JobResult::Succeeded { body: output.body }),
            Err(e) if e.is_timeout() => {
                warn!("{} timed out: {}", command.name, e);
                (e.job_id().map(str::to_string), JobResult::TimedOut)
            }
            Err(e) => {
                warn!("{} failed: {}", command.name, e);
                (e.job_id().map(str::to_string), JobResult::Failed { error: e.to_string() })
            }
        };
        let duration = clock.elapsed();

        let db_record = match (db, job_id.as_deref()) {
            (Some(db), Some(job_id)) => match db.async_job_record(job_id).await {
                Ok(record) => record,
                Err(e) => {
                    warn!("Could not read job {} from the database: {}", job_id, e);
                    None
                }
            },
            _ => None,
        };

        JobOutcome {
            index,
            command: command.name,
            job_id,
            started_at,
            ended_at: Utc::now(),
            duration,
            result,
            db_record,
        }
    }

    fn unfinished(index: usize, command: String, started_at: DateTime<Utc>, timed_out: bool) -> JobOutcome {
        let ended_at = Utc::now();
        JobOutcome {
            index,
            command,
            job_id: None,
            started_at,
            ended_at,
            duration: (ended_at - started_at).to_std().unwrap_or_default(),
            result: if timed_out {
                JobResult::TimedOut
            } else {
                JobResult::Failed {
                    error: "worker ended without a result".to_string(),
                }
            },
            db_record: None,
        }
    }
}
