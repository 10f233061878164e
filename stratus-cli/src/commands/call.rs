//! Raw API calls, single or batched

use crate::output::{self, OutputFormat};
use anyhow::{bail, Context, Result};
use serde::Serialize;
use std::time::Duration;
use stratus_client::{JobBatchReport, JobOutcome, JobResult, RawCommand, TestClient};
use tabled::Tabled;

pub struct CallRequest {
    pub command: String,
    pub params: Vec<String>,
    pub is_async: bool,
    pub repeat: usize,
    pub workers: Option<usize>,
    pub interval: f64,
}

impl CallRequest {
    fn to_command(&self) -> Result<RawCommand> {
        let mut command = RawCommand::new(&self.command)
            .with_pairs(&self.params)
            .context("Invalid parameters")?;
        if self.is_async {
            command = command.asynchronous();
        }
        Ok(command)
    }

    fn interval(&self) -> Result<Duration> {
        Duration::try_from_secs_f64(self.interval)
            .with_context(|| format!("Invalid interval: {}", self.interval))
    }
}

#[derive(Serialize, Tabled)]
struct OutcomeRow {
    index: usize,
    command: String,
    status: String,
    job_id: String,
    duration: String,
    detail: String,
}

impl From<&JobOutcome> for OutcomeRow {
    fn from(outcome: &JobOutcome) -> Self {
        let (status, detail) = match &outcome.result {
            JobResult::Succeeded { .. } => ("succeeded", String::new()),
            JobResult::Failed { error } => ("failed", output::truncate(error, 60)),
            JobResult::TimedOut => ("timed out", String::new()),
        };
        Self {
            index: outcome.index,
            command: outcome.command.clone(),
            status: status.to_string(),
            job_id: outcome.job_id.clone().unwrap_or_else(|| "-".to_string()),
            duration: output::format_duration(outcome.duration),
            detail,
        }
    }
}

pub async fn handle_call(session: &TestClient, request: CallRequest, format: OutputFormat) -> Result<()> {
    if request.repeat == 0 {
        bail!("--repeat must be at least 1");
    }
    let command = request.to_command()?;

    if request.repeat == 1 && request.workers.is_none() {
        let response = session
            .api_client()
            .execute_raw(&command)
            .await
            .with_context(|| format!("{} failed", request.command))?;
        return output::print_single(&response.body, format);
    }

    let workers = request
        .workers
        .unwrap_or(session.config().default_worker_threads);
    let report = session
        .submit_job(command, request.repeat, workers, request.interval()?)
        .await;

    print_report(&report, format)?;

    let failed = report.failed().len();
    if failed > 0 {
        bail!("{} of {} submissions failed", failed, report.outcomes.len());
    }
    Ok(())
}

fn print_report(report: &JobBatchReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => {
            let rows: Vec<OutcomeRow> = report.outcomes.iter().map(OutcomeRow::from).collect();
            output::print_table(rows);
            println!(
                "{}/{} succeeded in {}",
                report.succeeded(),
                report.outcomes.len(),
                output::format_duration(report.elapsed)
            );
            for outcome in report.failed() {
                if let JobResult::Failed { error } = &outcome.result {
                    output::print_error(&format!("#{}: {}", outcome.index, error));
                } else {
                    output::print_warning(&format!("#{} did not finish in time", outcome.index));
                }
            }
            Ok(())
        }
        _ => output::print_single(report, format),
    }
}
