use std::sync::Arc;

use tokio::{
    sync::{mpsc, Semaphore},
    task::JoinSet,
};

use crate::{
    driver::Driver,
    error::*,
    score::{Mean, ScoreRecord},
    testing::{TestCase, TestReport},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Sequential,
    Parallel { workers: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    /// In completion order.
    pub reports: Vec<TestReport>,
    /// Failing tests sorted by id.
    pub failures: Vec<TestReport>,
}

impl Summary {
    pub fn new(reports: Vec<TestReport>) -> Self {
        let mut failures: Vec<TestReport> = reports
            .iter()
            .filter(|r| !r.verdict.is_pass())
            .cloned()
            .collect();
        failures.sort_by(|a, b| a.name.cmp(&b.name));
        Self { reports, failures }
    }

    pub fn all_passed(&self) -> bool {
        self.failures.is_empty()
    }

    /// Scores sorted by id.
    pub fn scores(&self) -> Vec<ScoreRecord> {
        let mut scores: Vec<ScoreRecord> = self
            .reports
            .iter()
            .filter_map(|r| {
                r.verdict.score().map(|score| ScoreRecord {
                    name: r.name.clone(),
                    score,
                })
            })
            .collect();
        scores.sort_by(|a, b| a.name.cmp(&b.name));
        scores
    }

    pub fn aggregate(&self, mean: Mean) -> Option<f64> {
        let scores: Vec<f64> = self.scores().into_iter().map(|s| s.score).collect();
        mean.aggregate(&scores)
    }
}

/// Runs every test case and collects the reports. `on_report` sees each report as it finishes.
///
/// The first fatal error aborts the run; in parallel mode the outstanding
/// workers are cancelled, which kills their child processes.
pub async fn run_all<F>(
    driver: &Driver,
    testcases: Vec<TestCase>,
    mode: Mode,
    on_report: F,
) -> Result<Summary>
where
    F: FnMut(&TestReport),
{
    match mode {
        Mode::Sequential => run_sequential(driver, testcases, on_report).await,
        Mode::Parallel { workers } => run_parallel(driver, testcases, workers, on_report).await,
    }
}

async fn run_sequential<F>(
    driver: &Driver,
    testcases: Vec<TestCase>,
    mut on_report: F,
) -> Result<Summary>
where
    F: FnMut(&TestReport),
{
    let mut reports = Vec::with_capacity(testcases.len());
    for tc in &testcases {
        let report = driver
            .run(tc)
            .await
            .with_context(|| format!("Test `{}` aborted the run", tc.name()))?;
        on_report(&report);
        reports.push(report);
    }
    Ok(Summary::new(reports))
}

async fn run_parallel<F>(
    driver: &Driver,
    testcases: Vec<TestCase>,
    workers: usize,
    mut on_report: F,
) -> Result<Summary>
where
    F: FnMut(&TestReport),
{
    let num_submitted = testcases.len();
    let permits = Arc::new(Semaphore::new(workers.max(1)));
    let (tx, mut rx) = mpsc::unbounded_channel::<(String, Result<TestReport>)>();

    // Dropping the set aborts every task still in it.
    let mut tasks = JoinSet::new();
    for tc in testcases {
        let driver = driver.clone();
        let permits = Arc::clone(&permits);
        let tx = tx.clone();
        tasks.spawn(async move {
            let Ok(_permit) = permits.acquire_owned().await else {
                return;
            };
            let res = driver.run(&tc).await;
            let _ = tx.send((tc.name().to_owned(), res));
        });
    }
    drop(tx);
    log::debug!("Submitted {} tests to {} workers", num_submitted, workers);

    let mut reports = Vec::with_capacity(num_submitted);
    while reports.len() < num_submitted {
        let Some((name, res)) = rx.recv().await else {
            bail!(
                "A worker exited without reporting ({} of {} tests finished)",
                reports.len(),
                num_submitted
            );
        };
        let report = res.with_context(|| format!("Test `{}` aborted the run", name))?;
        on_report(&report);
        reports.push(report);
    }

    while let Some(joined) = tasks.join_next().await {
        joined.context("Worker task failed")?;
    }
    Ok(Summary::new(reports))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::testing::Verdict;

    fn report(name: &str, verdict: Verdict) -> TestReport {
        TestReport::new(name, verdict)
    }

    #[test]
    fn summary_sorts_failures_and_scores() {
        use crate::testing::Benchmark;
        let b = |score| {
            Verdict::Benchmarked(Benchmark {
                candidate_ms: 1.0,
                rival_ms: 1.0,
                score,
            })
        };
        let summary = Summary::new(vec![
            report("c", Verdict::WrongAnswer),
            report("z", b(100.0)),
            report("a", Verdict::TimedOut),
            report("y", b(50.0)),
            report("b", Verdict::Passed),
        ]);

        let failures: Vec<_> = summary.failures.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(failures, ["a", "c"]);
        assert!(!summary.all_passed());

        let scores: Vec<_> = summary.scores().into_iter().map(|s| s.name).collect();
        assert_eq!(scores, ["y", "z"]);
        let mean = summary.aggregate(Mean::Arithmetic).unwrap();
        assert!((mean - 75.0).abs() < 1e-9);
    }

    #[test]
    fn empty_summary() {
        let summary = Summary::new(vec![]);
        assert!(summary.all_passed());
        assert_eq!(summary.aggregate(Mean::Geometric), None);
    }
}
