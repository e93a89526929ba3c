//! Ordered stage pipeline: stage N passes its baton before stage N+1 starts.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{info, instrument};

use extloader_shared::{ExtLoaderError, Result, RunId, RunReport, StageOutput, StageRecord};

use crate::baton::Baton;

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

/// One ordered unit of the bootstrap pipeline.
///
/// A stage receives the previous stage's output and a [`Baton`]. It must
/// call [`Baton::pass`] exactly once when its work is complete; it may hand
/// the baton to a spawned task and return early.
#[async_trait]
pub trait Stage: Send + Sync {
    /// Stable name used in logs and reports.
    fn name(&self) -> &str;

    /// Run the stage.
    async fn initialize(&self, previous: &StageOutput, baton: Baton);
}

// ---------------------------------------------------------------------------
// Progress reporting
// ---------------------------------------------------------------------------

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when a stage is handed the baton.
    fn stage_started(&self, name: &str, index: usize, total: usize);
    /// Called when a stage passes the baton.
    fn stage_passed(&self, name: &str);
    /// Called when the pipeline completes.
    fn done(&self, report: &RunReport);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn stage_started(&self, _name: &str, _index: usize, _total: usize) {}
    fn stage_passed(&self, _name: &str) {}
    fn done(&self, _report: &RunReport) {}
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// A fixed, ordered list of stages run strictly one after another.
///
/// No retry, timeout, or cancellation: a stage that neither passes nor drops
/// its baton halts the run.
#[derive(Default, Clone)]
pub struct Pipeline {
    stages: Vec<Arc<dyn Stage>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a stage.
    pub fn stage(mut self, stage: impl Stage + 'static) -> Self {
        self.stages.push(Arc::new(stage));
        self
    }

    /// Names of the registered stages, in order.
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Run every stage with a fresh [`RunId`].
    pub async fn run(&self, progress: &dyn ProgressReporter) -> Result<RunReport> {
        self.run_as(RunId::new(), progress).await
    }

    /// Run every stage under the given run id.
    #[instrument(skip(self, progress), fields(run_id = %run_id, stages = self.stages.len()))]
    pub async fn run_as(
        &self,
        run_id: RunId,
        progress: &dyn ProgressReporter,
    ) -> Result<RunReport> {
        let started_at = Utc::now();
        let total = self.stages.len();
        let mut records: Vec<StageRecord> = Vec::with_capacity(total);
        let mut previous = StageOutput::Empty;

        for (index, stage) in self.stages.iter().enumerate() {
            let name = stage.name().to_string();
            progress.stage_started(&name, index, total);
            info!(stage = %name, index, "stage started");

            let (baton, passed) = Baton::new(name.clone());
            let ((), passed) = tokio::join!(stage.initialize(&previous, baton), passed);

            let output = passed.map_err(|_| {
                ExtLoaderError::Pipeline(format!(
                    "stage `{name}` dropped its baton without passing it"
                ))
            })?;

            progress.stage_passed(&name);
            info!(stage = %name, "stage passed");

            previous = output.clone();
            records.push(StageRecord {
                stage: name,
                output,
            });
        }

        let report = RunReport {
            run_id,
            started_at,
            finished_at: Utc::now(),
            stages: records,
        };

        progress.done(&report);
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;

    use extloader_shared::{ExtensionReport, UiReport};

    type Log = Arc<Mutex<Vec<String>>>;

    fn events(log: &Log) -> Vec<String> {
        log.lock().unwrap().clone()
    }

    /// Passes after a delay, from a spawned task, after `initialize` returned.
    struct SlowStage {
        name: &'static str,
        delay: Duration,
        log: Log,
    }

    #[async_trait]
    impl Stage for SlowStage {
        fn name(&self) -> &str {
            self.name
        }

        async fn initialize(&self, _previous: &StageOutput, mut baton: Baton) {
            baton.take();
            self.log.lock().unwrap().push(format!("{}:start", self.name));
            let log = Arc::clone(&self.log);
            let name = self.name;
            let delay = self.delay;
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                log.lock().unwrap().push(format!("{name}:pass"));
                baton.pass(StageOutput::Extensions(ExtensionReport {
                    plugins: vec![name.to_string()],
                    ..Default::default()
                }));
            });
        }
    }

    /// Records what it was handed and passes immediately.
    struct EchoStage {
        log: Log,
    }

    #[async_trait]
    impl Stage for EchoStage {
        fn name(&self) -> &str {
            "echo"
        }

        async fn initialize(&self, previous: &StageOutput, mut baton: Baton) {
            baton.take();
            let seen = match previous {
                StageOutput::Extensions(r) => r.plugins.join(","),
                _ => "-".to_string(),
            };
            self.log.lock().unwrap().push(format!("echo:start:{seen}"));
            baton.pass(StageOutput::UiAssets(UiReport::default()));
        }
    }

    struct DropsBaton;

    #[async_trait]
    impl Stage for DropsBaton {
        fn name(&self) -> &str {
            "forgetful"
        }

        async fn initialize(&self, _previous: &StageOutput, _baton: Baton) {}
    }

    struct NeverPasses;

    #[async_trait]
    impl Stage for NeverPasses {
        fn name(&self) -> &str {
            "stuck"
        }

        async fn initialize(&self, _previous: &StageOutput, baton: Baton) {
            let _held = baton;
            std::future::pending::<()>().await;
        }
    }

    #[tokio::test]
    async fn test_next_stage_waits_for_delayed_pass() {
        let log: Log = Arc::default();
        let pipeline = Pipeline::new()
            .stage(SlowStage {
                name: "slow",
                delay: Duration::from_millis(40),
                log: Arc::clone(&log),
            })
            .stage(EchoStage {
                log: Arc::clone(&log),
            });

        let report = pipeline.run(&SilentProgress).await.unwrap();

        assert_eq!(
            events(&log),
            vec!["slow:start", "slow:pass", "echo:start:slow"]
        );
        assert_eq!(report.stages.len(), 2);
        assert_eq!(report.stages[0].stage, "slow");
        assert!(matches!(report.stages[1].output, StageOutput::UiAssets(_)));
        assert!(report.finished_at >= report.started_at);
    }

    #[tokio::test]
    async fn test_next_stage_not_started_while_first_is_pending() {
        let log: Log = Arc::default();
        let pipeline = Pipeline::new()
            .stage(SlowStage {
                name: "slow",
                delay: Duration::from_millis(200),
                log: Arc::clone(&log),
            })
            .stage(EchoStage {
                log: Arc::clone(&log),
            });

        let run = tokio::spawn(async move { pipeline.run(&SilentProgress).await });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(events(&log), vec!["slow:start"]);

        run.await.unwrap().unwrap();
        assert_eq!(events(&log).last().map(String::as_str), Some("echo:start:slow"));
    }

    #[tokio::test]
    async fn test_dropped_baton_is_a_pipeline_error() {
        let log: Log = Arc::default();
        let pipeline = Pipeline::new()
            .stage(DropsBaton)
            .stage(EchoStage {
                log: Arc::clone(&log),
            });

        let err = pipeline.run(&SilentProgress).await.unwrap_err();
        assert!(matches!(err, ExtLoaderError::Pipeline(_)));
        assert!(err.to_string().contains("forgetful"));
        assert!(events(&log).is_empty());
    }

    #[tokio::test]
    async fn test_stage_that_never_passes_halts_the_run() {
        let log: Log = Arc::default();
        let pipeline = Pipeline::new()
            .stage(NeverPasses)
            .stage(EchoStage {
                log: Arc::clone(&log),
            });

        let outcome =
            tokio::time::timeout(Duration::from_millis(50), pipeline.run(&SilentProgress)).await;
        assert!(outcome.is_err());
        assert!(events(&log).is_empty());
    }

    #[tokio::test]
    async fn test_empty_pipeline_reports_no_stages() {
        let pipeline = Pipeline::new();
        assert!(pipeline.stage_names().is_empty());
        let report = pipeline.run(&SilentProgress).await.unwrap();
        assert!(report.stages.is_empty());
    }
}
