//! Stage handoff token.
//!
//! The pipeline hands each stage a [`Baton`] and waits on the paired
//! receiver. Passing consumes the baton, so a stage can pass at most once;
//! a baton dropped without being passed is reported to the pipeline as an
//! abandoned stage.

use tokio::sync::oneshot;
use tracing::debug;

use extloader_shared::StageOutput;

/// Single-owner token a stage holds until its work is complete.
#[derive(Debug)]
pub struct Baton {
    stage: String,
    taken: bool,
    tx: oneshot::Sender<StageOutput>,
}

impl Baton {
    /// Create a baton for `stage` and the receiver that observes its pass.
    pub fn new(stage: impl Into<String>) -> (Self, oneshot::Receiver<StageOutput>) {
        let (tx, rx) = oneshot::channel();
        let baton = Self {
            stage: stage.into(),
            taken: false,
            tx,
        };
        (baton, rx)
    }

    /// Name of the stage holding this baton.
    pub fn stage(&self) -> &str {
        &self.stage
    }

    /// Whether [`Baton::take`] has been called.
    pub fn is_taken(&self) -> bool {
        self.taken
    }

    /// Mark the holding stage active. Idempotent; diagnostic only.
    pub fn take(&mut self) {
        if !self.taken {
            self.taken = true;
            debug!(stage = %self.stage, "baton taken");
        }
    }

    /// Release the baton, handing `output` to the next stage.
    pub fn pass(self, output: StageOutput) {
        debug!(stage = %self.stage, "baton passed");
        // The pipeline only stops listening once it has given up on the run.
        let _ = self.tx.send(output);
    }
}
