//! Blocking connect-write-close sequences. Run on a blocking thread.

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::address::PrinterAddress;
use crate::connection::{Connection, ConnectionManager};
use crate::error::EstafetaError;
use crate::protocol::Plan;
use crate::retry::RetryPolicy;
use crate::transport::writer::{self, Pacing, Progress};

use super::handle::OpState;

/// What one job needs while it runs.
pub(crate) struct Pipeline<'a> {
    pub manager: &'a ConnectionManager,
    pub address: &'a PrinterAddress,
    pub state: &'a watch::Sender<OpState>,
    pub cancel: &'a CancellationToken,
}

impl Pipeline<'_> {
    fn set(&self, state: OpState) {
        debug!(address = %self.address, ?state, "State");
        self.state.send_replace(state);
    }

    /// Open and immediately close a connection.
    pub fn reach(&self) -> Result<(), EstafetaError> {
        if self.cancel.is_cancelled() {
            return Err(EstafetaError::Cancelled);
        }
        self.set(OpState::Connecting);
        match self.manager.open(self.address) {
            Ok(connection) => {
                self.set(OpState::Connected);
                connection.close();
                Ok(())
            }
            Err(e) => {
                self.set(OpState::ConnectFailed);
                Err(e)
            }
        }
    }

    /// Print `plan`, retrying link failures per `policy`.
    pub fn print(
        &self,
        plan: &Plan,
        pacing: Pacing,
        policy: RetryPolicy,
    ) -> Result<(), EstafetaError> {
        policy.run(self.cancel, |attempt| {
            debug!(address = %self.address, attempt, bytes = plan.len(), "Print attempt");
            self.attempt(plan, pacing)
        })
    }

    /// One attempt: connect, settle, body, finalize, close.
    ///
    /// The connection closes on every path, including errors.
    fn attempt(&self, plan: &Plan, pacing: Pacing) -> Result<(), EstafetaError> {
        self.set(OpState::Connecting);
        let mut connection = self.manager.open(self.address).inspect_err(|_| {
            self.set(OpState::ConnectFailed);
        })?;
        self.set(OpState::Connected);

        let result = self.write_plan(&mut connection, plan, pacing);
        connection.close();
        if let Err(EstafetaError::WriteFailed { .. }) = &result {
            self.set(OpState::WriteFailed);
        }
        result
    }

    fn write_plan(
        &self,
        connection: &mut Connection,
        plan: &Plan,
        pacing: Pacing,
    ) -> Result<(), EstafetaError> {
        writer::pause(plan.connect_settle, self.cancel)?;
        let mut progress = Progress::new(plan.len());
        self.set(OpState::Writing);
        writer::execute_steps(connection, &plan.body, pacing, &mut progress, self.cancel)?;
        self.set(OpState::Finalizing);
        writer::execute_steps(connection, &plan.finalize, pacing, &mut progress, self.cancel)
    }
}
