//! Inventory Client
//!
//! The single path from resolvers to the command runner. Every call is
//! timed and counted, and an authentication failure triggers exactly one
//! re-authentication followed by exactly one retry.

use super::session::SessionRegistry;
use crate::domain::ports::{CommandRunnerRef, InventoryCommand, SessionContext};
use crate::error::{RecoveryAction, Result};
use crate::metrics::ServiceMetrics;
use std::sync::Arc;
use std::time::Instant;
use tracing::warn;

pub struct InventoryClient {
    runner: CommandRunnerRef,
    sessions: Arc<SessionRegistry>,
    metrics: Arc<ServiceMetrics>,
}

impl InventoryClient {
    pub fn new(
        runner: CommandRunnerRef,
        sessions: Arc<SessionRegistry>,
        metrics: Arc<ServiceMetrics>,
    ) -> Self {
        Self {
            runner,
            sessions,
            metrics,
        }
    }

    pub fn metrics(&self) -> &ServiceMetrics {
        &self.metrics
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    /// Run a command, re-authenticating once if the session was rejected
    pub async fn execute(&self, session: &SessionContext, command: &InventoryCommand) -> Result<String> {
        let generation = self.sessions.generation(&session.key());

        match self.run_once(session, command).await {
            Err(err) if err.action() == RecoveryAction::Reauthenticate => {
                warn!(
                    "Session for {}@{} rejected during {}: {}; re-authenticating",
                    session.principal(),
                    session.endpoint(),
                    command.subcommand(),
                    err
                );
                self.metrics.record_reauthentication();
                self.sessions
                    .reauthenticate(self.runner.as_ref(), session, generation)
                    .await?;
                self.run_once(session, command).await
            }
            other => other,
        }
    }

    async fn run_once(&self, session: &SessionContext, command: &InventoryCommand) -> Result<String> {
        let started = Instant::now();
        let result = self.runner.run(session, command).await;
        self.metrics
            .observe_command(command.subcommand(), &result, started.elapsed());
        result
    }
}
