//! Scripted command runner for inventory tests

use super::client::InventoryClient;
use super::session::SessionRegistry;
use crate::domain::ports::{CommandRunner, InventoryCommand, SessionContext};
use crate::error::{Error, Result};
use crate::metrics::ServiceMetrics;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Canned reply for one invocation
#[derive(Debug, Clone)]
pub(crate) enum Reply {
    Stdout(String),
    Auth,
    Transient,
    Failure(String),
}

impl Reply {
    pub(crate) fn stdout(text: &str) -> Self {
        Reply::Stdout(text.to_string())
    }

    fn into_result(self, command: &str) -> Result<String> {
        match self {
            Reply::Stdout(text) => Ok(text),
            Reply::Auth => Err(Error::Auth("ServerFaultCode: 401 session is not authenticated".into())),
            Reply::Transient => Err(Error::TransientNetwork("connection reset by peer".into())),
            Reply::Failure(message) => Err(Error::Execution {
                command: command.to_string(),
                code: Some(1),
                message,
            }),
        }
    }
}

/// Runner that answers from a script keyed by the rendered command.
/// The last reply for a command repeats once its queue is down to one.
#[derive(Default)]
pub(crate) struct ScriptedRunner {
    replies: Mutex<HashMap<String, VecDeque<Reply>>>,
    calls: Mutex<Vec<String>>,
    logins: AtomicUsize,
    login_fails: bool,
}

impl ScriptedRunner {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn on(self, command: &str, reply: Reply) -> Self {
        self.replies
            .lock()
            .entry(command.to_string())
            .or_default()
            .push_back(reply);
        self
    }

    pub(crate) fn failing_login(mut self) -> Self {
        self.login_fails = true;
        self
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub(crate) fn logins(&self) -> usize {
        self.logins.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, _session: &SessionContext, command: &InventoryCommand) -> Result<String> {
        let key = command.to_string();
        self.calls.lock().push(key.clone());

        let reply = {
            let mut replies = self.replies.lock();
            let queue = replies
                .get_mut(&key)
                .filter(|queue| !queue.is_empty())
                .ok_or_else(|| Error::Internal(format!("unscripted command: {}", key)))?;
            if queue.len() > 1 {
                queue.pop_front()
            } else {
                queue.front().cloned()
            }
        };

        reply
            .ok_or_else(|| Error::Internal(format!("no reply for: {}", key)))?
            .into_result(&key)
    }

    async fn login(&self, _session: &SessionContext) -> Result<()> {
        self.logins.fetch_add(1, Ordering::SeqCst);
        if self.login_fails {
            Err(Error::Auth("Cannot complete login due to an incorrect user name or password".into()))
        } else {
            Ok(())
        }
    }
}

pub(crate) fn session() -> SessionContext {
    SessionContext::new("https://vcenter.example.com", "svc@vsphere.local", "s3cr\"t $pw").unwrap()
}

pub(crate) fn client(runner: Arc<ScriptedRunner>) -> Arc<InventoryClient> {
    Arc::new(InventoryClient::new(
        runner,
        Arc::new(SessionRegistry::new()),
        Arc::new(ServiceMetrics::new().unwrap()),
    ))
}
