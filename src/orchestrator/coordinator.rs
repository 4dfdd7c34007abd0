//! Concurrent fan-out of one command to a set of children.
//!
//! Every child receives the command at the same time; the coordinator then
//! waits for all replies or the command's deadline, whichever comes first.
//! The aggregate succeeds only if every child acknowledged. There is no
//! rollback: children that acked a failed command keep its effect, and the
//! aggregate reports this as a partial application.

use std::collections::BTreeMap;

use futures_util::future::join_all;
use serde_json::Value;
use tracing::{debug, warn};

use crate::child::{ChildHandle, ChildRequest};
use crate::config::TimeoutConfig;
use crate::models::command::Command;
use crate::models::outcome::{AggregateOutcome, ChildOutcome, ChildReply};

/// Fans commands out to children and reduces their replies.
#[derive(Debug, Clone, Default)]
pub struct ChildCoordinator {
    timeouts: TimeoutConfig,
}

impl ChildCoordinator {
    /// Construct a coordinator using `timeouts` for per-command bounds.
    #[must_use]
    pub fn new(timeouts: TimeoutConfig) -> Self {
        Self { timeouts }
    }

    /// Timeout settings in use.
    #[must_use]
    pub fn timeouts(&self) -> &TimeoutConfig {
        &self.timeouts
    }

    /// Send `command` to every child in `children` concurrently.
    ///
    /// `payloads` supplies per-child payloads by application name; children
    /// without an entry receive none. Children that have not answered when
    /// the deadline elapses are recorded as [`ChildReply::TimedOut`].
    pub async fn dispatch(
        &self,
        command: &Command,
        children: &[&dyn ChildHandle],
        payloads: &BTreeMap<String, Value>,
    ) -> AggregateOutcome {
        let timeout = self.timeouts.timeout_for(&command.kind);
        let deadline = self.timeouts.deadline_for(&command.kind);

        let sends = children.iter().map(|&child| {
            let request = ChildRequest {
                command: command.clone(),
                payload: payloads.get(child.name()).cloned(),
                timeout,
            };
            async move {
                let reply = match tokio::time::timeout(deadline, child.send(request)).await {
                    Ok(reply) => reply,
                    Err(_elapsed) => {
                        warn!(child = %child.name(), ?deadline, "child missed command deadline");
                        ChildReply::TimedOut
                    }
                };
                debug!(child = %child.name(), ?reply, "child replied");
                ChildOutcome::from_reply(child.name(), reply)
            }
        });

        let mut outcomes = join_all(sends).await;
        outcomes.sort_by(|a, b| a.child_name.cmp(&b.child_name));
        AggregateOutcome { outcomes }
    }
}
