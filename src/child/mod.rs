//! Child application abstraction.
//!
//! Every application in the partition (readout, dataflow, trigger, HSI,
//! DQM) is driven through the same [`ChildHandle`] capability, so the
//! coordinator never branches on application type. A [`ChildLauncher`]
//! creates the handles for the roster at `boot`.

pub mod codec;
pub mod process;
pub mod protocol;
pub mod simulated;

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use serde_json::Value;

use crate::models::app::{AppKind, AppSpec};
use crate::models::command::Command;
use crate::models::outcome::ChildReply;
use crate::Result;

/// Owned, type-erased child handle.
pub type BoxedChild = Box<dyn ChildHandle>;

/// One command delivery to one child.
#[derive(Debug, Clone)]
pub struct ChildRequest {
    /// Command to execute.
    pub command: Command,
    /// Application-specific configuration (sent with `conf`).
    pub payload: Option<Value>,
    /// Bound on the child's reply for this command class.
    pub timeout: Duration,
}

/// Uniform control surface over one child application.
///
/// `send` is called at most once per command per child. Implementations
/// enforce `request.timeout` themselves and never retry; retry policy, if
/// any, belongs to the caller.
pub trait ChildHandle: Send + Sync {
    /// Unique application name.
    fn name(&self) -> &str;

    /// Application role.
    fn kind(&self) -> AppKind;

    /// Deliver `request` and wait for the child's reply.
    ///
    /// Never fails: transport problems are reported as
    /// [`ChildReply::Unreachable`] and a missed bound as
    /// [`ChildReply::TimedOut`].
    fn send(&self, request: ChildRequest) -> Pin<Box<dyn Future<Output = ChildReply> + Send + '_>>;

    /// Release the child (close its channel, reap its process).
    ///
    /// Idempotent.
    fn shutdown(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>>;
}

/// Creates child handles for roster entries.
pub trait ChildLauncher: Send + Sync {
    /// Launch `app` and return a handle once it is ready for commands.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Child`](crate::AppError::Child) if the
    /// application cannot be started or never signals readiness.
    fn launch<'a>(
        &'a self,
        app: &'a AppSpec,
    ) -> Pin<Box<dyn Future<Output = Result<BoxedChild>> + Send + 'a>>;
}
