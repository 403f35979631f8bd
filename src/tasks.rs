use std::any::Any;
use std::fmt;
use std::sync::Arc;

use futures::channel::oneshot;
use futures::future::{BoxFuture, FutureExt};
use tracing::warn;

use crate::executor::guarded;
use crate::types::{Facts, Rule, RuleResult, ValidationContext, ValidationError};

/// A unit of work handed to a [`TaskExecutor`].
pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Runs rule bodies for the asynchronous API.
///
/// A job that is dropped instead of run fails its rule with
/// [`ValidationError::TaskAbandoned`].
pub trait TaskExecutor: fmt::Debug + Send + Sync {
    fn execute(&self, job: Job);
}

/// Runs every job immediately on the submitting thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineExecutor;

impl TaskExecutor for InlineExecutor {
    fn execute(&self, job: Job) {
        job();
    }
}

/// Runs every job on a fresh OS thread.
#[derive(Debug, Clone)]
pub struct ThreadExecutor {
    name: String,
}

impl ThreadExecutor {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Default for ThreadExecutor {
    fn default() -> Self {
        Self::new("rulebook-worker")
    }
}

impl TaskExecutor for ThreadExecutor {
    fn execute(&self, job: Job) {
        let spawned = std::thread::Builder::new().name(self.name.clone()).spawn(job);
        if let Err(err) = spawned {
            warn!(error = %err, "failed to spawn worker thread; job abandoned");
        }
    }
}

/// Runs every job on a tokio runtime's blocking pool.
#[cfg(feature = "tokio")]
#[derive(Debug, Clone)]
pub struct TokioExecutor {
    handle: tokio::runtime::Handle,
}

#[cfg(feature = "tokio")]
impl TokioExecutor {
    #[must_use]
    pub fn new(handle: tokio::runtime::Handle) -> Self {
        Self { handle }
    }

    /// Use the runtime the caller is running on, if any.
    #[must_use]
    pub fn current() -> Option<Self> {
        tokio::runtime::Handle::try_current().ok().map(Self::new)
    }
}

#[cfg(feature = "tokio")]
impl TaskExecutor for TokioExecutor {
    fn execute(&self, job: Job) {
        drop(self.handle.spawn_blocking(job));
    }
}

/// Submit `rule.validate` to the context's task executor and return a future
/// of its outcome.
pub(crate) fn run_body<R: Rule + ?Sized>(
    rule: Arc<R>,
    ctx: ValidationContext,
    facts: Facts,
) -> BoxFuture<'static, Result<RuleResult, ValidationError>> {
    let (sender, receiver) = oneshot::channel();
    let tasks = Arc::clone(ctx.tasks());
    tasks.execute(Box::new(move || {
        let mut ctx = ctx;
        let outcome = guarded(&mut ctx, |ctx| rule.validate(ctx, &facts));
        let _ = sender.send(outcome);
    }));
    receiver
        .map(|received| received.unwrap_or(Err(ValidationError::TaskAbandoned)))
        .boxed()
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        String::from("non-string panic payload")
    }
}
