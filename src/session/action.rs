//! Command handlers.
//!
//! A handler completes in one of three ways: by returning directly, by
//! settling a [`Done`] continuation, or by resolving a future. [`Action::run`]
//! normalizes all three to a single result.

use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use super::instance::CommandInstance;

/// What a handler produces: an optional value, or an error.
pub type ActionResult = anyhow::Result<Option<Value>>;

type SyncHandler = Arc<dyn Fn(&mut CommandInstance) -> ActionResult + Send + Sync>;
type FutureHandler =
    Arc<dyn for<'a> Fn(&'a mut CommandInstance) -> BoxFuture<'a, ActionResult> + Send + Sync>;
type CallbackHandler = Arc<dyn Fn(&mut CommandInstance, Done) + Send + Sync>;

/// A command handler.
#[derive(Clone)]
pub enum Action {
    /// Returns its result directly.
    Sync(SyncHandler),
    /// Returns a future that borrows the instance.
    Future(FutureHandler),
    /// Settles a [`Done`] continuation, possibly from another task.
    Callback(CallbackHandler),
}

impl Action {
    /// Creates a synchronous handler.
    pub fn sync<F>(f: F) -> Self
    where
        F: Fn(&mut CommandInstance) -> ActionResult + Send + Sync + 'static,
    {
        Self::Sync(Arc::new(f))
    }

    /// Creates an async handler.
    ///
    /// ```ignore
    /// Action::future(|cmd| Box::pin(async move {
    ///     cmd.log("working").await;
    ///     Ok(None)
    /// }))
    /// ```
    pub fn future<F>(f: F) -> Self
    where
        F: for<'a> Fn(&'a mut CommandInstance) -> BoxFuture<'a, ActionResult>
            + Send
            + Sync
            + 'static,
    {
        Self::Future(Arc::new(f))
    }

    /// Creates a handler that reports completion through [`Done`].
    pub fn callback<F>(f: F) -> Self
    where
        F: Fn(&mut CommandInstance, Done) + Send + Sync + 'static,
    {
        Self::Callback(Arc::new(f))
    }

    /// Runs the handler to completion.
    pub async fn run(&self, instance: &mut CommandInstance) -> ActionResult {
        match self {
            Self::Sync(f) => f(instance),
            Self::Future(f) => f(instance).await,
            Self::Callback(f) => {
                let (logs_tx, mut logs) = mpsc::unbounded_channel();
                let (done, mut settled) = Done::new(Logger { tx: logs_tx });
                f(instance, done);

                // Text logged from other tasks goes through this instance, so it
                // reaches the output or the downstream stage in order.
                loop {
                    tokio::select! {
                        biased;
                        Some(text) = logs.recv() => instance.log(text).await,
                        result = &mut settled => {
                            while let Ok(text) = logs.try_recv() {
                                instance.log(text).await;
                            }
                            return result.unwrap_or_else(|_| {
                                Err(anyhow::anyhow!("handler ended without settling"))
                            });
                        }
                    }
                }
            }
        }
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Sync(_) => f.write_str("Action::Sync"),
            Self::Future(_) => f.write_str("Action::Future"),
            Self::Callback(_) => f.write_str("Action::Callback"),
        }
    }
}

/// Cloneable handle that logs through a callback handler's instance.
///
/// Usable from any task until the handler settles; later text is dropped.
#[derive(Debug, Clone)]
pub struct Logger {
    tx: mpsc::UnboundedSender<String>,
}

impl Logger {
    /// Logs text as [`CommandInstance::log`] would.
    pub fn log(&self, text: impl fmt::Display) {
        if self.tx.send(text.to_string()).is_err() {
            debug!("Dropped log text from a settled handler");
        }
    }
}

/// Completion continuation for callback-style handlers.
///
/// Dropping it without settling fails the handler.
#[derive(Debug)]
pub struct Done {
    tx: oneshot::Sender<ActionResult>,
    logger: Logger,
}

impl Done {
    fn new(logger: Logger) -> (Self, oneshot::Receiver<ActionResult>) {
        let (tx, rx) = oneshot::channel();
        (Self { tx, logger }, rx)
    }

    /// Logs text through the instance before settling.
    pub fn log(&self, text: impl fmt::Display) {
        self.logger.log(text);
    }

    /// Returns a logger that can outlive this continuation's owner.
    pub fn logger(&self) -> Logger {
        self.logger.clone()
    }

    /// Completes without a value.
    pub fn ok(self) {
        self.finish(Ok(None));
    }

    /// Completes with a value.
    pub fn value(self, value: Value) {
        self.finish(Ok(Some(value)));
    }

    /// Fails the handler.
    pub fn error(self, error: impl Into<anyhow::Error>) {
        self.finish(Err(error.into()));
    }

    /// Completes with an explicit result.
    pub fn finish(self, result: ActionResult) {
        let _ = self.tx.send(result);
    }
}
