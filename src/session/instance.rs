//! A single command invocation within a pipeline.

use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{Session, SessionEvent};
use crate::commands::binder::Args;
use crate::commands::definitions::Command;
use crate::commands::help::render_help;
use crate::error::{Result, ShellacError};

/// One stage of a running pipeline.
///
/// Each instance owns the next stage, so `log` either writes to the session
/// output (last stage) or feeds the downstream command.
pub struct CommandInstance {
    command: Arc<Command>,
    /// Arguments bound for this invocation.
    pub args: Args,
    session: Session,
    token: CancellationToken,
    downstream: Option<Box<CommandInstance>>,
}

impl CommandInstance {
    pub(crate) fn new(
        command: Arc<Command>,
        args: Args,
        session: Session,
        token: CancellationToken,
    ) -> Self {
        Self {
            command,
            args,
            session,
            token,
            downstream: None,
        }
    }

    /// Links `downstream` as the stage this instance's output feeds.
    pub(crate) fn pipe_into(&mut self, downstream: CommandInstance) {
        self.downstream = Some(Box::new(downstream));
    }

    /// Returns the command being run.
    pub fn command(&self) -> &Command {
        &self.command
    }

    /// Returns the owning session.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Returns true if output feeds another command.
    pub fn has_downstream(&self) -> bool {
        self.downstream.is_some()
    }

    /// Returns true once the pipeline has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Returns the pipeline's cancellation token.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Waits until the pipeline is cancelled.
    pub async fn cancelled(&self) {
        self.token.cancelled().await;
    }

    /// Cancels the pipeline this instance belongs to.
    pub fn cancel(&self) {
        self.session.cancel();
    }

    /// Emits text.
    ///
    /// The last stage writes to the session output. Any other stage passes
    /// the text to the next command as its `stdin` and runs it. Failures
    /// downstream are reported, not returned.
    pub async fn log(&mut self, text: impl fmt::Display) {
        let text = text.to_string();

        let Some(downstream) = self.downstream.as_mut() else {
            self.session.write(&text);
            return;
        };

        downstream.args.stdin = Some(vec![text]);
        match downstream.run().await {
            Ok(_) => {}
            Err(ShellacError::Validation(message)) => {
                self.session.write(&message);
                self.session.emit(SessionEvent::ValidationFailed {
                    command: downstream.command.name.clone(),
                    message,
                });
            }
            Err(err) => {
                self.session.write(&err.to_string());
                self.session.emit(SessionEvent::CommandFailed {
                    command: downstream.command.name.clone(),
                    error: err.to_string(),
                });
            }
        }
    }

    /// Runs the validator, then the handler (or help when requested).
    pub(crate) fn run(&mut self) -> BoxFuture<'_, Result<Option<Value>>> {
        Box::pin(async move {
            if self.args.help_requested() {
                let help = render_help(&self.command);
                self.session.write(&help);
                return Ok(None);
            }

            if let Some(validator) = self.command.validator.clone() {
                if let Err(e) = validator(&self.args) {
                    debug!(command = %self.command.name, error = %e, "Validation failed");
                    return Err(ShellacError::validation(e.to_string()));
                }
            }

            self.run_action().await
        })
    }

    /// Runs only the handler, then the command's `after` hook.
    pub(crate) async fn run_action(&mut self) -> Result<Option<Value>> {
        let Some(action) = self.command.action.clone() else {
            return Ok(None);
        };
        let name = self.command.name.clone();
        let result = action.run(self).await;

        if let Some(after) = self.command.after.clone() {
            after(&self.args);
        }
        result.map_err(|e| ShellacError::handler(name, format!("{e:#}")))
    }
}

impl fmt::Debug for CommandInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandInstance")
            .field("command", &self.command.name)
            .field("args", &self.args)
            .field("cancelled", &self.token.is_cancelled())
            .field("downstream", &self.downstream)
            .finish()
    }
}
