//! Interactive session: pipeline execution, modes, cancellation and history.
//!
//! A [`Session`] is a cheap, cloneable handle. Lines are executed one at a
//! time in arrival order; [`Session::cancel`] works while a line is running.

mod action;
mod instance;
mod output;

pub use action::{Action, ActionResult, Done, Logger};
pub use instance::CommandInstance;
pub use output::{BufferOutput, Output, StdoutOutput};

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use serde_json::{Map, Value};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::commands::binder::{bind, Args};
use crate::commands::definitions::{CancelHook, Command, DoneHook};
use crate::commands::help::render_help;
use crate::commands::registry::Registry;
use crate::commands::router::{parse_line, PipelineStage};
use crate::completion::{self, Completion, TabState};
use crate::config::{Config, SessionConfig};
use crate::error::{Result, ShellacError};
use crate::history::History;
use crate::persistence::{self, KeyValueStore};

const EVENT_CAPACITY: usize = 64;

/// What the session is doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Waiting for input.
    Idle,
    /// Running a pipeline.
    Executing,
    /// Waiting for input inside a mode.
    InMode,
    /// A cancel was requested and the pipeline has not finished yet.
    Cancelling,
}

/// Notifications published while lines run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A line started executing.
    CommandStarted { line: String },
    /// A line finished.
    CommandCompleted { line: String },
    /// A line or a downstream command failed.
    CommandFailed { command: String, error: String },
    /// A validator rejected its arguments.
    ValidationFailed { command: String, message: String },
    /// A running line was cancelled.
    Cancelled { line: String },
    /// A mode was entered.
    ModeEntered { command: String },
    /// A mode was left.
    ModeExited { command: String },
}

/// An entered mode.
#[derive(Debug)]
struct ModeFrame {
    command: Arc<Command>,
    previous_delimiter: String,
}

/// Session state guarded by a short-lived lock.
#[derive(Debug)]
struct Shared {
    state: SessionState,
    delimiter: String,
    modes: Vec<ModeFrame>,
    history: History,
    tabs: TabState,
}

/// The running pipeline, reachable by `cancel()`.
struct ActivePipeline {
    token: CancellationToken,
    hooks: Vec<CancelHook>,
    done: Vec<DoneHook>,
}

struct Inner {
    registry: RwLock<Registry>,
    settings: SessionConfig,
    shared: Mutex<Shared>,
    active: Mutex<Option<ActivePipeline>>,
    exec_turn: tokio::sync::Mutex<()>,
    output: Arc<dyn Output>,
    store: Option<Arc<dyn KeyValueStore>>,
    events: broadcast::Sender<SessionEvent>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Builder for [`Session`].
pub struct SessionBuilder {
    registry: Registry,
    config: Config,
    output: Arc<dyn Output>,
    store: Option<Arc<dyn KeyValueStore>>,
}

impl SessionBuilder {
    /// Uses an existing registry.
    pub fn registry(mut self, registry: Registry) -> Self {
        self.registry = registry;
        self
    }

    /// Applies configuration.
    pub fn config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Sets the output sink.
    pub fn output(mut self, output: Arc<dyn Output>) -> Self {
        self.output = output;
        self
    }

    /// Sets the store history is persisted to.
    pub fn store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Builds the session.
    pub fn build(self) -> Session {
        let history = match &self.config.history.id {
            Some(id) => History::with_id(id.clone(), self.config.history.max_entries),
            None => History::new(),
        };
        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Session {
            inner: Arc::new(Inner {
                registry: RwLock::new(self.registry),
                shared: Mutex::new(Shared {
                    state: SessionState::Idle,
                    delimiter: self.config.session.delimiter.clone(),
                    modes: Vec::new(),
                    history,
                    tabs: TabState::new(),
                }),
                settings: self.config.session,
                active: Mutex::new(None),
                exec_turn: tokio::sync::Mutex::new(()),
                output: self.output,
                store: self.store,
                events,
            }),
        }
    }
}

/// Handle to an interactive session.
#[derive(Clone)]
pub struct Session {
    inner: Arc<Inner>,
}

impl Default for Session {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl Session {
    /// Starts building a session with default configuration and stdout output.
    pub fn builder() -> SessionBuilder {
        SessionBuilder {
            registry: Registry::new(),
            config: Config::default(),
            output: Arc::new(StdoutOutput),
            store: None,
        }
    }

    /// Mutates the registry.
    ///
    /// ```ignore
    /// session.with_registry(|r| r.command("ping").action(pong).register())?;
    /// ```
    pub fn with_registry<R>(&self, f: impl FnOnce(&mut Registry) -> R) -> R {
        let mut registry = self
            .inner
            .registry
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        f(&mut registry)
    }

    /// Returns a snapshot of the registry.
    pub fn registry(&self) -> Registry {
        self.inner
            .registry
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns the current state.
    pub fn state(&self) -> SessionState {
        lock(&self.inner.shared).state
    }

    /// Returns the current prompt delimiter.
    pub fn delimiter(&self) -> String {
        lock(&self.inner.shared).delimiter.clone()
    }

    /// Sets the prompt delimiter.
    pub fn set_delimiter(&self, delimiter: impl Into<String>) {
        lock(&self.inner.shared).delimiter = delimiter.into();
    }

    /// Returns the name of the innermost active mode.
    pub fn mode(&self) -> Option<String> {
        lock(&self.inner.shared)
            .modes
            .last()
            .map(|m| m.command.name.clone())
    }

    /// Subscribes to session events.
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    /// Writes text to the session output.
    pub fn write(&self, text: &str) {
        self.inner.output.write(text);
    }

    pub(crate) fn emit(&self, event: SessionEvent) {
        // No subscribers is fine.
        let _ = self.inner.events.send(event);
    }

    /// Returns the help text for a command, by name or alias.
    pub fn help_text(&self, name: &str) -> Option<String> {
        self.registry().find(name).map(|c| render_help(&c))
    }

    /// Loads persisted history from the store.
    pub async fn load_history(&self) -> Result<()> {
        let Some(store) = self.inner.store.clone() else {
            return Ok(());
        };
        let Some(key) = lock(&self.inner.shared).history.key() else {
            return Ok(());
        };

        let entries = persistence::load_history(store.as_ref(), &key).await?;
        debug!(key = %key, count = entries.len(), "Loaded history");
        lock(&self.inner.shared).history.load(entries);
        Ok(())
    }

    /// Moves back through history (up arrow).
    pub fn history_previous(&self) -> Option<String> {
        lock(&self.inner.shared)
            .history
            .previous()
            .map(str::to_string)
    }

    /// Moves forward through history (down arrow). `""` past the newest entry.
    pub fn history_next(&self) -> String {
        lock(&self.inner.shared).history.next().to_string()
    }

    /// Returns the entries of the active history level, oldest first.
    pub fn history_entries(&self) -> Vec<String> {
        lock(&self.inner.shared).history.entries().to_vec()
    }

    /// Clears the active history level and its persisted copy.
    pub async fn clear_history(&self) -> Result<()> {
        let key = {
            let mut shared = lock(&self.inner.shared);
            shared.history.clear();
            shared.history.key()
        };
        if let (Some(store), Some(key)) = (self.inner.store.clone(), key) {
            store.remove(&key).await?;
        }
        Ok(())
    }

    /// Records `line` in history and persists it when outside a mode.
    pub async fn record(&self, line: &str) {
        let persisted = {
            let mut shared = lock(&self.inner.shared);
            shared.history.push(line);
            shared.history.persisted()
        };

        if let (Some(store), Some(persisted)) = (self.inner.store.clone(), persisted) {
            if let Err(e) = persistence::save_history(store.as_ref(), &persisted).await {
                warn!(error = %e, "Failed to persist history");
            }
        }
    }

    /// Records `line` in history, then executes it.
    pub async fn submit(&self, line: &str) -> Result<Option<Value>> {
        self.record(line).await;
        self.exec(line).await
    }

    /// Computes a tab completion for `line` with the cursor at byte `cursor`.
    pub async fn complete(&self, line: &str, cursor: usize) -> Option<Completion> {
        let registry = self.registry();
        let result = completion::complete(&registry, line, cursor).await;
        lock(&self.inner.shared).tabs.handle(result)
    }

    /// Executes a line.
    ///
    /// Returns the first stage's result. Cancellation is not an error.
    pub async fn exec(&self, line: &str) -> Result<Option<Value>> {
        self.exec_inner(line, None).await
    }

    /// Executes a line with structured arguments merged over the first stage.
    pub async fn exec_with_args(
        &self,
        line: &str,
        overrides: Map<String, Value>,
    ) -> Result<Option<Value>> {
        self.exec_inner(line, Some(overrides)).await
    }

    /// Cancels the running pipeline, if any.
    ///
    /// Cancel hooks run synchronously; handlers observe the token and stop on
    /// their own. Returns false when nothing is running.
    pub fn cancel(&self) -> bool {
        // Lock order: `active`, then `shared`. `finish` clears both under the
        // same order, so a finished pipeline never ends up `Cancelling`.
        let hooks = {
            let active = lock(&self.inner.active);
            let Some(active) = active.as_ref() else {
                return false;
            };
            if active.token.is_cancelled() {
                return false;
            }
            active.token.cancel();
            lock(&self.inner.shared).state = SessionState::Cancelling;
            active.hooks.clone()
        };

        info!("Cancelling running command");
        for hook in hooks {
            hook();
        }
        true
    }

    async fn exec_inner(
        &self,
        line: &str,
        overrides: Option<Map<String, Value>>,
    ) -> Result<Option<Value>> {
        let _turn = self.inner.exec_turn.lock().await;

        let mode = lock(&self.inner.shared)
            .modes
            .last()
            .map(|m| Arc::clone(&m.command));
        if let Some(mode) = mode {
            return self.exec_in_mode(mode, line, overrides).await;
        }

        let registry = self.registry();
        let stages = match parse_line(&registry, line) {
            Ok(stages) => stages,
            Err(err) => {
                self.write(&err.to_string());
                self.emit(SessionEvent::CommandFailed {
                    command: line.to_string(),
                    error: err.to_string(),
                });
                return Err(err);
            }
        };
        if stages.is_empty() {
            return Ok(None);
        }

        let token = CancellationToken::new();
        let mut chain = self.bind_stages(&stages, overrides, &token)?;

        self.begin(line, &stages, token.clone());
        let result = if stages[0].command.is_mode() {
            self.enter_mode(Arc::clone(&stages[0].command), &mut chain)
                .await
        } else {
            chain.run().await
        };
        self.finish(line, &token, &result);
        result
    }

    /// Binds every stage and links them, first stage at the head.
    fn bind_stages(
        &self,
        stages: &[PipelineStage],
        mut overrides: Option<Map<String, Value>>,
        token: &CancellationToken,
    ) -> Result<CommandInstance> {
        let normalize = self.inner.settings.normalize_key_values;
        let mut instances = Vec::with_capacity(stages.len());

        for stage in stages {
            let mut args = match bind(&stage.command, &stage.remainder, normalize) {
                Ok(args) => args,
                Err(source) => {
                    self.write(&source.to_string());
                    self.write(&render_help(&stage.command));
                    return Err(ShellacError::Binding {
                        command: stage.command.name.clone(),
                        source,
                    });
                }
            };
            if let Some(overrides) = overrides.take() {
                args.merge(overrides);
            }
            instances.push(CommandInstance::new(
                Arc::clone(&stage.command),
                args,
                self.clone(),
                token.clone(),
            ));
        }

        let mut chain: Option<CommandInstance> = None;
        while let Some(mut instance) = instances.pop() {
            if let Some(downstream) = chain.take() {
                instance.pipe_into(downstream);
            }
            chain = Some(instance);
        }
        chain.ok_or_else(|| ShellacError::invalid_command("empty pipeline"))
    }

    fn begin(&self, line: &str, stages: &[PipelineStage], token: CancellationToken) {
        let hooks = stages
            .iter()
            .filter_map(|s| s.command.cancel_hook.clone())
            .collect();
        let done = stages
            .iter()
            .filter_map(|s| s.command.done.clone())
            .collect();
        {
            let mut active = lock(&self.inner.active);
            *active = Some(ActivePipeline { token, hooks, done });
            lock(&self.inner.shared).state = SessionState::Executing;
        }

        debug!(line = %line, stages = stages.len(), "Executing");
        self.emit(SessionEvent::CommandStarted {
            line: line.to_string(),
        });
    }

    fn finish(&self, line: &str, token: &CancellationToken, result: &Result<Option<Value>>) {
        let finished = {
            let mut active = lock(&self.inner.active);
            let finished = active.take();
            let mut shared = lock(&self.inner.shared);
            shared.state = if shared.modes.is_empty() {
                SessionState::Idle
            } else {
                SessionState::InMode
            };
            finished
        };
        for hook in finished.into_iter().flat_map(|p| p.done) {
            hook();
        }

        let event = match result {
            _ if token.is_cancelled() => SessionEvent::Cancelled {
                line: line.to_string(),
            },
            Ok(_) => SessionEvent::CommandCompleted {
                line: line.to_string(),
            },
            Err(ShellacError::Validation(message)) => {
                self.write(message);
                SessionEvent::ValidationFailed {
                    command: line.to_string(),
                    message: message.clone(),
                }
            }
            Err(err) => {
                self.write(&err.to_string());
                SessionEvent::CommandFailed {
                    command: line.to_string(),
                    error: err.to_string(),
                }
            }
        };
        self.emit(event);
    }

    /// Enters the mode of `instance`'s command and runs its init handler.
    async fn enter_mode(
        &self,
        command: Arc<Command>,
        instance: &mut CommandInstance,
    ) -> Result<Option<Value>> {
        if let Some(validator) = command.validator.clone() {
            validator(&instance.args).map_err(|e| ShellacError::validation(e.to_string()))?;
        }

        {
            let mut shared = lock(&self.inner.shared);
            let previous_delimiter = shared.delimiter.clone();
            if let Some(delimiter) = command.mode.as_ref().and_then(|m| m.delimiter.clone()) {
                shared.delimiter = delimiter;
            }
            shared.history.enter_mode();
            shared.modes.push(ModeFrame {
                command: Arc::clone(&command),
                previous_delimiter,
            });
        }

        info!(mode = %command.name, "Entered mode");
        self.emit(SessionEvent::ModeEntered {
            command: command.name.clone(),
        });

        match command.mode.as_ref().and_then(|m| m.init.clone()) {
            Some(init) => init
                .run(instance)
                .await
                .map_err(|e| ShellacError::handler(&command.name, format!("{e:#}"))),
            None => Ok(None),
        }
    }

    /// Leaves the innermost mode.
    fn exit_mode(&self) {
        let frame = {
            let mut shared = lock(&self.inner.shared);
            let Some(frame) = shared.modes.pop() else {
                return;
            };
            shared.delimiter = frame.previous_delimiter.clone();
            shared.history.exit_mode();
            shared.state = if shared.modes.is_empty() {
                SessionState::Idle
            } else {
                SessionState::InMode
            };
            frame
        };

        info!(mode = %frame.command.name, "Exited mode");
        self.emit(SessionEvent::ModeExited {
            command: frame.command.name.clone(),
        });
    }

    /// Runs a line inside a mode: the exit word leaves, anything else goes to
    /// the mode's handler as `args.command`.
    async fn exec_in_mode(
        &self,
        mode: Arc<Command>,
        line: &str,
        overrides: Option<Map<String, Value>>,
    ) -> Result<Option<Value>> {
        if line.trim() == self.inner.settings.exit_command {
            self.exit_mode();
            return Ok(None);
        }

        let mut args = Args::default();
        args.values
            .insert("command".to_string(), Value::String(line.to_string()));
        if let Some(overrides) = overrides {
            args.merge(overrides);
        }

        let token = CancellationToken::new();
        let mut instance = CommandInstance::new(Arc::clone(&mode), args, self.clone(), token.clone());
        let stage = PipelineStage {
            command: mode,
            remainder: line.to_string(),
        };

        self.begin(line, std::slice::from_ref(&stage), token.clone());
        let result = instance.run_action().await;
        self.finish(line, &token, &result);
        result
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state())
            .field("delimiter", &self.delimiter())
            .field("mode", &self.mode())
            .finish_non_exhaustive()
    }
}
