//! Command registry and the single-use registration builder.

use std::sync::Arc;

use tracing::debug;

use crate::commands::binder::Args;
use crate::commands::definitions::{
    Command, HelpProvider, ModeSpec, OptionSpec, TypeHints,
};
use crate::completion::CompletionSource;
use crate::error::{Result, ShellacError};
use crate::session::Action;

/// Name given to a catch-all command declared without a name.
pub const CATCH_ALL_NAME: &str = "*";

/// The set of registered commands.
///
/// Cloning is cheap: commands are shared behind `Arc`, so a clone works as
/// a snapshot that later registrations do not affect.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    commands: Vec<Arc<Command>>,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts registering a command from a spec such as `"say <words...>"`.
    pub fn command(&mut self, spec: &str) -> CommandBuilder<'_> {
        CommandBuilder::new(self, Command::from_spec(spec))
    }

    /// Starts registering a mode command.
    pub fn mode(&mut self, spec: &str) -> CommandBuilder<'_> {
        let mut command = Command::from_spec(spec);
        command.mode = Some(ModeSpec::default());
        CommandBuilder::new(self, command)
    }

    /// Starts registering the catch-all command, replacing any previous one.
    pub fn catch_all(&mut self, spec: &str) -> CommandBuilder<'_> {
        let mut command = Command::from_spec(spec);
        if command.name.is_empty() {
            command.name = CATCH_ALL_NAME.to_string();
        }
        command.catch_all = true;
        CommandBuilder::new(self, command)
    }

    /// Adds a fully built command.
    ///
    /// A command with the same name is replaced. Aliases are checked against
    /// every other command before anything is mutated.
    pub fn register(&mut self, command: Command) -> Result<Arc<Command>> {
        if command.name.is_empty() {
            return Err(ShellacError::invalid_command("command name is empty"));
        }

        for (idx, alias) in command.aliases.iter().enumerate() {
            if command.aliases[..idx].contains(alias) {
                return Err(duplicate_alias(alias, &command.name, &command.name));
            }
            let owner = self
                .commands
                .iter()
                .filter(|existing| existing.name != command.name)
                .find(|existing| existing.aliases.contains(alias));
            if let Some(owner) = owner {
                return Err(duplicate_alias(alias, &command.name, &owner.name));
            }
        }

        self.commands.retain(|existing| {
            existing.name != command.name && !(command.catch_all && existing.catch_all)
        });

        debug!(
            name = %command.name,
            aliases = ?command.aliases,
            mode = command.is_mode(),
            catch_all = command.catch_all,
            "Registered command"
        );

        let command = Arc::new(command);
        self.commands.push(Arc::clone(&command));
        Ok(command)
    }

    /// Removes a command by name, returning it if it was registered.
    pub fn remove(&mut self, name: &str) -> Option<Arc<Command>> {
        let idx = self.commands.iter().position(|c| c.name == name)?;
        Some(self.commands.remove(idx))
    }

    /// Finds a command by name, then by alias.
    pub fn find(&self, name: &str) -> Option<Arc<Command>> {
        self.find_by_name(name).or_else(|| self.find_by_alias(name))
    }

    /// Finds a non-catch-all command by its exact name.
    pub fn find_by_name(&self, name: &str) -> Option<Arc<Command>> {
        self.commands
            .iter()
            .find(|c| !c.catch_all && c.name == name)
            .cloned()
    }

    /// Finds a non-catch-all command by one of its aliases.
    pub fn find_by_alias(&self, alias: &str) -> Option<Arc<Command>> {
        self.commands
            .iter()
            .find(|c| !c.catch_all && c.aliases.iter().any(|a| a == alias))
            .cloned()
    }

    /// Returns the catch-all command, if one is registered.
    pub fn catch_all_command(&self) -> Option<Arc<Command>> {
        self.commands.iter().find(|c| c.catch_all).cloned()
    }

    /// Returns all registered commands in registration order.
    pub fn commands(&self) -> &[Arc<Command>] {
        &self.commands
    }

    /// Returns the names and aliases of every non-catch-all command, sorted.
    pub fn names_and_aliases(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .commands
            .iter()
            .filter(|c| !c.catch_all)
            .flat_map(|c| std::iter::once(c.name.clone()).chain(c.aliases.iter().cloned()))
            .collect();
        names.sort();
        names
    }

    /// Returns the number of registered commands.
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Returns true if no commands are registered.
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

fn duplicate_alias(alias: &str, command: &str, owner: &str) -> ShellacError {
    ShellacError::DuplicateAlias {
        alias: alias.to_string(),
        command: command.to_string(),
        owner: owner.to_string(),
    }
}

/// Single-use builder returned by [`Registry::command`] and friends.
///
/// Nothing is registered until [`CommandBuilder::register`] is called.
#[must_use = "the command is not registered until `register()` is called"]
pub struct CommandBuilder<'r> {
    registry: &'r mut Registry,
    command: Command,
    misuse: Option<String>,
}

impl<'r> CommandBuilder<'r> {
    fn new(registry: &'r mut Registry, command: Command) -> Self {
        Self {
            registry,
            command,
            misuse: None,
        }
    }

    /// Sets the description shown in help.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.command.description = Some(description.into());
        self
    }

    /// Declares an option such as `-p, --port <port>`.
    pub fn option(mut self, flags: &str, description: impl Into<String>) -> Self {
        self.command
            .options
            .push(OptionSpec::parse(flags, description));
        self
    }

    /// Declares an option whose value position completes from `source`.
    pub fn option_with_completion(
        mut self,
        flags: &str,
        description: impl Into<String>,
        source: CompletionSource,
    ) -> Self {
        let mut option = OptionSpec::parse(flags, description);
        option.completion = Some(source);
        self.command.options.push(option);
        self
    }

    /// Sets the handler.
    pub fn action(mut self, action: Action) -> Self {
        self.command.action = Some(action);
        self
    }

    /// Sets a validator that runs before the handler.
    pub fn validate<F>(mut self, validator: F) -> Self
    where
        F: Fn(&Args) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.command.validator = Some(Arc::new(validator));
        self
    }

    /// Sets a hook invoked when a running instance is cancelled.
    pub fn cancel<F>(mut self, hook: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.command.cancel_hook = Some(Arc::new(hook));
        self
    }

    /// Sets a hook that runs after every invocation of the handler.
    pub fn after<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Args) + Send + Sync + 'static,
    {
        self.command.after = Some(Arc::new(hook));
        self
    }

    /// Sets a hook that runs once the line containing the command has finished,
    /// whether it completed, failed or was cancelled.
    pub fn done<F>(mut self, hook: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.command.done = Some(Arc::new(hook));
        self
    }

    /// Applies a reusable piece of configuration.
    ///
    /// ```ignore
    /// fn verbose(b: CommandBuilder<'_>) -> CommandBuilder<'_> {
    ///     b.option("-v, --verbose", "Chatty output")
    /// }
    /// registry.command("build").with(verbose).register()?;
    /// ```
    pub fn with<F>(self, compose: F) -> Self
    where
        F: FnOnce(Self) -> Self,
    {
        compose(self)
    }

    /// Adds an alias.
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.command.aliases.push(alias.into());
        self
    }

    /// Adds several aliases.
    pub fn aliases<I, S>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.command
            .aliases
            .extend(aliases.into_iter().map(Into::into));
        self
    }

    /// Sets static typing hints for flag values.
    pub fn types(mut self, types: TypeHints) -> Self {
        self.command.types = types;
        self
    }

    /// Passes undeclared flags through instead of failing binding.
    pub fn allow_unknown_options(mut self) -> Self {
        self.command.allow_unknown_options = true;
        self
    }

    /// Sets the completion source for the command's arguments.
    pub fn autocomplete(mut self, source: CompletionSource) -> Self {
        self.command.completion = Some(source);
        self
    }

    /// Sets a line rewriter: `(line, remainder) -> new line`.
    pub fn parse<F>(mut self, rewriter: F) -> Self
    where
        F: Fn(&str, &str) -> String + Send + Sync + 'static,
    {
        self.command.rewriter = Some(Arc::new(rewriter));
        self
    }

    /// Replaces the generated help text.
    pub fn help<F>(mut self, help: F) -> Self
    where
        F: Fn(&Command) -> String + Send + Sync + 'static,
    {
        let help: HelpProvider = Arc::new(help);
        self.command.help = Some(help);
        self
    }

    /// Replaces the generated usage line.
    pub fn usage(mut self, usage: impl Into<String>) -> Self {
        self.command.usage = Some(usage.into());
        self
    }

    /// Hides the command from help listings.
    pub fn hidden(mut self) -> Self {
        self.command.hidden = true;
        self
    }

    /// Sets the prompt delimiter used while a mode is active.
    pub fn delimiter(mut self, delimiter: impl Into<String>) -> Self {
        match self.command.mode.as_mut() {
            Some(mode) => mode.delimiter = Some(delimiter.into()),
            None => self.misuse_of("delimiter"),
        }
        self
    }

    /// Sets a handler that runs once when the mode is entered.
    pub fn init(mut self, action: Action) -> Self {
        match self.command.mode.as_mut() {
            Some(mode) => mode.init = Some(action),
            None => self.misuse_of("init"),
        }
        self
    }

    fn misuse_of(&mut self, method: &str) {
        self.misuse.get_or_insert_with(|| {
            format!(
                "{method}() is only available on mode commands (\"{}\")",
                self.command.name
            )
        });
    }

    /// Registers the command, replacing any command with the same name.
    pub fn register(self) -> Result<Arc<Command>> {
        if let Some(misuse) = self.misuse {
            return Err(ShellacError::invalid_command(misuse));
        }
        self.registry.register(self.command)
    }
}
