//! Command definitions: the descriptor a registry stores for each command.
//!
//! A [`Command`] is built once through the registry's builder and is
//! immutable afterwards; the registry hands out `Arc<Command>` snapshots.

use std::fmt;
use std::sync::Arc;

use crate::commands::binder::Args;
use crate::completion::CompletionSource;
use crate::session::Action;

/// Validates bound arguments before the handler runs.
pub type Validator = Arc<dyn Fn(&Args) -> anyhow::Result<()> + Send + Sync>;

/// Invoked synchronously when a running instance of the command is cancelled.
pub type CancelHook = Arc<dyn Fn() + Send + Sync>;

/// Runs after the command's handler settles, with the arguments it ran with.
pub type AfterHook = Arc<dyn Fn(&Args) + Send + Sync>;

/// Runs once the whole pipeline containing the command has finished.
pub type DoneHook = Arc<dyn Fn() + Send + Sync>;

/// Rewrites a stage before it is matched again: `(stage, remainder) -> new line`.
pub type LineRewriter = Arc<dyn Fn(&str, &str) -> String + Send + Sync>;

/// Produces custom help text for a command.
pub type HelpProvider = Arc<dyn Fn(&Command) -> String + Send + Sync>;

/// Definition of a positional argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgSpec {
    /// Argument name, used as the key in bound args.
    pub name: String,
    /// Whether binding fails when the argument is missing.
    pub required: bool,
    /// Whether the argument collects all remaining positional words.
    pub variadic: bool,
}

impl ArgSpec {
    /// Parses `<name>`, `[name]`, `<name...>` or `[name...]`.
    pub fn parse(word: &str) -> Option<Self> {
        let (required, inner) = if let Some(inner) = word.strip_prefix('<') {
            (true, inner.strip_suffix('>').unwrap_or(inner))
        } else if let Some(inner) = word.strip_prefix('[') {
            (false, inner.strip_suffix(']').unwrap_or(inner))
        } else {
            return None;
        };

        let (name, variadic) = match inner.strip_suffix("...") {
            Some(name) if !name.is_empty() => (name, true),
            _ => (inner, false),
        };

        if name.is_empty() {
            return None;
        }

        Some(Self {
            name: name.to_string(),
            required,
            variadic,
        })
    }

    /// Human readable form for usage lines: `<name>` or `[name...]`.
    pub fn display_name(&self) -> String {
        let name = if self.variadic {
            format!("{}...", self.name)
        } else {
            self.name.clone()
        };
        if self.required {
            format!("<{name}>")
        } else {
            format!("[{name}]")
        }
    }
}

/// Definition of a command option such as `-p, --port <port>`.
#[derive(Clone)]
pub struct OptionSpec {
    /// The flags string as declared, shown in help.
    pub flags: String,
    /// Short flag including its dash (`-p`).
    pub short: Option<String>,
    /// Long flag including its dashes (`--port` or `--no-color`).
    pub long: Option<String>,
    /// Short description shown in help.
    pub description: String,
    /// Declared with a `<value>` marker.
    pub required: bool,
    /// Declared with a `[value]` marker.
    pub optional: bool,
    /// Declared as `--no-*`.
    pub negatable: bool,
    /// Completion data for the option's value position.
    pub completion: Option<CompletionSource>,
}

impl OptionSpec {
    /// Parses a flags string like `-p, --port <port>` or `--no-cheese`.
    pub fn parse(flags: &str, description: impl Into<String>) -> Self {
        let parts: Vec<&str> = flags
            .split(|c: char| c == ' ' || c == ',' || c == '|')
            .filter(|s| !s.is_empty())
            .collect();

        let mut short = None;
        let mut long = None;
        let mut assign = |flag: &str| {
            if flag.starts_with("--") {
                long = Some(flag.to_string());
            } else {
                short = Some(flag.to_string());
            }
        };

        let mut iter = parts.iter();
        if parts.len() > 1 && !parts[1].starts_with('[') && !parts[1].starts_with('<') {
            if let Some(first) = iter.next() {
                assign(first);
            }
        }
        if let Some(next) = iter.next() {
            assign(next);
        }

        Self {
            flags: flags.to_string(),
            short,
            long,
            description: description.into(),
            required: flags.contains('<'),
            optional: flags.contains('['),
            negatable: flags.contains("-no-"),
            completion: None,
        }
    }

    /// Returns the option name: long flag without dashes or `no-`, else the short letter.
    pub fn name(&self) -> String {
        match (&self.long, &self.short) {
            (Some(long), _) => long.trim_start_matches('-').replacen("no-", "", 1),
            (None, Some(short)) => short.trim_start_matches('-').to_string(),
            (None, None) => String::new(),
        }
    }

    /// Key under which the short flag appears in parsed flags.
    pub fn short_key(&self) -> Option<String> {
        self.short.as_ref().map(|s| s.replace('-', ""))
    }

    /// Key under which the long flag appears in parsed flags (`--no-x` → `x`).
    pub fn long_key(&self) -> Option<String> {
        self.long
            .as_ref()
            .map(|l| l.replacen("--no-", "", 1).trim_start_matches('-').to_string())
    }

    /// Returns true if `flag` is this option's short or long form.
    pub fn is(&self, flag: &str) -> bool {
        self.short.as_deref() == Some(flag) || self.long.as_deref() == Some(flag)
    }

    /// Returns true if the option carries no value marker.
    pub fn is_boolean(&self) -> bool {
        !self.required && !self.optional
    }
}

impl fmt::Debug for OptionSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OptionSpec")
            .field("flags", &self.flags)
            .field("short", &self.short)
            .field("long", &self.long)
            .field("required", &self.required)
            .field("optional", &self.optional)
            .field("negatable", &self.negatable)
            .finish()
    }
}

/// Static typing hints for flag values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypeHints {
    /// Keys whose values are never coerced to numbers.
    pub string: Vec<String>,
    /// Keys that never consume a following value.
    pub boolean: Vec<String>,
}

/// Mode configuration for commands that open a nested REPL context.
#[derive(Clone, Default)]
pub struct ModeSpec {
    /// Prompt delimiter while the mode is active.
    pub delimiter: Option<String>,
    /// Runs once when the mode is entered.
    pub init: Option<Action>,
}

/// A registered command.
#[derive(Clone, Default)]
pub struct Command {
    /// Primary command name; may contain spaces (`"do things well"`).
    pub name: String,
    /// Alternative names for the command.
    pub aliases: Vec<String>,
    /// Short description shown in help.
    pub description: Option<String>,
    /// Positional arguments, sorted required → optional → variadic.
    pub args: Vec<ArgSpec>,
    /// Declared options.
    pub options: Vec<OptionSpec>,
    /// The handler.
    pub action: Option<Action>,
    /// Runs before the handler; an error aborts the stage.
    pub validator: Option<Validator>,
    /// Runs when an instance is cancelled.
    pub cancel_hook: Option<CancelHook>,
    /// Runs after each invocation of the handler.
    pub after: Option<AfterHook>,
    /// Runs when the line the command was part of has finished.
    pub done: Option<DoneHook>,
    /// Matches any otherwise-unmatched input.
    pub catch_all: bool,
    /// Set for mode commands.
    pub mode: Option<ModeSpec>,
    /// Undeclared flags are passed through instead of failing binding.
    pub allow_unknown_options: bool,
    /// Rewrites the line before dispatch.
    pub rewriter: Option<LineRewriter>,
    /// Completion data for the command's arguments.
    pub completion: Option<CompletionSource>,
    /// Static typing hints for flag values.
    pub types: TypeHints,
    /// Hidden from help listings.
    pub hidden: bool,
    /// Custom usage line.
    pub usage: Option<String>,
    /// Custom help output.
    pub help: Option<HelpProvider>,
}

impl Command {
    /// Creates a command from a spec such as `"say <words...>"`.
    ///
    /// Leading words form the name; `<...>` and `[...]` words declare arguments.
    pub fn from_spec(spec: &str) -> Self {
        let mut name_parts = Vec::new();
        let mut args = Vec::new();

        for word in spec.split_whitespace() {
            match ArgSpec::parse(word) {
                Some(arg) => args.push(arg),
                None if args.is_empty() => name_parts.push(word),
                None => {}
            }
        }

        let mut command = Self {
            name: name_parts.join(" "),
            ..Self::default()
        };
        command.set_args(args);
        command
    }

    /// Replaces the argument list, keeping required args first and the variadic last.
    pub fn set_args(&mut self, mut args: Vec<ArgSpec>) {
        args.sort_by_key(|arg| (!arg.required, arg.variadic));
        self.args = args;
    }

    /// Returns true if `name` is this command's name or one of its aliases.
    pub fn answers_to(&self, name: &str) -> bool {
        self.name == name || self.aliases.iter().any(|a| a == name)
    }

    /// Returns true if this is a mode command.
    pub fn is_mode(&self) -> bool {
        self.mode.is_some()
    }

    /// Finds a declared option by its short or long flag.
    pub fn find_option(&self, flag: &str) -> Option<&OptionSpec> {
        self.options.iter().find(|o| o.is(flag))
    }
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Command")
            .field("name", &self.name)
            .field("aliases", &self.aliases)
            .field("args", &self.args)
            .field("options", &self.options)
            .field("catch_all", &self.catch_all)
            .field("mode", &self.is_mode())
            .field("allow_unknown_options", &self.allow_unknown_options)
            .finish_non_exhaustive()
    }
}
