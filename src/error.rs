//! Error types for Shellac.
//!
//! Defines the main error enum used throughout the crate, plus the
//! [`BindError`] value returned by the argument binder.

use thiserror::Error;

/// Main error type for Shellac operations.
#[derive(Error, Debug)]
pub enum ShellacError {
    /// An alias was registered twice. This is a programming error in the host.
    #[error("Duplicate alias \"{alias}\" for command \"{command}\" detected. Was first reserved by command \"{owner}\".")]
    DuplicateAlias {
        alias: String,
        command: String,
        owner: String,
    },

    /// A command was configured in a way that cannot work (e.g. `init` on a non-mode command).
    #[error("Invalid command definition: {0}")]
    InvalidCommand(String),

    /// No registered command matches the input.
    #[error("Invalid command: {0}")]
    UnknownCommand(String),

    /// Arguments could not be bound against the command schema.
    #[error("{command}: {source}")]
    Binding {
        command: String,
        #[source]
        source: BindError,
    },

    /// A validator rejected the bound arguments.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A handler failed or rejected its result.
    #[error("Command \"{command}\" failed: {message}")]
    Handler { command: String, message: String },

    /// History or key-value store errors.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Configuration errors (invalid config file, bad values, etc.)
    #[error("Configuration error: {0}")]
    Config(String),
}

impl ShellacError {
    /// Creates an invalid command definition error.
    pub fn invalid_command(msg: impl Into<String>) -> Self {
        Self::InvalidCommand(msg.into())
    }

    /// Creates a validation error with the given message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Creates a handler error for the given command.
    pub fn handler(command: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::Handler {
            command: command.into(),
            message: msg.into(),
        }
    }

    /// Creates a persistence error with the given message.
    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }

    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::DuplicateAlias { .. } | Self::InvalidCommand(_) => "Registration Error",
            Self::UnknownCommand(_) => "Unknown Command",
            Self::Binding { .. } => "Binding Error",
            Self::Validation(_) => "Validation Error",
            Self::Handler { .. } => "Handler Error",
            Self::Persistence(_) => "Persistence Error",
            Self::Config(_) => "Configuration Error",
        }
    }
}

/// Why a remainder string could not be bound to a command schema.
///
/// Binding failures are values, not panics: the session renders the message
/// followed by the command's help text.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BindError {
    #[error("Missing required argument <{0}>. Showing Help:")]
    MissingArgument(String),

    #[error("Missing required value for option {0}. Showing Help:")]
    MissingOptionValue(String),

    #[error("Invalid option: '{0}'. Showing Help:")]
    InvalidOption(String),
}

/// Result type alias using ShellacError.
pub type Result<T> = std::result::Result<T, ShellacError>;
