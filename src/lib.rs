//! Shellac - an embeddable framework for interactive command-line applications.
//!
//! Hosts register commands on a [`Registry`], then feed lines to a
//! [`Session`], which resolves pipelines, binds arguments, runs handlers and
//! keeps history. Tab completion is available through [`Session::complete`].

pub mod commands;
pub mod completion;
pub mod config;
pub mod error;
pub mod history;
pub mod logging;
pub mod persistence;
pub mod session;

pub use commands::{Args, Command, Registry};
pub use completion::{Completion, CompletionSource};
pub use config::Config;
pub use error::{BindError, Result, ShellacError};
pub use session::{Action, CommandInstance, Session, SessionEvent, SessionState};
