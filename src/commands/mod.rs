//! Command registration, resolution and argument binding.
//!
//! This module keeps line parsing separate from execution so that matching
//! and binding can be unit tested without a running session.

pub mod binder;
pub mod definitions;
pub mod help;
pub mod registry;
pub mod router;
pub mod tokenizer;

pub use binder::{bind, Args};
pub use definitions::{ArgSpec, Command, ModeSpec, OptionSpec, TypeHints};
pub use registry::{CommandBuilder, Registry};
pub use router::{match_command, parse_line, PipelineStage};
pub use tokenizer::{split_pipeline, tokenize, Token};
