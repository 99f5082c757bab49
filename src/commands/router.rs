//! Command matching and pipeline resolution.
//!
//! Resolves each pipeline stage to a registered command by trying the
//! longest leading-word prefix first, then aliases, then the catch-all.

use std::sync::Arc;

use tracing::debug;

use super::definitions::Command;
use super::registry::Registry;
use super::tokenizer::split_pipeline;
use crate::error::{Result, ShellacError};

/// A matched command and the raw text that follows its name.
#[derive(Debug, Clone)]
pub struct PipelineStage {
    /// The matched command.
    pub command: Arc<Command>,
    /// Unmatched tail of the stage; the whole stage for a catch-all.
    pub remainder: String,
}

/// Matches a single stage against the registry.
///
/// Names are tried for every prefix length (longest first) before aliases.
/// The catch-all is used only when the stage is not a strict leading-word
/// prefix of some longer registered name: with `do things well` registered,
/// `do things` is a miss rather than a catch-all hit.
pub fn match_command(registry: &Registry, stage: &str) -> Option<PipelineStage> {
    let stage = stage.trim();
    if stage.is_empty() {
        return None;
    }

    let parts: Vec<&str> = stage.split(' ').collect();

    let lookups: [fn(&Registry, &str) -> Option<Arc<Command>>; 2] =
        [Registry::find_by_name, Registry::find_by_alias];
    for lookup in lookups {
        for len in (1..=parts.len()).rev() {
            let candidate = parts[..len].join(" ");
            if let Some(command) = lookup(registry, candidate.trim()) {
                let remainder = parts[len..].join(" ");
                debug!(command = %command.name, remainder = %remainder, "Matched command");
                return Some(PipelineStage {
                    command,
                    remainder,
                });
            }
        }
    }

    let catch_all = registry.catch_all_command()?;
    if is_partial_command_name(registry, stage) {
        debug!(stage = %stage, "Stage is a partial command name; not using catch-all");
        return None;
    }

    Some(PipelineStage {
        command: catch_all,
        remainder: stage.to_string(),
    })
}

/// Returns true if `stage`'s words are a strict word prefix of a longer name.
fn is_partial_command_name(registry: &Registry, stage: &str) -> bool {
    let words: Vec<&str> = stage.split_whitespace().collect();
    registry
        .commands()
        .iter()
        .filter(|c| !c.catch_all)
        .any(|c| {
            let name_words: Vec<&str> = c.name.split_whitespace().collect();
            name_words.len() > words.len() && name_words[..words.len()] == words[..]
        })
}

/// Splits a line into stages and matches each one.
///
/// If the first stage's command declares a line rewriter, the line is passed
/// through it once and resolution restarts on the rewritten line.
pub fn parse_line(registry: &Registry, line: &str) -> Result<Vec<PipelineStage>> {
    let stages = resolve_stages(registry, line)?;

    let Some(rewrite) = stages.first().and_then(|s| s.command.rewriter.clone()) else {
        return Ok(stages);
    };

    let rewritten = rewrite(line, &stages[0].remainder);
    debug!(from = %line, to = %rewritten, "Rewrote command line");
    resolve_stages(registry, &rewritten)
}

fn resolve_stages(registry: &Registry, line: &str) -> Result<Vec<PipelineStage>> {
    split_pipeline(line)
        .iter()
        .map(|stage| {
            match_command(registry, stage)
                .ok_or_else(|| ShellacError::UnknownCommand(stage.clone()))
        })
        .collect()
}
