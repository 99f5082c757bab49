//! Tab completion for partially typed lines.
//!
//! [`complete`] is stateless: it looks at the line, the cursor and the
//! registry and produces either a rewritten line or a candidate list.
//! [`TabState`] holds the per-session tab counter that decides when a
//! candidate list is actually shown.

mod source;

pub use source::{CompletionSource, Reply};

use std::sync::{Arc, OnceLock};

use regex::Regex;
use tracing::debug;

use crate::commands::definitions::Command;
use crate::commands::registry::Registry;

/// What the line editor should do after a tab press.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// Replace the input with this line.
    Line(String),
    /// Show these candidates.
    Candidates(Vec<String>),
}

/// Raw output of the matching engine, before tab counting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Suggestion {
    /// A completed line.
    Line(String),
    /// Candidates to list; may be empty.
    List(Vec<String>),
}

/// A suggestion plus whether tab counting should keep accumulating.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionResult {
    pub suggestion: Suggestion,
    /// Set when the completed word ends in `/`, so repeated tabs keep counting.
    pub freeze: bool,
}

/// Result of reducing a query against candidates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reduction {
    /// A unique or extended completion.
    Single(String),
    /// Several candidates remain.
    Many(Vec<String>),
}

/// Per-session tab counting.
#[derive(Debug, Default, Clone)]
pub struct TabState {
    count: usize,
}

impl TabState {
    /// Creates a fresh tab state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of consecutive list results seen.
    pub fn count(&self) -> usize {
        self.count
    }

    /// Applies tab counting to a raw result.
    ///
    /// Lists are only surfaced from the second consecutive list result on, and
    /// never when empty. A line result resets the counter unless frozen.
    pub fn handle(&mut self, result: CompletionResult) -> Option<Completion> {
        match result.suggestion {
            Suggestion::List(items) => {
                self.count += 1;
                (self.count > 1 && !items.is_empty()).then_some(Completion::Candidates(items))
            }
            Suggestion::Line(line) => {
                self.count = if result.freeze { self.count + 1 } else { 0 };
                Some(Completion::Line(line))
            }
        }
    }
}

/// The input split around the cursor.
#[derive(Debug, Clone, Default)]
struct InputParts {
    /// Everything before the current pipe stage, pipe included.
    prefix: String,
    /// The current stage up to the cursor.
    context: String,
    /// Text after the current word, without its leading separator.
    suffix: String,
    /// The option word right before the current word, if any.
    option: Option<String>,
}

impl InputParts {
    fn parse(line: &str, cursor: usize) -> Self {
        let mut cursor = cursor.min(line.len());
        while !line.is_char_boundary(cursor) {
            cursor -= 1;
        }
        let (before, after) = line.split_at(cursor);

        let (prefix, context) = match before.rfind('|') {
            Some(idx) => (&before[..=idx], &before[idx + 1..]),
            None => ("", before),
        };

        Self {
            prefix: prefix.to_string(),
            context: context.to_string(),
            suffix: suffix_after_word(after),
            option: None,
        }
    }

    fn assemble(&self, context: &str) -> String {
        strip_ansi(&format!("{}{}{}", self.prefix, context, self.suffix))
    }
}

/// Drops the rest of the current word and one separator.
fn suffix_after_word(after: &str) -> String {
    let rest = match after.find(char::is_whitespace) {
        Some(idx) => &after[idx..],
        None => "",
    };
    let mut chars = rest.chars();
    chars.next();
    chars.as_str().to_string()
}

/// Removes ANSI color sequences.
pub fn strip_ansi(text: &str) -> String {
    static ANSI: OnceLock<Regex> = OnceLock::new();
    let ansi = ANSI.get_or_init(|| Regex::new(r"\x1b\[[0-9;]*m").expect("ansi pattern is valid"));
    ansi.replace_all(text, "").into_owned()
}

/// Reduces `query` against `candidates`.
///
/// Unless `ignore_slashes` is set, only the part after the last `/` is
/// matched and the part before it is put back in front of the result.
pub fn reduce(query: &str, candidates: &[String], ignore_slashes: bool) -> Option<Reduction> {
    let mut candidates = candidates.to_vec();
    candidates.sort();

    let (prefix, query) = match query.rfind('/') {
        Some(idx) if !ignore_slashes => (&query[..=idx], &query[idx + 1..]),
        _ => ("", query),
    };

    let matches: Vec<String> = candidates
        .into_iter()
        .filter(|c| strip_ansi(c).starts_with(query))
        .collect();

    match matches.as_slice() {
        [] => None,
        [only] => {
            let space = if strip_ansi(only).ends_with('/') { "" } else { " " };
            Some(Reduction::Single(format!("{prefix}{only}{space}")))
        }
        _ if query.is_empty() => Some(Reduction::Many(matches)),
        _ => {
            let plain: Vec<String> = matches.iter().map(|m| strip_ansi(m)).collect();
            let (first, rest) = (&plain[0], &plain[1..]);
            let shared = rest.iter().fold(first.chars().count(), |len, item| {
                first
                    .chars()
                    .zip(item.chars())
                    .take(len)
                    .take_while(|(a, b)| a == b)
                    .count()
            });
            if shared == query.chars().count() {
                return Some(Reduction::Many(matches));
            }
            let head: String = first.chars().take(shared).collect();
            Some(Reduction::Single(format!("{prefix}{head}")))
        }
    }
}

/// Like [`reduce`], but ignores and then restores leading whitespace.
fn reduce_context(context: &str, candidates: &[String], ignore_slashes: bool) -> Option<Reduction> {
    let trimmed = context.trim_start();
    let leading = &context[..context.len() - trimmed.len()];
    match reduce(trimmed, candidates, ignore_slashes)? {
        Reduction::Single(s) => Some(Reduction::Single(format!("{leading}{s}"))),
        many => Some(many),
    }
}

/// Filters candidates by the typed text, trimming multi-word candidates by the
/// number of words already typed.
pub fn filter_candidates(typed: &str, candidates: &[String]) -> Vec<String> {
    let typed = typed.trim();
    let typed = typed.rsplit('/').next().unwrap_or(typed);
    let typed_words = typed.trim().split(' ').count();

    candidates
        .iter()
        .filter(|item| strip_ansi(item).starts_with(typed))
        .map(|item| {
            let parts: Vec<&str> = item.trim().split(' ').collect();
            if parts.len() > 1 {
                parts.get(typed_words..).unwrap_or_default().join(" ")
            } else {
                item.clone()
            }
        })
        .collect()
}

/// Finds the command the context starts with, returning it and the split point.
///
/// A name or alias must be followed by a space to count; the longest wins.
/// Without one, the catch-all takes the whole context.
fn match_context(
    registry: &Registry,
    names: &[String],
    context: &str,
) -> Option<(Arc<Command>, String, String)> {
    let trimmed = context.trim_start();
    let leading = &context[..context.len() - trimmed.len()];

    let found = names
        .iter()
        .filter(|name| !name.trim().is_empty())
        .filter(|name| {
            trimmed.starts_with(name.as_str()) && trimmed[name.len()..].starts_with(' ')
        })
        .max_by_key(|name| name.len());

    if let Some(name) = found {
        if let Some(command) = registry.find(name.trim()) {
            let matched = format!("{leading}{name}");
            return Some((command, matched, trimmed[name.len()..].to_string()));
        }
    }

    let catch_all = registry.catch_all_command()?;
    Some((catch_all, leading.to_string(), trimmed.to_string()))
}

/// Splits the remaining context into the final word and the words before it,
/// noting an option word right before the final one.
fn split_final_word(parts: &mut InputParts, rest: &str) {
    let mut words: Vec<&str> = rest.split(' ').collect();
    let last = words.pop().unwrap_or_default();

    let before_last = words.last().map(|w| strip_ansi(w).trim().to_string());
    if let Some(word) = before_last.filter(|w| w.starts_with('-')) {
        parts.option = Some(word);
    }

    if !words.is_empty() {
        parts.prefix.push_str(&words.join(" "));
        parts.prefix.push(' ');
    }
    parts.context = last.to_string();
}

/// Reads the candidates for the current word of a matched command.
async fn candidate_data(command: &Command, parts: &InputParts) -> Vec<String> {
    let word = parts.context.as_str();

    if word.trim().starts_with('-') && !command.allow_unknown_options {
        return command
            .options
            .iter()
            .filter_map(|o| o.long.clone().or_else(|| o.short.clone()))
            .collect();
    }

    if let Some(option) = &parts.option {
        if let Some(spec) = command.find_option(option) {
            return match &spec.completion {
                Some(source) => source.resolve(word).await,
                None => Vec::new(),
            };
        }
    }

    match &command.completion {
        Some(source) => source.resolve(word).await,
        None => Vec::new(),
    }
}

/// Computes the completion for `line` with the cursor at byte offset `cursor`.
pub async fn complete(registry: &Registry, line: &str, cursor: usize) -> CompletionResult {
    let mut parts = InputParts::parse(line, cursor);
    let names = registry.names_and_aliases();

    let finish = |parts: &InputParts, reduction: Reduction| match reduction {
        Reduction::Single(context) => CompletionResult {
            freeze: context.ends_with('/'),
            suggestion: Suggestion::Line(parts.assemble(&context)),
        },
        Reduction::Many(items) => CompletionResult {
            suggestion: Suggestion::List(items),
            freeze: false,
        },
    };

    if let Some(reduction) = reduce_context(&parts.context, &names, true) {
        debug!(context = %parts.context, "Completing command name");
        return finish(&parts, reduction);
    }

    let Some((command, matched, rest)) = match_context(registry, &names, &parts.context) else {
        return CompletionResult {
            suggestion: Suggestion::List(filter_candidates(&parts.context, &names)),
            freeze: false,
        };
    };

    debug!(command = %command.name, rest = %rest, "Completing command arguments");
    parts.prefix.push_str(&matched);
    split_final_word(&mut parts, &rest);

    let data = candidate_data(&command, &parts).await;
    match reduce_context(&parts.context, &data, false) {
        Some(reduction) => finish(&parts, reduction),
        None => CompletionResult {
            suggestion: Suggestion::List(filter_candidates(&parts.context, &data)),
            freeze: false,
        },
    }
}
