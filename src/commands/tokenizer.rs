//! Tokenizer for command lines.
//!
//! Provides:
//! - Quote-aware splitting of a line into pipeline stages
//! - Word tokenization with atomic quoted spans (double, single and back quotes)
//! - Normalization of `key=value` pairs into single quoted tokens

/// Quote characters that protect pipes and whitespace.
const QUOTE_CHARS: [char; 3] = ['"', '\'', '`'];

/// A token parsed from an argument string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// A bare word (may be a flag, a number or plain text).
    Word(String),
    /// The contents of a quoted span, quotes stripped. Always literal text.
    Quoted(String),
}

impl Token {
    /// Returns the token text regardless of how it was written.
    pub fn as_str(&self) -> &str {
        match self {
            Token::Word(s) | Token::Quoted(s) => s,
        }
    }

    /// Returns true if this token was quoted in the input.
    pub fn is_quoted(&self) -> bool {
        matches!(self, Token::Quoted(_))
    }
}

/// Splits a raw line into pipeline stages.
///
/// The line is split on `|` first, then pieces ending inside an open quote
/// are glued back together with the pipe they lost. Each stage is trimmed.
/// A blank line yields no stages.
pub fn split_pipeline(line: &str) -> Vec<String> {
    let line = line.trim();
    if line.is_empty() {
        return Vec::new();
    }

    let pieces: Vec<&str> = line.split('|').collect();
    let mut stages = Vec::new();
    let mut open = [false; QUOTE_CHARS.len()];
    let mut current = String::new();

    for (idx, piece) in pieces.iter().enumerate() {
        current.push_str(piece);

        for c in piece.chars() {
            if let Some(q) = QUOTE_CHARS.iter().position(|&quote| quote == c) {
                open[q] = !open[q];
            }
        }

        let in_quote = open.iter().any(|&o| o);
        if !in_quote || idx == pieces.len() - 1 {
            stages.push(current.trim().to_string());
            current.clear();
        } else {
            current.push('|');
        }
    }

    stages
}

/// Tokenizes an argument string into words.
///
/// Handles:
/// - Whitespace-separated bare words: `foo bar` → `Word(foo)`, `Word(bar)`
/// - Double quotes: `"hello world"` → `Quoted(hello world)`
/// - Single quotes: `'hello world'` → `Quoted(hello world)`
/// - Back quotes: `` `hello world` `` → `Quoted(hello world)`
///
/// A bare word ends at whitespace or a double quote. An unterminated double
/// quote is dropped; unterminated single or back quotes stay part of the word.
pub fn tokenize(input: &str) -> Vec<Token> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut pos = 0;

    while pos < chars.len() {
        let c = chars[pos];

        if c.is_whitespace() {
            pos += 1;
            continue;
        }

        if QUOTE_CHARS.contains(&c) {
            if let Some(end) = find_closing(&chars, pos + 1, c) {
                tokens.push(Token::Quoted(chars[pos + 1..end].iter().collect()));
                pos = end + 1;
                continue;
            }
            if c == '"' {
                pos += 1;
                continue;
            }
        }

        let start = pos;
        while pos < chars.len() && !chars[pos].is_whitespace() && chars[pos] != '"' {
            pos += 1;
        }
        tokens.push(Token::Word(chars[start..pos].iter().collect()));
    }

    tokens
}

/// Finds the index of the closing `quote` at or after `from`.
fn find_closing(chars: &[char], from: usize, quote: char) -> Option<usize> {
    chars[from..]
        .iter()
        .position(|&c| c == quote)
        .map(|offset| from + offset)
}

/// Rewrites `key=value` pairs as a single quoted token `"key='value'"`.
///
/// The value may be bare (`host=localhost`) or quoted (`name="John Doe"`),
/// and the whole pair may itself be wrapped in quotes (`"host=localhost"`).
/// Pairs must start a token; flags such as `--port=80` are left alone.
pub fn normalize_key_values(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len());
    let mut pos = 0;

    while pos < chars.len() {
        let at_token_start = pos == 0 || chars[pos - 1].is_whitespace();
        if at_token_start && !chars[pos].is_whitespace() {
            if let Some((key, value, end)) = read_key_value(&chars, pos) {
                out.push_str(&format!("\"{key}='{value}'\""));
                pos = end;
                continue;
            }
        }
        out.push(chars[pos]);
        pos += 1;
    }

    out
}

/// Reads a `key=value` pair starting at `start`, returning the key, the
/// unquoted value and the index just past the pair.
fn read_key_value(chars: &[char], start: usize) -> Option<(String, String, usize)> {
    let mut pos = start;

    let outer = match chars[pos] {
        q @ ('"' | '\'') => {
            pos += 1;
            Some(q)
        }
        _ => None,
    };

    let key_start = pos;
    while pos < chars.len() && (chars[pos].is_alphanumeric() || chars[pos] == '_') {
        pos += 1;
    }
    if pos == key_start || pos >= chars.len() || chars[pos] != '=' {
        return None;
    }
    let key: String = chars[key_start..pos].iter().collect();
    pos += 1;

    let value = match chars.get(pos) {
        Some(&q @ ('"' | '\'')) => {
            let end = find_closing(chars, pos + 1, q)?;
            let value: String = chars[pos + 1..end].iter().collect();
            pos = end + 1;
            value
        }
        Some(c) if !c.is_whitespace() => {
            let value_start = pos;
            while pos < chars.len() && !chars[pos].is_whitespace() {
                pos += 1;
            }
            let mut value: String = chars[value_start..pos].iter().collect();
            if let Some(q) = outer {
                if value.ends_with(q) {
                    value.pop();
                    // The closing outer quote is consumed below.
                    pos -= 1;
                }
            }
            value
        }
        _ => return None,
    };

    if let Some(q) = outer {
        if chars.get(pos) != Some(&q) {
            return None;
        }
        pos += 1;
    }

    Some((key, value, pos))
}
