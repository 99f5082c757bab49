//! Argument and option binding.
//!
//! Turns the remainder of a matched stage into [`Args`] using the command's
//! schema. Flag parsing follows the usual `minimist` conventions:
//! `--key=value`, `--no-key`, `--key value`, `-abc` groups and `--`.

use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;
use serde_json::{Map, Number, Value};

use super::definitions::Command;
use super::tokenizer::{normalize_key_values, tokenize, Token};
use crate::error::BindError;

/// Positional word that requests help, as an alternative to `--help`.
pub const HELP_WORD: &str = "/?";

/// Arguments bound for one command instance.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Args {
    /// Named positional values plus any extra keys merged in by the caller.
    pub values: Map<String, Value>,
    /// Option values keyed by option name.
    pub options: Map<String, Value>,
    /// Lines piped in from the upstream command.
    pub stdin: Option<Vec<String>>,
    /// Set by `--help` or `/?`.
    pub help: bool,
}

impl Args {
    /// Returns a named value.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Returns a named value as text. Numbers and booleans are rendered.
    pub fn string(&self, name: &str) -> Option<String> {
        self.get(name).map(value_to_string)
    }

    /// Returns a named value as a list of strings.
    ///
    /// Variadic arguments are arrays; a scalar becomes a one-item list.
    pub fn list(&self, name: &str) -> Vec<String> {
        match self.get(name) {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) => items.iter().map(value_to_string).collect(),
            Some(other) => vec![value_to_string(other)],
        }
    }

    /// Returns an option value.
    pub fn option(&self, name: &str) -> Option<&Value> {
        self.options.get(name)
    }

    /// Returns true if an option is present and not `false`.
    pub fn flag(&self, name: &str) -> bool {
        !matches!(
            self.options.get(name),
            None | Some(Value::Null) | Some(Value::Bool(false))
        )
    }

    /// Returns true if help was requested.
    pub fn help_requested(&self) -> bool {
        self.help
    }

    /// Shallow-merges caller-supplied values over the bound ones.
    ///
    /// `options` replaces the option map wholesale, `stdin` replaces piped
    /// input and `help` sets the help flag; every other key is a value.
    pub fn merge(&mut self, overrides: Map<String, Value>) {
        for (key, value) in overrides {
            match (key.as_str(), value) {
                ("options", Value::Object(options)) => self.options = options,
                ("stdin", Value::Array(lines)) => {
                    self.stdin = Some(lines.iter().map(value_to_string).collect());
                }
                ("stdin", Value::String(line)) => self.stdin = Some(vec![line]),
                ("help", Value::Bool(help)) => self.help = help,
                (_, value) => {
                    self.values.insert(key, value);
                }
            }
        }
    }
}

/// Renders a JSON value the way a user typed it.
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Binds a stage remainder against a command's schema.
///
/// When `normalize` is set, `key=value` tokens are first collapsed into a
/// single literal token.
pub fn bind(command: &Command, remainder: &str, normalize: bool) -> Result<Args, BindError> {
    let input = if normalize {
        normalize_key_values(remainder)
    } else {
        remainder.to_string()
    };

    let tokens = tokenize(&input);
    let hints = FlagHints::for_command(command, &tokens);
    let parsed = parse_flags(&tokens, &hints);

    let mut args = Args {
        help: parsed.flags.get("help").is_some_and(is_truthy)
            || parsed
                .positional
                .iter()
                .any(|v| v.as_str() == Some(HELP_WORD)),
        ..Args::default()
    };

    bind_positionals(command, &parsed.positional, &mut args)?;
    bind_options(command, &parsed.flags, &mut args)?;

    Ok(args)
}

fn bind_positionals(command: &Command, positional: &[Value], args: &mut Args) -> Result<(), BindError> {
    let mut remaining = positional.iter();

    for spec in &command.args {
        if spec.variadic {
            let rest: Vec<Value> = remaining.by_ref().cloned().collect();
            if rest.is_empty() {
                if spec.required && !args.help {
                    return Err(BindError::MissingArgument(spec.name.clone()));
                }
                continue;
            }
            args.values.insert(spec.name.clone(), Value::Array(rest));
            continue;
        }

        match remaining.next() {
            Some(value) => {
                args.values.insert(spec.name.clone(), value.clone());
            }
            None if spec.required && !args.help => {
                return Err(BindError::MissingArgument(spec.name.clone()));
            }
            None => {}
        }
    }

    Ok(())
}

fn bind_options(
    command: &Command,
    flags: &Map<String, Value>,
    args: &mut Args,
) -> Result<(), BindError> {
    for option in &command.options {
        let short = option.short_key();
        let long = option.long_key();

        let value = short
            .as_ref()
            .and_then(|k| flags.get(k))
            .or_else(|| long.as_ref().and_then(|k| flags.get(k)));

        let Some(value) = value else { continue };

        if option.required && value.is_boolean() {
            let flag = option.long.as_ref().or(option.short.as_ref());
            return Err(BindError::MissingOptionValue(
                flag.cloned().unwrap_or_default(),
            ));
        }

        if let Some(key) = long.or(short) {
            args.options.insert(key, value.clone());
        }
    }

    for (key, value) in flags {
        if key == "help" {
            continue;
        }
        let declared = command.options.iter().any(|o| {
            o.long.as_deref() == Some(&format!("--{key}"))
                || o.long.as_deref() == Some(&format!("--no-{key}"))
                || o.short.as_deref() == Some(&format!("-{key}"))
        });
        if declared {
            continue;
        }
        if !command.allow_unknown_options {
            return Err(BindError::InvalidOption(key.clone()));
        }
        args.options.insert(key.clone(), value.clone());
    }

    Ok(())
}

/// Which keys never take a value and which are never coerced to numbers.
#[derive(Debug, Default)]
struct FlagHints {
    booleans: HashSet<String>,
    strings: HashSet<String>,
}

impl FlagHints {
    /// Value-less options are treated as boolean only when they appear in the input.
    fn for_command(command: &Command, tokens: &[Token]) -> Self {
        let words: HashSet<&str> = tokens
            .iter()
            .filter(|t| !t.is_quoted())
            .map(Token::as_str)
            .collect();

        let mut booleans: HashSet<String> = command.types.boolean.iter().cloned().collect();
        for option in command.options.iter().filter(|o| o.is_boolean()) {
            for key in [option.short_key(), option.long_key()].into_iter().flatten() {
                let spellings = [format!("-{key}"), format!("--{key}"), format!("--no-{key}")];
                if spellings.iter().any(|s| words.contains(s.as_str())) {
                    booleans.insert(key);
                }
            }
        }

        Self {
            booleans,
            strings: command.types.string.iter().cloned().collect(),
        }
    }

    fn is_boolean(&self, key: &str) -> bool {
        self.booleans.contains(key)
    }

    fn coerce(&self, key: &str, raw: &str) -> Value {
        if self.strings.contains(key) {
            Value::String(raw.to_string())
        } else {
            coerce_number(raw)
        }
    }
}

#[derive(Debug, Default)]
struct ParsedFlags {
    positional: Vec<Value>,
    flags: Map<String, Value>,
}

impl ParsedFlags {
    /// Sets a flag; repeated keys collect into a list.
    fn set(&mut self, key: &str, value: Value) {
        match self.flags.get_mut(key) {
            Some(Value::Array(items)) => items.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None => {
                self.flags.insert(key.to_string(), value);
            }
        }
    }
}

fn parse_flags(tokens: &[Token], hints: &FlagHints) -> ParsedFlags {
    let mut parsed = ParsedFlags::default();
    let mut idx = 0;

    while idx < tokens.len() {
        let token = &tokens[idx];
        idx += 1;

        let text = match token {
            Token::Quoted(text) => {
                parsed.positional.push(Value::String(text.clone()));
                continue;
            }
            Token::Word(text) => text.as_str(),
        };

        if text == "--" {
            parsed.positional.extend(
                tokens[idx..]
                    .iter()
                    .map(|t| Value::String(t.as_str().to_string())),
            );
            break;
        }

        if let Some(body) = text.strip_prefix("--") {
            if let Some((key, raw)) = body.split_once('=') {
                let value = if hints.is_boolean(key) {
                    Value::Bool(raw != "false")
                } else {
                    hints.coerce(key, raw)
                };
                parsed.set(key, value);
            } else if let Some(key) = body.strip_prefix("no-") {
                parsed.set(key, Value::Bool(false));
            } else {
                let value = take_value(body, tokens, &mut idx, hints);
                parsed.set(body, value);
            }
            continue;
        }

        if looks_like_flag(text) {
            parse_short_group(&text[1..], tokens, &mut idx, hints, &mut parsed);
            continue;
        }

        let value = if hints.strings.contains("_") {
            Value::String(text.to_string())
        } else {
            coerce_number(text)
        };
        parsed.positional.push(value);
    }

    parsed
}

fn parse_short_group(
    letters: &str,
    tokens: &[Token],
    idx: &mut usize,
    hints: &FlagHints,
    parsed: &mut ParsedFlags,
) {
    let chars: Vec<(usize, char)> = letters.char_indices().collect();

    for (pos, &(offset, letter)) in chars.iter().enumerate().take(chars.len() - 1) {
        let key = letter.to_string();
        let rest = &letters[offset + letter.len_utf8()..];

        if letter.is_ascii_alphabetic() {
            if let Some(raw) = rest.strip_prefix('=') {
                parsed.set(&key, hints.coerce(&key, raw));
                return;
            }
            if is_number(rest) {
                parsed.set(&key, hints.coerce(&key, rest));
                return;
            }
        }
        let next = chars[pos + 1].1;
        if !(next.is_alphanumeric() || next == '_') {
            parsed.set(&key, Value::String(rest.to_string()));
            return;
        }
        parsed.set(&key, default_flag_value(&key, hints));
    }

    if let Some(&(_, last)) = chars.last() {
        let key = last.to_string();
        let value = take_value(&key, tokens, idx, hints);
        parsed.set(&key, value);
    }
}

/// Reads the value for `key` from the next token when it can take one.
fn take_value(key: &str, tokens: &[Token], idx: &mut usize, hints: &FlagHints) -> Value {
    let Some(next) = tokens.get(*idx) else {
        return default_flag_value(key, hints);
    };

    match next {
        Token::Quoted(text) if !hints.is_boolean(key) => {
            *idx += 1;
            Value::String(text.clone())
        }
        Token::Word(text) if !hints.is_boolean(key) && !looks_like_flag(text) && text != "--" => {
            *idx += 1;
            hints.coerce(key, text)
        }
        Token::Word(text) if text == "true" || text == "false" => {
            *idx += 1;
            Value::Bool(text == "true")
        }
        _ => default_flag_value(key, hints),
    }
}

fn default_flag_value(key: &str, hints: &FlagHints) -> Value {
    if hints.strings.contains(key) {
        Value::String(String::new())
    } else {
        Value::Bool(true)
    }
}

/// A dash followed by something other than a dash, unless it is a negative number.
fn looks_like_flag(text: &str) -> bool {
    text.len() > 1 && text.starts_with('-') && !text.starts_with("--") && !is_number(text)
        || text.starts_with("--") && text.len() > 2
}

fn is_number(text: &str) -> bool {
    static NUMBER: OnceLock<Regex> = OnceLock::new();
    let number = NUMBER.get_or_init(|| {
        Regex::new(r"^(?:0[xX][0-9a-fA-F]+|[-+]?(?:\d+(?:\.\d*)?|\.\d+)(?:[eE][-+]?\d+)?)$")
            .expect("number pattern is valid")
    });
    number.is_match(text)
}

/// Converts numeric-looking text to a JSON number; anything else stays text.
fn coerce_number(text: &str) -> Value {
    if !is_number(text) {
        return Value::String(text.to_string());
    }

    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        if let Ok(n) = i64::from_str_radix(hex, 16) {
            return Value::Number(n.into());
        }
    }
    if let Ok(n) = text.parse::<i64>() {
        return Value::Number(n.into());
    }
    text.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .unwrap_or_else(|| Value::String(text.to_string()))
}

fn is_truthy(value: &Value) -> bool {
    !matches!(value, Value::Null | Value::Bool(false))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::definitions::{OptionSpec, TypeHints};
    use serde_json::json;

    fn command(spec: &str, options: &[&str]) -> Command {
        let mut cmd = Command::from_spec(spec);
        cmd.options = options.iter().map(|f| OptionSpec::parse(f, "")).collect();
        cmd
    }

    #[test]
    fn test_bind_required_and_optional() {
        let cmd = command("greet <name> [greeting]", &[]);
        let args = bind(&cmd, "bob hi", true).unwrap();
        assert_eq!(args.string("name").as_deref(), Some("bob"));
        assert_eq!(args.string("greeting").as_deref(), Some("hi"));

        let args = bind(&cmd, "bob", true).unwrap();
        assert!(args.get("greeting").is_none());
    }

    #[test]
    fn test_missing_required_argument() {
        let cmd = command("greet <name>", &[]);
        let err = bind(&cmd, "", true).unwrap_err();
        assert_eq!(err, BindError::MissingArgument("name".to_string()));
    }

    #[test]
    fn test_variadic_collects_rest() {
        let cmd = command("order <type> [toppings...]", &[]);
        let args = bind(&cmd, "pizza cheese olives", true).unwrap();
        assert_eq!(args.string("type").as_deref(), Some("pizza"));
        assert_eq!(args.list("toppings"), vec!["cheese", "olives"]);
    }

    #[test]
    fn test_variadic_with_quoted_words() {
        let cmd = command("say <words...>", &[]);
        let args = bind(&cmd, "\"hello there\" 'general kenobi'", true).unwrap();
        assert_eq!(args.list("words"), vec!["hello there", "general kenobi"]);
    }

    #[test]
    fn test_numbers_are_coerced() {
        let cmd = command("add <a> <b>", &[]);
        let args = bind(&cmd, "1 2.5", true).unwrap();
        assert_eq!(args.get("a"), Some(&json!(1)));
        assert_eq!(args.get("b"), Some(&json!(2.5)));
    }

    #[test]
    fn test_quoted_numbers_stay_text() {
        let cmd = command("add <a>", &[]);
        let args = bind(&cmd, "\"1\"", true).unwrap();
        assert_eq!(args.get("a"), Some(&json!("1")));
    }

    #[test]
    fn test_negative_number_is_positional() {
        let cmd = command("add <a> <b>", &[]);
        let args = bind(&cmd, "-5 3", true).unwrap();
        assert_eq!(args.get("a"), Some(&json!(-5)));
        assert_eq!(args.get("b"), Some(&json!(3)));
    }

    #[test]
    fn test_boolean_option() {
        let cmd = command("build", &["-d, --dry-run"]);
        let args = bind(&cmd, "--dry-run", true).unwrap();
        assert_eq!(args.option("dry-run"), Some(&json!(true)));

        let args = bind(&cmd, "-d", true).unwrap();
        assert_eq!(args.option("dry-run"), Some(&json!(true)));
    }

    #[test]
    fn test_boolean_option_does_not_consume_positional() {
        let cmd = command("build [target]", &["-d, --dry-run"]);
        let args = bind(&cmd, "--dry-run release", true).unwrap();
        assert!(args.flag("dry-run"));
        assert_eq!(args.string("target").as_deref(), Some("release"));
    }

    #[test]
    fn test_negated_option() {
        let cmd = command("eat", &["--no-cheese"]);
        let args = bind(&cmd, "--no-cheese", true).unwrap();
        assert_eq!(args.option("cheese"), Some(&json!(false)));
        assert!(!args.flag("cheese"));
    }

    #[test]
    fn test_valued_option_forms() {
        let cmd = command("serve", &["-p, --port <port>"]);
        for input in ["--port 80", "--port=80", "-p 80", "-p80"] {
            let args = bind(&cmd, input, true).unwrap();
            assert_eq!(args.option("port"), Some(&json!(80)), "input: {input}");
        }
    }

    #[test]
    fn test_valued_option_missing_value() {
        let cmd = command("serve", &["-p, --port <port>"]);
        let err = bind(&cmd, "--port", true).unwrap_err();
        assert_eq!(err, BindError::MissingOptionValue("--port".to_string()));
    }

    #[test]
    fn test_optional_value_option_without_value() {
        let cmd = command("log", &["--level [level]"]);
        let args = bind(&cmd, "--level", true).unwrap();
        assert_eq!(args.option("level"), Some(&json!(true)));
    }

    #[test]
    fn test_unknown_option_rejected() {
        let cmd = command("serve", &[]);
        let err = bind(&cmd, "--bogus", true).unwrap_err();
        assert_eq!(err, BindError::InvalidOption("bogus".to_string()));
    }

    #[test]
    fn test_unknown_option_allowed() {
        let mut cmd = command("serve", &[]);
        cmd.allow_unknown_options = true;
        let args = bind(&cmd, "--bogus yes -x", true).unwrap();
        assert_eq!(args.option("bogus"), Some(&json!("yes")));
        assert_eq!(args.option("x"), Some(&json!(true)));
    }

    #[test]
    fn test_short_group() {
        let mut cmd = command("ls", &[]);
        cmd.allow_unknown_options = true;
        let args = bind(&cmd, "-la", true).unwrap();
        assert!(args.flag("l"));
        assert!(args.flag("a"));
    }

    #[test]
    fn test_repeated_flags_collect() {
        let mut cmd = command("tag", &[]);
        cmd.allow_unknown_options = true;
        let args = bind(&cmd, "--t a --t b --t c", true).unwrap();
        assert_eq!(args.option("t"), Some(&json!(["a", "b", "c"])));
    }

    #[test]
    fn test_double_dash_ends_options() {
        let cmd = command("run [rest...]", &[]);
        let args = bind(&cmd, "-- --not-a-flag 5", true).unwrap();
        assert_eq!(args.list("rest"), vec!["--not-a-flag", "5"]);
    }

    #[test]
    fn test_string_type_hint() {
        let mut cmd = command("zip", &["--code <code>"]);
        cmd.types = TypeHints {
            string: vec!["code".to_string()],
            boolean: Vec::new(),
        };
        let args = bind(&cmd, "--code 01234", true).unwrap();
        assert_eq!(args.option("code"), Some(&json!("01234")));
    }

    #[test]
    fn test_boolean_type_hint() {
        let mut cmd = command("run [target]", &[]);
        cmd.allow_unknown_options = true;
        cmd.types = TypeHints {
            string: Vec::new(),
            boolean: vec!["fast".to_string()],
        };
        let args = bind(&cmd, "--fast home", true).unwrap();
        assert!(args.flag("fast"));
        assert_eq!(args.string("target").as_deref(), Some("home"));
    }

    #[test]
    fn test_key_value_normalization() {
        let cmd = command("set [pairs...]", &[]);
        let args = bind(&cmd, "name=\"John Doe\" age=5", true).unwrap();
        assert_eq!(args.list("pairs"), vec!["name='John Doe'", "age='5'"]);

        let args = bind(&cmd, "age=5", false).unwrap();
        assert_eq!(args.list("pairs"), vec!["age=5"]);
    }

    #[test]
    fn test_help_flag() {
        let cmd = command("greet <name>", &[]);
        assert!(bind(&cmd, "--help", true).unwrap().help_requested());
        assert!(bind(&cmd, "/?", true).unwrap().help_requested());
        assert!(!bind(&cmd, "bob", true).unwrap().help_requested());
    }

    #[test]
    fn test_merge_overrides() {
        let cmd = command("greet <name>", &["--loud"]);
        let mut args = bind(&cmd, "bob --loud", true).unwrap();
        let overrides = json!({
            "name": "alice",
            "options": { "quiet": true },
            "stdin": ["piped"],
        });
        args.merge(overrides.as_object().cloned().unwrap());

        assert_eq!(args.string("name").as_deref(), Some("alice"));
        assert!(args.flag("quiet"));
        assert!(!args.flag("loud"));
        assert_eq!(args.stdin, Some(vec!["piped".to_string()]));
    }

    #[test]
    fn test_binding_is_idempotent() {
        let cmd = command("serve <host> [rest...]", &["-p, --port <port>", "-v"]);
        let first = bind(&cmd, "localhost -v --port 8080 a b", true).unwrap();
        let second = bind(&cmd, "localhost -v --port 8080 a b", true).unwrap();
        assert_eq!(first, second);
    }
}
