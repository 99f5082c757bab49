//! Generated help text for commands.

use super::definitions::Command;
use super::registry::Registry;

/// Renders the usage line: a custom usage, or `[options]` plus argument names.
pub fn usage(command: &Command) -> String {
    if let Some(usage) = &command.usage {
        return usage.clone();
    }

    let mut usage = String::from("[options]");
    for arg in &command.args {
        usage.push(' ');
        usage.push_str(&arg.display_name());
    }
    usage
}

/// Renders one line per option, `--help` first, with flags padded to a column.
pub fn option_help(command: &Command) -> String {
    let width = command
        .options
        .iter()
        .map(|o| o.flags.chars().count())
        .chain(std::iter::once("--help".len()))
        .max()
        .unwrap_or_default();

    std::iter::once(format!("{:width$}  output usage information", "--help"))
        .chain(
            command
                .options
                .iter()
                .map(|o| format!("{:width$}  {}", o.flags, o.description)),
        )
        .collect::<Vec<_>>()
        .join("\n")
}

/// Renders the full help for a command.
pub fn help_information(command: &Command) -> String {
    let mut lines = vec![
        String::new(),
        format!("  Usage:  {} {}", command.name, usage(command)),
        String::new(),
    ];

    if !command.aliases.is_empty() {
        lines.push(format!("  Alias: {}", command.aliases.join(" | ")));
        lines.push(String::new());
    }

    if let Some(description) = &command.description {
        lines.push(format!("  {description}"));
        lines.push(String::new());
    }

    lines.push("  Options:".to_string());
    lines.push(String::new());
    lines.extend(option_help(command).lines().map(|l| format!("    {l}")));
    lines.push(String::new());

    lines.join("\n")
}

/// Returns the custom help if the command has one, else the generated help.
pub fn render_help(command: &Command) -> String {
    match &command.help {
        Some(help) => help(command),
        None => help_information(command),
    }
}

/// Lists visible commands with their arguments and descriptions.
pub fn command_list(registry: &Registry) -> String {
    let rows: Vec<(String, String)> = registry
        .commands()
        .iter()
        .filter(|c| !c.hidden && !c.catch_all)
        .map(|c| {
            let mut signature = c.name.clone();
            for arg in &c.args {
                signature.push(' ');
                signature.push_str(&arg.display_name());
            }
            (signature, c.description.clone().unwrap_or_default())
        })
        .collect();

    let width = rows
        .iter()
        .map(|(sig, _)| sig.chars().count())
        .max()
        .unwrap_or_default();

    let mut out = String::from("\n  Commands:\n\n");
    for (signature, description) in rows {
        out.push_str(format!("    {signature:width$}  {description}").trim_end());
        out.push('\n');
    }
    out
}
