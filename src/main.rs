//! Shellac demo shell.

mod cli;

use std::sync::Arc;
use std::time::Duration;

use cli::Cli;
use serde_json::json;
use shellac::commands::help::command_list;
use shellac::commands::Registry;
use shellac::completion::CompletionSource;
use shellac::config::Config;
use shellac::error::Result;
use shellac::logging::{self, LogTarget};
use shellac::persistence;
use shellac::session::{Action, Session, StdoutOutput};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let cli = Cli::parse_args();
    let target = if cli.log_stderr {
        LogTarget::Stderr
    } else {
        LogTarget::default_file()
    };
    if let Err(e) = logging::init(target) {
        eprintln!("Warning: {e}. Logging to stderr instead.");
        let _ = logging::init(LogTarget::Stderr);
    }

    if let Err(e) = run(cli).await {
        error!("{}: {}", e.category(), e);
        eprintln!("{}: {}", e.category(), e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config_path();
    info!("Loading config from: {}", config_path.display());
    let mut config = Config::load_from_file(&config_path)?;
    cli.apply(&mut config);

    let mut builder = Session::builder().output(Arc::new(StdoutOutput));
    if config.history.id.is_some() {
        builder = builder.store(persistence::open_store(&config.history).await?);
    }
    let session = builder.config(config).build();
    session.with_registry(register_demo_commands)?;
    session.load_history().await?;

    if cli.is_batch() {
        for line in &cli.exec {
            // Failures are already written to the output.
            let _ = session.exec(line).await;
        }
        return Ok(());
    }

    spawn_interrupt_handler(session.clone());
    repl(&session).await
}

/// Reads lines from stdin until EOF or `quit`.
async fn repl(session: &Session) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        let prompt = format!("{} ", session.delimiter());
        // Prompt write failures are not fatal.
        let _ = stdout.write_all(prompt.as_bytes()).await;
        let _ = stdout.flush().await;

        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => {
                error!("Failed to read input: {e}");
                break;
            }
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "quit" && session.mode().is_none() {
            break;
        }

        let _ = session.submit(line).await;
    }

    Ok(())
}

/// Ctrl-C cancels the running command instead of killing the shell.
fn spawn_interrupt_handler(session: Session) {
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if !session.cancel() {
                session.write("(type quit or press Ctrl-D to leave)");
            }
        }
    });
}

fn register_demo_commands(registry: &mut Registry) -> Result<()> {
    registry
        .command("say <words...>")
        .description("Prints its arguments")
        .alias("echo")
        .action(Action::future(|cmd| {
            Box::pin(async move {
                let text = cmd.args.list("words").join(" ");
                cmd.log(&text).await;
                Ok(Some(json!(text)))
            })
        }))
        .register()?;

    registry
        .command("upper [text...]")
        .description("Uppercases its input")
        .action(Action::future(|cmd| {
            Box::pin(async move {
                let text = piped_or_args(cmd, "text").to_uppercase();
                cmd.log(&text).await;
                Ok(None)
            })
        }))
        .register()?;

    registry
        .command("reverse [text...]")
        .description("Reverses its input")
        .action(Action::future(|cmd| {
            Box::pin(async move {
                let text: String = piped_or_args(cmd, "text").chars().rev().collect();
                cmd.log(&text).await;
                Ok(None)
            })
        }))
        .register()?;

    registry
        .command("count <n>")
        .description("Counts to n, one number per tick. Ctrl-C stops it")
        .option("-d, --delay <ms>", "Milliseconds between numbers")
        .validate(|args| {
            match args.get("n").and_then(|v| v.as_u64()) {
                Some(_) => Ok(()),
                None => anyhow::bail!("n must be a positive number"),
            }
        })
        .cancel(|| info!("count interrupted"))
        .action(Action::future(|cmd| {
            Box::pin(async move {
                let n = cmd.args.get("n").and_then(|v| v.as_u64()).unwrap_or_default();
                let delay = cmd
                    .args
                    .option("delay")
                    .and_then(|v| v.as_u64())
                    .unwrap_or(250);

                for i in 1..=n {
                    cmd.log(i).await;
                    tokio::select! {
                        _ = cmd.cancelled() => return Ok(Some(json!(i))),
                        _ = tokio::time::sleep(Duration::from_millis(delay)) => {}
                    }
                }
                Ok(Some(json!(n)))
            })
        }))
        .register()?;

    registry
        .mode("calc")
        .description("Enters a mode that adds up numbers")
        .delimiter("calc>")
        .init(Action::sync(|cmd| {
            cmd.session().write("Type numbers separated by spaces. exit leaves.");
            Ok(None)
        }))
        .action(Action::future(|cmd| {
            Box::pin(async move {
                let line = cmd.args.string("command").unwrap_or_default();
                let sum: f64 = line
                    .split_whitespace()
                    .map(|w| w.parse::<f64>())
                    .collect::<std::result::Result<Vec<_>, _>>()?
                    .iter()
                    .sum();
                cmd.log(sum).await;
                Ok(Some(json!(sum)))
            })
        }))
        .register()?;

    registry
        .command("help [command...]")
        .description("Lists commands, or shows help for one")
        .autocomplete(CompletionSource::list([
            "say", "upper", "reverse", "count", "calc", "history",
        ]))
        .action(Action::future(|cmd| {
            Box::pin(async move {
                let session = cmd.session().clone();
                let target = cmd.args.list("command").join(" ");
                let text = if target.is_empty() {
                    command_list(&session.registry())
                } else {
                    session
                        .help_text(&target)
                        .unwrap_or_else(|| format!("No such command: {target}"))
                };
                cmd.log(text).await;
                Ok(None)
            })
        }))
        .register()?;

    registry
        .command("history")
        .description("Shows entered lines")
        .action(Action::future(|cmd| {
            Box::pin(async move {
                let entries = cmd.session().history_entries();
                for (i, entry) in entries.iter().enumerate() {
                    cmd.log(format!("{:>4}  {entry}", i + 1)).await;
                }
                Ok(None)
            })
        }))
        .register()?;

    Ok(())
}

/// Piped text when there is some, else the joined positional argument.
fn piped_or_args(cmd: &shellac::session::CommandInstance, name: &str) -> String {
    match &cmd.args.stdin {
        Some(lines) => lines.join("\n"),
        None => cmd.args.list(name).join(" "),
    }
}
