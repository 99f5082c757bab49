//! Pipelines, handlers, validation and cancellation.

use super::buffered_session;
use pretty_assertions::assert_eq;
use serde_json::{json, Map};
use shellac::commands::Registry;
use shellac::session::{Action, SessionEvent, SessionState};
use shellac::ShellacError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn text_commands(registry: &mut Registry) -> shellac::Result<()> {
    registry
        .command("say <words...>")
        .action(Action::future(|cmd| {
            Box::pin(async move {
                let text = cmd.args.list("words").join(" ");
                cmd.log(&text).await;
                Ok(Some(json!(text)))
            })
        }))
        .register()?;

    registry
        .command("upper")
        .action(Action::future(|cmd| {
            Box::pin(async move {
                let text = cmd.args.stdin.clone().unwrap_or_default().join("\n");
                cmd.log(text.to_uppercase()).await;
                Ok(None)
            })
        }))
        .register()?;

    registry
        .command("wrap")
        .option("-w, --with <text>", "Wrapper")
        .action(Action::future(|cmd| {
            Box::pin(async move {
                let with = cmd.args.option("with").and_then(|v| v.as_str().map(str::to_string));
                let with = with.unwrap_or_else(|| "*".to_string());
                let text = cmd.args.stdin.clone().unwrap_or_default().join("\n");
                cmd.log(format!("{with}{text}{with}")).await;
                Ok(None)
            })
        }))
        .register()?;

    Ok(())
}

#[tokio::test]
async fn test_pipe_feeds_downstream_stdin() {
    let (session, output) = buffered_session();
    session.with_registry(text_commands).unwrap();

    let result = session.exec("say hello there | upper").await.unwrap();

    assert_eq!(result, Some(json!("hello there")));
    assert_eq!(output.chunks(), vec!["HELLO THERE"]);
}

#[tokio::test]
async fn test_three_stage_pipeline() {
    let (session, output) = buffered_session();
    session.with_registry(text_commands).unwrap();

    session.exec("say hi | upper | wrap -w _").await.unwrap();
    assert_eq!(output.chunks(), vec!["_HI_"]);
}

#[tokio::test]
async fn test_quoted_pipe_is_not_split() {
    let (session, output) = buffered_session();
    session.with_registry(text_commands).unwrap();

    session.exec("say \"a | b\"").await.unwrap();
    assert_eq!(output.chunks(), vec!["a | b"]);
}

#[tokio::test]
async fn test_unknown_stage_fails_whole_line() {
    let (session, output) = buffered_session();
    session.with_registry(text_commands).unwrap();

    let err = session.exec("say hi | nope").await.unwrap_err();
    assert!(matches!(err, ShellacError::UnknownCommand(ref s) if s == "nope"));
    assert_eq!(output.chunks(), vec!["Invalid command: nope"]);
}

#[tokio::test]
async fn test_downstream_failure_is_reported() {
    let (session, output) = buffered_session();
    session
        .with_registry(|r| {
            text_commands(r)?;
            r.command("fail")
                .action(Action::sync(|_| Err(anyhow::anyhow!("boom"))))
                .register()
                .map(|_| ())
        })
        .unwrap();
    let mut events = session.subscribe();

    let result = session.exec("say hi | fail").await;

    assert!(result.is_ok());
    assert!(output.contents().contains("boom"));
    let mut saw_failure = false;
    while let Ok(event) = events.try_recv() {
        if let SessionEvent::CommandFailed { command, .. } = event {
            assert_eq!(command, "fail");
            saw_failure = true;
        }
    }
    assert!(saw_failure);
}

#[tokio::test]
async fn test_validator_rejects_first_stage() {
    let (session, output) = buffered_session();
    let ran = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&ran);
    session
        .with_registry(move |r| {
            r.command("age <years>")
                .validate(|args| match args.get("years").and_then(|v| v.as_i64()) {
                    Some(n) if n >= 0 => Ok(()),
                    _ => anyhow::bail!("years must be positive"),
                })
                .action(Action::sync(move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(None)
                }))
                .register()
        })
        .unwrap();

    let err = session.exec("age -3").await.unwrap_err();
    assert!(matches!(err, ShellacError::Validation(_)));
    assert_eq!(output.chunks(), vec!["years must be positive"]);
    assert_eq!(ran.load(Ordering::SeqCst), 0);

    session.exec("age 30").await.unwrap();
    assert_eq!(ran.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_options_reach_handler() {
    let (session, _) = buffered_session();
    session
        .with_registry(|r| {
            r.command("serve [dir]")
                .option("-p, --port <port>", "Port")
                .option("-v, --verbose", "Chatty")
                .option("--no-cache", "Disable cache")
                .action(Action::sync(|cmd| {
                    Ok(Some(json!({
                        "dir": cmd.args.get("dir"),
                        "port": cmd.args.option("port"),
                        "verbose": cmd.args.flag("verbose"),
                        "cache": cmd.args.option("cache"),
                    })))
                }))
                .register()
        })
        .unwrap();

    let result = session
        .exec("serve public -p 8080 -v --no-cache")
        .await
        .unwrap();
    assert_eq!(
        result,
        Some(json!({
            "dir": "public",
            "port": 8080,
            "verbose": true,
            "cache": false,
        }))
    );
}

#[tokio::test]
async fn test_invalid_option_shows_help() {
    let (session, output) = buffered_session();
    session
        .with_registry(|r| r.command("strict").description("Strict one").register())
        .unwrap();

    let err = session.exec("strict --bogus").await.unwrap_err();
    assert!(matches!(err, ShellacError::Binding { .. }));
    let text = output.contents();
    assert!(text.contains("Invalid option: 'bogus'. Showing Help:"));
    assert!(text.contains("Strict one"));
}

#[tokio::test]
async fn test_catch_all_receives_unmatched_line() {
    let (session, _) = buffered_session();
    session
        .with_registry(|r| {
            r.catch_all("[words...]")
                .action(Action::sync(|cmd| Ok(Some(json!(cmd.args.list("words"))))))
                .register()
        })
        .unwrap();

    let result = session.exec("anything goes").await.unwrap();
    assert_eq!(result, Some(json!(["anything", "goes"])));
}

#[tokio::test]
async fn test_exec_with_args_replaces_options() {
    let (session, _) = buffered_session();
    session
        .with_registry(|r| {
            r.command("show")
                .option("-f, --format <fmt>", "Format")
                .action(Action::sync(|cmd| Ok(cmd.args.option("format").cloned())))
                .register()
        })
        .unwrap();

    let mut overrides = Map::new();
    overrides.insert("options".to_string(), json!({ "format": "json" }));
    let result = session
        .exec_with_args("show -f text", overrides)
        .await
        .unwrap();
    assert_eq!(result, Some(json!("json")));
}

#[tokio::test]
async fn test_lines_run_in_order() {
    let (session, output) = buffered_session();
    session
        .with_registry(|r| {
            r.command("slow <tag>")
                .action(Action::future(|cmd| {
                    Box::pin(async move {
                        tokio::time::sleep(Duration::from_millis(30)).await;
                        let tag = cmd.args.string("tag").unwrap_or_default();
                        cmd.log(tag).await;
                        Ok(None)
                    })
                }))
                .register()?;
            r.command("fast <tag>")
                .action(Action::future(|cmd| {
                    Box::pin(async move {
                        let tag = cmd.args.string("tag").unwrap_or_default();
                        cmd.log(tag).await;
                        Ok(None)
                    })
                }))
                .register()
        })
        .unwrap();

    let first = {
        let session = session.clone();
        tokio::spawn(async move { session.exec("slow one").await })
    };
    tokio::time::sleep(Duration::from_millis(5)).await;
    let second = {
        let session = session.clone();
        tokio::spawn(async move { session.exec("fast two").await })
    };

    first.await.unwrap().unwrap();
    second.await.unwrap().unwrap();
    assert_eq!(output.chunks(), vec!["one", "two"]);
}

#[tokio::test]
async fn test_cancel_stops_running_command() {
    let (session, output) = buffered_session();
    let hooks = Arc::new(AtomicUsize::new(0));
    let hook_count = Arc::clone(&hooks);
    session
        .with_registry(move |r| {
            r.command("wait")
                .cancel(move || {
                    hook_count.fetch_add(1, Ordering::SeqCst);
                })
                .action(Action::future(|cmd| {
                    Box::pin(async move {
                        cmd.log("waiting").await;
                        cmd.cancelled().await;
                        cmd.log("stopped").await;
                        Ok(None)
                    })
                }))
                .register()
        })
        .unwrap();
    let mut events = session.subscribe();

    let running = {
        let session = session.clone();
        tokio::spawn(async move { session.exec("wait").await })
    };

    loop {
        if let SessionEvent::CommandStarted { .. } = events.recv().await.unwrap() {
            break;
        }
    }
    assert_eq!(session.state(), SessionState::Executing);
    assert!(session.cancel());

    let result = tokio::time::timeout(Duration::from_secs(5), running)
        .await
        .unwrap()
        .unwrap();
    assert!(result.is_ok());
    assert_eq!(hooks.load(Ordering::SeqCst), 1);
    assert_eq!(output.chunks(), vec!["waiting", "stopped"]);
    assert_eq!(session.state(), SessionState::Idle);
    assert!(!session.cancel());

    let mut saw_cancel = false;
    while let Ok(event) = events.try_recv() {
        if matches!(event, SessionEvent::Cancelled { .. }) {
            saw_cancel = true;
        }
    }
    assert!(saw_cancel);
}

#[tokio::test]
async fn test_callback_handler_settles_from_task() {
    let (session, _) = buffered_session();
    session
        .with_registry(|r| {
            r.command("later")
                .action(Action::callback(|_, done| {
                    tokio::spawn(async move {
                        tokio::time::sleep(Duration::from_millis(10)).await;
                        done.value(json!("done"));
                    });
                }))
                .register()
        })
        .unwrap();

    assert_eq!(session.exec("later").await.unwrap(), Some(json!("done")));
}

#[tokio::test]
async fn test_downstream_validator_stops_chain() {
    let (session, output) = buffered_session();
    session
        .with_registry(|r| {
            text_commands(r)?;
            r.command("picky")
                .validate(|args| match &args.stdin {
                    Some(lines) if lines.iter().all(|l| l.len() < 5) => Ok(()),
                    _ => anyhow::bail!("input too long"),
                })
                .action(Action::future(|cmd| {
                    Box::pin(async move {
                        cmd.log("accepted").await;
                        Ok(None)
                    })
                }))
                .register()
                .map(|_| ())
        })
        .unwrap();
    let mut events = session.subscribe();

    session.exec("say hi | picky").await.unwrap();
    session.exec("say much longer | picky").await.unwrap();

    assert_eq!(output.chunks(), vec!["accepted", "input too long"]);
    let mut rejected = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let SessionEvent::ValidationFailed { command, message } = event {
            rejected.push((command, message));
        }
    }
    assert_eq!(
        rejected,
        vec![("picky".to_string(), "input too long".to_string())]
    );
}

#[tokio::test]
async fn test_validator_failure_skips_later_stages() {
    let (session, output) = buffered_session();
    let end_runs = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&end_runs);
    session
        .with_registry(move |r| {
            r.command("src")
                .action(Action::future(|cmd| {
                    Box::pin(async move {
                        cmd.log("payload").await;
                        Ok(None)
                    })
                }))
                .register()?;
            r.command("mid")
                .validate(|_| anyhow::bail!("no"))
                .action(Action::future(|cmd| {
                    Box::pin(async move {
                        cmd.log("mid ran").await;
                        Ok(None)
                    })
                }))
                .register()?;
            r.command("end")
                .action(Action::sync(move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Ok(None)
                }))
                .register()
        })
        .unwrap();

    session.exec("src | mid | end").await.unwrap();

    assert_eq!(end_runs.load(Ordering::SeqCst), 0);
    assert_eq!(output.chunks(), vec!["no"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_cancel_from_other_thread_settles_to_idle() {
    for _ in 0..200 {
        let (session, _) = buffered_session();
        session
            .with_registry(|r| {
                r.command("wait")
                    .action(Action::future(|cmd| {
                        Box::pin(async move {
                            cmd.cancelled().await;
                            Ok(None)
                        })
                    }))
                    .register()
            })
            .unwrap();
        let mut events = session.subscribe();

        let running = {
            let session = session.clone();
            tokio::spawn(async move { session.exec("wait").await })
        };
        loop {
            if let SessionEvent::CommandStarted { .. } = events.recv().await.unwrap() {
                break;
            }
        }

        let canceller = {
            let session = session.clone();
            std::thread::spawn(move || session.cancel())
        };
        running.await.unwrap().unwrap();
        assert!(canceller.join().unwrap());
        assert_eq!(session.state(), SessionState::Idle);
    }
}

#[tokio::test]
async fn test_callback_handler_logs_from_task() {
    let (session, output) = buffered_session();
    session
        .with_registry(|r| {
            text_commands(r)?;
            r.command("tick")
                .action(Action::callback(|_, done| {
                    tokio::spawn(async move {
                        for word in ["one", "two"] {
                            tokio::time::sleep(Duration::from_millis(5)).await;
                            done.log(word);
                        }
                        done.ok();
                    });
                }))
                .register()
                .map(|_| ())
        })
        .unwrap();

    session.exec("tick").await.unwrap();
    session.exec("tick | upper").await.unwrap();

    assert_eq!(output.chunks(), vec!["one", "two", "ONE", "TWO"]);
}

#[tokio::test]
async fn test_after_and_done_hooks() {
    let (session, _) = buffered_session();
    let after_runs = Arc::new(AtomicUsize::new(0));
    let done_runs = Arc::new(AtomicUsize::new(0));
    let (after_count, done_count) = (Arc::clone(&after_runs), Arc::clone(&done_runs));
    session
        .with_registry(move |r| {
            text_commands(r)?;
            r.command("hooked")
                .after(move |_| {
                    after_count.fetch_add(1, Ordering::SeqCst);
                })
                .done(move || {
                    done_count.fetch_add(1, Ordering::SeqCst);
                })
                .action(Action::future(|cmd| {
                    Box::pin(async move {
                        cmd.log("hi").await;
                        Ok(None)
                    })
                }))
                .register()
                .map(|_| ())
        })
        .unwrap();

    session.exec("say a b | hooked").await.unwrap();
    assert_eq!(after_runs.load(Ordering::SeqCst), 1);
    assert_eq!(done_runs.load(Ordering::SeqCst), 1);

    session.exec("hooked --help").await.unwrap();
    assert_eq!(after_runs.load(Ordering::SeqCst), 1);
    assert_eq!(done_runs.load(Ordering::SeqCst), 2);
}
