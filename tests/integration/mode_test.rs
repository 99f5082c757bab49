//! Modes: entering, routing lines to the mode handler, leaving.

use super::buffered_session;
use pretty_assertions::assert_eq;
use serde_json::json;
use shellac::session::{Action, SessionEvent, SessionState};

fn register_calc(session: &shellac::Session) {
    session
        .with_registry(|r| {
            r.mode("calc")
                .description("Adds numbers")
                .delimiter("calc>")
                .init(Action::sync(|cmd| {
                    cmd.session().write("entering calc");
                    Ok(None)
                }))
                .action(Action::future(|cmd| {
                    Box::pin(async move {
                        let line = cmd.args.string("command").unwrap_or_default();
                        let sum: i64 = line
                            .split_whitespace()
                            .filter_map(|w| w.parse::<i64>().ok())
                            .sum();
                        cmd.log(sum).await;
                        Ok(Some(json!(sum)))
                    })
                }))
                .register()
        })
        .unwrap();
}

#[tokio::test]
async fn test_mode_round_trip() {
    let (session, output) = buffered_session();
    register_calc(&session);
    let mut events = session.subscribe();

    session.exec("calc").await.unwrap();
    assert_eq!(session.mode().as_deref(), Some("calc"));
    assert_eq!(session.delimiter(), "calc>");
    assert_eq!(session.state(), SessionState::InMode);

    let result = session.exec("1 2 3").await.unwrap();
    assert_eq!(result, Some(json!(6)));

    session.exec("exit").await.unwrap();
    assert_eq!(session.mode(), None);
    assert_eq!(session.delimiter(), "shellac$");
    assert_eq!(session.state(), SessionState::Idle);

    assert_eq!(output.chunks(), vec!["entering calc", "6"]);

    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        match event {
            SessionEvent::ModeEntered { command } => seen.push(format!("enter {command}")),
            SessionEvent::ModeExited { command } => seen.push(format!("exit {command}")),
            _ => {}
        }
    }
    assert_eq!(seen, vec!["enter calc", "exit calc"]);
}

#[tokio::test]
async fn test_mode_lines_bypass_command_matching() {
    let (session, _) = buffered_session();
    register_calc(&session);
    session
        .with_registry(|r| {
            r.command("one")
                .action(Action::sync(|_| Ok(Some(json!("command")))))
                .register()
        })
        .unwrap();

    session.exec("calc").await.unwrap();
    assert_eq!(session.exec("one").await.unwrap(), Some(json!(0)));
    session.exec("exit").await.unwrap();
    assert_eq!(session.exec("one").await.unwrap(), Some(json!("command")));
}

#[tokio::test]
async fn test_mode_history_is_separate() {
    let (session, _) = buffered_session();
    register_calc(&session);

    session.submit("calc").await.unwrap();
    session.submit("1 1").await.unwrap();
    session.submit("2 2").await.unwrap();
    assert_eq!(session.history_entries(), vec!["1 1", "2 2"]);

    session.submit("exit").await.unwrap();
    assert_eq!(session.history_entries(), vec!["calc"]);
    assert_eq!(session.history_previous().as_deref(), Some("calc"));
}
