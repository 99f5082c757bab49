//! Tab completion through a session.

use super::buffered_session;
use pretty_assertions::assert_eq;
use shellac::completion::{Completion, CompletionSource};

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn session() -> shellac::Session {
    let (session, _) = buffered_session();
    session
        .with_registry(|r| {
            r.command("connect <host>")
                .autocomplete(CompletionSource::future(|_word| {
                    Box::pin(async { Ok(vec!["alpha".to_string(), "beta".to_string()]) })
                }))
                .register()?;
            r.command("deploy <env>")
                .autocomplete(CompletionSource::callback(|_word, reply| {
                    reply(Ok(vec!["staging".to_string(), "production".to_string()]));
                }))
                .register()?;
            r.command("delete <id>").register()
        })
        .unwrap();
    session
}

#[tokio::test]
async fn test_command_name_completes() {
    let session = session();
    assert_eq!(
        session.complete("con", 3).await,
        Some(Completion::Line("connect ".to_string()))
    );
}

#[tokio::test]
async fn test_async_source() {
    let session = session();
    assert_eq!(
        session.complete("connect al", 10).await,
        Some(Completion::Line("connect alpha ".to_string()))
    );
}

#[tokio::test]
async fn test_callback_source() {
    let session = session();
    assert_eq!(
        session.complete("deploy st", 9).await,
        Some(Completion::Line("deploy staging ".to_string()))
    );
}

#[tokio::test]
async fn test_candidates_need_second_tab() {
    let session = session();
    assert_eq!(session.complete("de", 2).await, None);
    assert_eq!(
        session.complete("de", 2).await,
        Some(Completion::Candidates(strings(&["delete", "deploy"])))
    );
}

#[tokio::test]
async fn test_line_completion_resets_tab_count() {
    let session = session();
    assert_eq!(session.complete("de", 2).await, None);
    assert!(session.complete("con", 3).await.is_some());
    assert_eq!(session.complete("de", 2).await, None);
}

#[tokio::test]
async fn test_cursor_in_middle_keeps_tail() {
    let session = session();
    assert_eq!(
        session.complete("con | deploy st", 3).await,
        Some(Completion::Line("connect | deploy st".to_string()))
    );
}
