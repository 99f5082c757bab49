//! Completion data sources.
//!
//! A command or option can supply completion data as a fixed list, a plain
//! function, a callback-style function or an async function. All four are
//! normalized to a list by [`CompletionSource::resolve`].

use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::sync::oneshot;
use tracing::warn;

/// Continuation handed to callback-style sources.
pub type Reply = Box<dyn FnOnce(Result<Vec<String>, String>) + Send>;

type SyncFn = Arc<dyn Fn(&str) -> Vec<String> + Send + Sync>;
type CallbackFn = Arc<dyn Fn(&str, Reply) + Send + Sync>;
type AsyncFn = Arc<dyn Fn(String) -> BoxFuture<'static, anyhow::Result<Vec<String>>> + Send + Sync>;

/// Where completion candidates come from.
#[derive(Clone)]
pub enum CompletionSource {
    /// A fixed list.
    Static(Vec<String>),
    /// Computed synchronously from the current word.
    Sync(SyncFn),
    /// Delivers its result through a continuation.
    Callback(CallbackFn),
    /// Computed asynchronously from the current word.
    Async(AsyncFn),
}

impl CompletionSource {
    /// Creates a source from a fixed list.
    pub fn list<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Static(items.into_iter().map(Into::into).collect())
    }

    /// Creates a source from a synchronous function of the current word.
    pub fn sync<F>(f: F) -> Self
    where
        F: Fn(&str) -> Vec<String> + Send + Sync + 'static,
    {
        Self::Sync(Arc::new(f))
    }

    /// Creates a source that replies through a continuation.
    pub fn callback<F>(f: F) -> Self
    where
        F: Fn(&str, Reply) + Send + Sync + 'static,
    {
        Self::Callback(Arc::new(f))
    }

    /// Creates a source from an async function of the current word.
    pub fn future<F>(f: F) -> Self
    where
        F: Fn(String) -> BoxFuture<'static, anyhow::Result<Vec<String>>> + Send + Sync + 'static,
    {
        Self::Async(Arc::new(f))
    }

    /// Produces the candidate list for `word`.
    ///
    /// Failures and callbacks that never reply yield an empty list.
    pub async fn resolve(&self, word: &str) -> Vec<String> {
        match self {
            Self::Static(items) => items.clone(),
            Self::Sync(f) => f(word),
            Self::Callback(f) => {
                let (tx, rx) = oneshot::channel();
                f(
                    word,
                    Box::new(move |result| {
                        let _ = tx.send(result);
                    }),
                );
                match rx.await {
                    Ok(Ok(items)) => items,
                    Ok(Err(e)) => {
                        warn!(error = %e, "Completion source failed");
                        Vec::new()
                    }
                    Err(_) => {
                        warn!("Completion source dropped its reply");
                        Vec::new()
                    }
                }
            }
            Self::Async(f) => match f(word.to_string()).await {
                Ok(items) => items,
                Err(e) => {
                    warn!(error = %e, "Completion source failed");
                    Vec::new()
                }
            },
        }
    }
}

impl fmt::Debug for CompletionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static(items) => f.debug_tuple("Static").field(items).finish(),
            Self::Sync(_) => f.write_str("Sync(..)"),
            Self::Callback(_) => f.write_str("Callback(..)"),
            Self::Async(_) => f.write_str("Async(..)"),
        }
    }
}
