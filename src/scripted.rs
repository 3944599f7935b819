//! canned backend: replays a fixed script instead of calling out.
//! handy for offline demos and for tests.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::bridge::{CompletionBackend, FragmentStream};
use crate::error::{HelpDeskError, Result};
use crate::transcript::Message;

#[derive(Clone, Debug)]
enum Script {
    Fragments(Vec<String>),
    /// the request itself is rejected.
    Fail(String),
    /// some fragments, then the stream errors.
    BrokenAfter(Vec<String>, String),
}

#[derive(Debug)]
pub struct ScriptedBackend {
    script: Script,
    calls: AtomicUsize,
    last: Mutex<Vec<Message>>,
}

impl ScriptedBackend {
    fn with_script(script: Script) -> Self {
        Self { script, calls: AtomicUsize::new(0), last: Mutex::new(Vec::new()) }
    }

    pub fn fragments<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_script(Script::Fragments(parts.into_iter().map(Into::into).collect()))
    }

    pub fn failing(error: impl Into<String>) -> Self {
        Self::with_script(Script::Fail(error.into()))
    }

    pub fn broken_after<I, S>(parts: I, error: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::with_script(Script::BrokenAfter(
            parts.into_iter().map(Into::into).collect(),
            error.into(),
        ))
    }

    /// how many requests reached this backend.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// the transcript handed to the most recent request.
    pub fn last_messages(&self) -> Vec<Message> {
        self.last.lock().map(|m| m.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl CompletionBackend for ScriptedBackend {
    async fn stream(&self, messages: &[Message]) -> Result<FragmentStream> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut last) = self.last.lock() {
            *last = messages.to_vec();
        }
        let items: Vec<Result<String>> = match &self.script {
            Script::Fail(e) => return Err(HelpDeskError::Provider(e.clone())),
            Script::Fragments(parts) => parts.iter().cloned().map(Ok).collect(),
            Script::BrokenAfter(parts, e) => parts
                .iter()
                .cloned()
                .map(Ok)
                .chain(std::iter::once(Err(HelpDeskError::Provider(e.clone()))))
                .collect(),
        };
        Ok(Box::pin(futures_lite::stream::iter(items)))
    }
}
