//! A searchable, append-only view over one asynchronous text channel.

use regex::Regex;
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, Notify};

/// A growing text buffer fed by an asynchronous channel, searchable while the
/// producer is still writing.
///
/// The buffer accumulates every chunk ever received and is never truncated.
/// Callers can snapshot it at any time with [`full_text`](Self::full_text) or
/// suspend on [`wait_for`](Self::wait_for) until a pattern shows up. Cloning
/// yields another handle to the same underlying buffer.
#[derive(Clone)]
pub struct SearchableStream {
    state: Arc<StreamState>,
}

struct StreamState {
    inner: Mutex<StreamInner>,
    changed: Notify,
}

#[derive(Default)]
struct StreamInner {
    buffer: String,
    closed: bool,
}

enum Pattern<'a> {
    Substring(&'a str),
    Regex(&'a Regex),
}

impl Pattern<'_> {
    fn matches(&self, text: &str) -> bool {
        match self {
            Pattern::Substring(needle) => text.contains(needle),
            Pattern::Regex(regex) => regex.is_match(text),
        }
    }
}

impl SearchableStream {
    pub(crate) fn new() -> Self {
        Self {
            state: Arc::new(StreamState {
                inner: Mutex::new(StreamInner::default()),
                changed: Notify::new(),
            }),
        }
    }

    /// Create a stream fed by `chunks`; the stream closes when the channel
    /// ends.
    pub(crate) fn from_channel(mut chunks: mpsc::UnboundedReceiver<String>) -> Self {
        let stream = Self::new();
        let feed = stream.clone();
        tokio::spawn(async move {
            while let Some(chunk) = chunks.recv().await {
                feed.append(&chunk);
            }
            feed.close();
        });
        stream
    }

    /// Append arrived text and wake every suspended search for re-evaluation.
    pub(crate) fn append(&self, chunk: &str) {
        let mut inner = self.state.inner.lock().unwrap();
        inner.buffer.push_str(chunk);
        drop(inner);
        self.state.changed.notify_waiters();
    }

    /// Mark the stream as ended. Pending searches resolve immediately; the
    /// accumulated buffer stays readable.
    pub(crate) fn close(&self) {
        let mut inner = self.state.inner.lock().unwrap();
        inner.closed = true;
        drop(inner);
        self.state.changed.notify_waiters();
    }

    /// Snapshot of everything received so far.
    pub fn full_text(&self) -> String {
        self.state.inner.lock().unwrap().buffer.clone()
    }

    /// Whether the underlying channel has ended.
    pub fn is_closed(&self) -> bool {
        self.state.inner.lock().unwrap().closed
    }

    /// Wait until `pattern` appears as a contiguous substring of the
    /// accumulated text.
    ///
    /// Resolves immediately when the pattern is already present; an empty
    /// pattern matches trivially. A pattern split across chunk boundaries is
    /// still found, since the search runs against the concatenated buffer.
    /// Returns a snapshot of the full text at match time, or `None` if the
    /// stream closed without the pattern ever appearing. Concurrent waiters
    /// are independent; resolving one never affects the others.
    pub async fn wait_for(&self, pattern: &str) -> Option<String> {
        self.wait_matching(Pattern::Substring(pattern)).await
    }

    /// Wait until `regex` matches somewhere in the accumulated text.
    ///
    /// Same contract as [`wait_for`](Self::wait_for).
    pub async fn wait_for_match(&self, regex: &Regex) -> Option<String> {
        self.wait_matching(Pattern::Regex(regex)).await
    }

    async fn wait_matching(&self, pattern: Pattern<'_>) -> Option<String> {
        loop {
            // register for wakeups before checking, so an append landing
            // between the check and the await cannot be missed
            let changed = self.state.changed.notified();
            {
                let inner = self.state.inner.lock().unwrap();
                if pattern.matches(&inner.buffer) {
                    return Some(inner.buffer.clone());
                }
                if inner.closed {
                    return None;
                }
            }
            changed.await;
        }
    }

    /// Wait until the stream closes.
    pub(crate) async fn wait_closed(&self) {
        loop {
            let changed = self.state.changed.notified();
            if self.is_closed() {
                return;
            }
            changed.await;
        }
    }
}
