//! Stream Session - one producer, one consumer, one channel
//!
//! The model callback pushes tokens into a [`TokenSink`]; the HTTP response
//! pulls them out of the matching [`TokenStream`]. The channel is unbounded,
//! so the producer never waits for a slow client.
//!
//! ```text
//! Open --Token--> Open
//! Open --End | idle timeout | producer gone--> Closed
//! ```
//!
//! Once closed the consumer yields nothing more and later sends are dropped.

use futures_util::stream::{self, Stream};
use std::time::Duration;
use tokio::sync::mpsc;

/// Consumer gives up after this long without a token
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Value carried over the session channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// A chunk of text for the client
    Token(String),
    /// End-of-stream sentinel
    End,
}

/// Consumer-side lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Open,
    Closed,
}

/// Create the two halves of a stream session
pub fn session(idle_timeout: Duration) -> (TokenSink, TokenStream) {
    let (tx, rx) = mpsc::unbounded_channel();

    let sink = TokenSink {
        tx,
        buffer: String::new(),
        finished: false,
    };
    let stream = TokenStream {
        rx,
        idle_timeout,
        state: SessionState::Open,
    };

    (sink, stream)
}

/// Producer half
///
/// Dropping an unfinished sink still emits the end sentinel.
pub struct TokenSink {
    tx: mpsc::UnboundedSender<StreamEvent>,
    buffer: String,
    finished: bool,
}

impl TokenSink {
    /// Forward a model token and append it to the full-response buffer
    pub fn send(&mut self, token: &str) {
        self.buffer.push_str(token);
        self.forward(token);
    }

    /// Forward text that is not model output (notices, progress)
    pub fn notice(&mut self, text: &str) {
        self.forward(text);
    }

    /// Everything passed to [`send`](Self::send) so far
    pub fn buffer(&self) -> &str {
        &self.buffer
    }

    /// Emit the end sentinel and hand back the full response
    pub fn finish(mut self) -> String {
        self.end();
        std::mem::take(&mut self.buffer)
    }

    fn forward(&self, text: &str) {
        if self.finished {
            return;
        }
        if self.tx.send(StreamEvent::Token(text.to_string())).is_err() {
            tracing::debug!("Stream consumer closed, dropping token");
        }
    }

    fn end(&mut self) {
        if !self.finished {
            self.finished = true;
            let _ = self.tx.send(StreamEvent::End);
        }
    }
}

impl Drop for TokenSink {
    fn drop(&mut self) {
        self.end();
    }
}

/// Consumer half
pub struct TokenStream {
    rx: mpsc::UnboundedReceiver<StreamEvent>,
    idle_timeout: Duration,
    state: SessionState,
}

impl TokenStream {
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Wait for the next token.
    ///
    /// Returns `None` once the session is closed by the end sentinel, the
    /// idle timeout or the producer disappearing.
    pub async fn next_token(&mut self) -> Option<String> {
        if self.state == SessionState::Closed {
            return None;
        }

        match tokio::time::timeout(self.idle_timeout, self.rx.recv()).await {
            Ok(Some(StreamEvent::Token(token))) => Some(token),
            Ok(Some(StreamEvent::End)) => {
                self.close();
                None
            }
            Ok(None) => {
                tracing::debug!("Token producer went away without an end sentinel");
                self.close();
                None
            }
            Err(_) => {
                tracing::warn!(
                    idle_timeout_ms = self.idle_timeout.as_millis() as u64,
                    "No token within idle timeout, closing stream"
                );
                self.close();
                None
            }
        }
    }

    /// Adapt into a `Stream` of tokens
    pub fn into_stream(self) -> impl Stream<Item = String> + Send + 'static {
        stream::unfold(self, |mut tokens| async move {
            let token = tokens.next_token().await?;
            Some((token, tokens))
        })
    }

    fn close(&mut self) {
        self.state = SessionState::Closed;
        self.rx.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;

    #[tokio::test]
    async fn test_yields_every_token_then_ends() {
        for n in [0usize, 1, 5] {
            let (mut sink, stream) = session(DEFAULT_IDLE_TIMEOUT);
            for i in 0..n {
                sink.send(&format!("t{} ", i));
            }
            sink.finish();

            let collected: Vec<String> = stream.into_stream().collect().await;
            assert_eq!(collected.len(), n);
        }
    }

    #[tokio::test]
    async fn test_buffer_excludes_notices() {
        let (mut sink, mut stream) = session(DEFAULT_IDLE_TIMEOUT);

        sink.send("Hello");
        sink.notice("[notice]");
        sink.send(" world");
        let full = sink.finish();

        assert_eq!(full, "Hello world");
        assert_eq!(stream.next_token().await.as_deref(), Some("Hello"));
        assert_eq!(stream.next_token().await.as_deref(), Some("[notice]"));
        assert_eq!(stream.next_token().await.as_deref(), Some(" world"));
        assert_eq!(stream.next_token().await, None);
        assert_eq!(stream.state(), SessionState::Closed);
    }

    #[tokio::test]
    async fn test_drop_emits_end() {
        let (mut sink, mut stream) = session(DEFAULT_IDLE_TIMEOUT);
        sink.send("partial");
        drop(sink);

        assert_eq!(stream.next_token().await.as_deref(), Some("partial"));
        assert_eq!(stream.next_token().await, None);
    }

    #[tokio::test]
    async fn test_idle_timeout_closes() {
        let (mut sink, mut stream) = session(Duration::from_millis(20));
        sink.send("first");

        assert_eq!(stream.next_token().await.as_deref(), Some("first"));
        assert_eq!(stream.next_token().await, None);
        assert_eq!(stream.state(), SessionState::Closed);

        // late tokens are ignored, never an error
        sink.send("late");
        assert_eq!(stream.next_token().await, None);
        assert_eq!(sink.finish(), "firstlate");
    }

    #[tokio::test]
    async fn test_concurrent_producer() {
        let (mut sink, stream) = session(DEFAULT_IDLE_TIMEOUT);

        let producer = tokio::spawn(async move {
            for word in ["one ", "two ", "three"] {
                sink.send(word);
                tokio::task::yield_now().await;
            }
            sink.finish()
        });

        let collected: Vec<String> = stream.into_stream().collect().await;
        assert_eq!(collected.concat(), "one two three");
        assert_eq!(producer.await.unwrap(), "one two three");
    }
}
