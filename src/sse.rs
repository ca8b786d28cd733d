//! # Streaming Module
//!
//! Streaming responses and the error shield around them.
//!
//! ## Overview
//!
//! A streaming handler hands the transport a producer: any iterator of
//! `Result<String, E>` chunks. [`forward_stream`] pulls chunks and passes
//! them to a sink until the producer ends, yields its first `Err`, or panics.
//! The producer's failure never escapes; it is returned as a `panic` envelope
//! in the [`StreamSummary`], after every chunk produced before it was
//! forwarded.
//!
//! For Server-Sent Events, [`SseEvent`] renders `text/event-stream` frames
//! and [`channel()`] gives a sender/receiver pair on `may` channels so a
//! coroutine can produce events while the transport drains them.
//!
//! ## Usage
//!
//! ```rust
//! use switchyard::sse;
//!
//! let (sender, receiver) = sse::channel();
//! sender.send("Event 1");
//! sender.send("Event 2");
//! drop(sender);
//!
//! assert_eq!(receiver.collect(), "data: Event 1\n\ndata: Event 2\n\n");
//! ```
//!
//! ## SSE Format
//!
//! ```text
//! event: update
//! id: 7
//! data: first line
//! data: second line
//!
//! ```

use std::fmt::{self, Display, Write as _};
use std::panic::{catch_unwind, AssertUnwindSafe};

use may::sync::mpsc;
use serde_json::json;
use tracing::{debug, error};

use crate::error::{panic_message, ErrorCode, ErrorEnvelope};

/// `Content-Type` of an SSE response
pub const SSE_CONTENT_TYPE: &str = "text/event-stream";

/// Outcome of forwarding one stream.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamSummary {
    /// Chunks handed to the sink
    pub forwarded: usize,
    /// Set when the producer failed before finishing
    pub error: Option<ErrorEnvelope>,
}

impl StreamSummary {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.error.is_none()
    }
}

fn stream_failure(message: String, forwarded: usize) -> ErrorEnvelope {
    ErrorEnvelope::new(ErrorCode::Panic, format!("stream producer failed: {message}"))
        .with_details(json!({ "message": message, "forwarded": forwarded }))
}

/// Forward `producer`'s chunks to `sink` until the producer ends or fails.
pub fn forward_stream<I, E, S>(producer: I, mut sink: S) -> StreamSummary
where
    I: IntoIterator<Item = Result<String, E>>,
    E: Display,
    S: FnMut(String),
{
    let mut forwarded = 0usize;

    let mut iter = match catch_unwind(AssertUnwindSafe(|| producer.into_iter())) {
        Ok(iter) => iter,
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            error!(panic_message = %message, "Stream producer panicked before first chunk");
            return StreamSummary {
                forwarded,
                error: Some(stream_failure(message, forwarded)),
            };
        }
    };

    loop {
        let next = catch_unwind(AssertUnwindSafe(|| iter.next()));
        let failure = match next {
            Ok(None) => {
                debug!(forwarded, "Stream completed");
                return StreamSummary {
                    forwarded,
                    error: None,
                };
            }
            Ok(Some(Ok(chunk))) => {
                sink(chunk);
                forwarded += 1;
                continue;
            }
            Ok(Some(Err(e))) => e.to_string(),
            Err(payload) => panic_message(payload.as_ref()),
        };

        error!(forwarded, error = %failure, "Stream producer failed");
        return StreamSummary {
            forwarded,
            error: Some(stream_failure(failure, forwarded)),
        };
    }
}

/// One Server-Sent Event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseEvent {
    pub event: Option<String>,
    pub id: Option<String>,
    pub data: String,
    /// Reconnection delay in milliseconds
    pub retry: Option<u64>,
}

impl SseEvent {
    pub fn data(data: impl Into<String>) -> Self {
        Self {
            data: data.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_event(mut self, event: impl Into<String>) -> Self {
        self.event = Some(event.into());
        self
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    #[must_use]
    pub fn with_retry(mut self, millis: u64) -> Self {
        self.retry = Some(millis);
        self
    }

    /// `event: error` frame carrying the envelope's HTTP body as JSON
    #[must_use]
    pub fn from_envelope(envelope: &ErrorEnvelope) -> Self {
        Self::data(envelope.to_http_body().to_string()).with_event("error")
    }
}

impl Display for SseEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(event) = &self.event {
            writeln!(f, "event: {event}")?;
        }
        if let Some(id) = &self.id {
            writeln!(f, "id: {id}")?;
        }
        if let Some(retry) = self.retry {
            writeln!(f, "retry: {retry}")?;
        }
        for line in self.data.split('\n') {
            writeln!(f, "data: {line}")?;
        }
        f.write_char('\n')
    }
}

/// Sender side of an SSE channel.
///
/// Clone this to send events from multiple coroutines.
#[derive(Clone)]
pub struct SseSender {
    tx: mpsc::Sender<SseEvent>,
}

impl SseSender {
    /// Send a data-only event; a closed receiver is ignored
    pub fn send(&self, data: impl Into<String>) {
        let _ = self.tx.send(SseEvent::data(data));
    }

    pub fn send_event(&self, event: SseEvent) {
        let _ = self.tx.send(event);
    }

    /// Forward a producer as data events, ending with an `error` event if it
    /// fails.
    pub fn forward<I, E>(&self, producer: I) -> StreamSummary
    where
        I: IntoIterator<Item = Result<String, E>>,
        E: Display,
    {
        let summary = forward_stream(producer, |chunk| self.send(chunk));
        if let Some(envelope) = &summary.error {
            self.send_event(SseEvent::from_envelope(envelope));
        }
        summary
    }
}

/// Receiver side that converts queued events into `text/event-stream` frames.
pub struct SseReceiver {
    rx: mpsc::Receiver<SseEvent>,
}

impl SseReceiver {
    /// Drain the channel until every sender is dropped and return the frames
    /// as one string.
    pub fn collect(self) -> String {
        let mut out = String::new();
        while let Ok(event) = self.rx.recv() {
            let _ = write!(out, "{event}");
        }
        out
    }

    /// Next event, blocking until one arrives or all senders are gone
    pub fn recv(&self) -> Option<SseEvent> {
        self.rx.recv().ok()
    }
}

/// Create a new SSE channel returning the sender and receiver halves.
pub fn channel() -> (SseSender, SseReceiver) {
    let (tx, rx) = mpsc::channel();
    (SseSender { tx }, SseReceiver { rx })
}
