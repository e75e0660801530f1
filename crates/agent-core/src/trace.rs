//! Reasoning Trace
//!
//! Side channel for intermediate agent events. The agent pushes events into a
//! [`TraceSink`] while it works; the UI layer drains the matching
//! [`TraceStream`] live or after the call completes. Nothing here touches the
//! transcript.

use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;

/// One intermediate event produced while the agent works on a task
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TraceEvent {
    /// A new reasoning step begins
    Thinking { step: usize },

    /// Streamed model token
    Token { text: String },

    /// The model's reasoning for the current step
    Thought { text: String },

    /// The model chose a tool
    Action { tool: String, input: String },

    /// What the tool returned
    Observation {
        tool: String,
        output: String,
        success: bool,
    },

    /// The model produced its final answer
    FinalAnswer { text: String },
}

/// Create a connected sink/stream pair
pub fn channel() -> (TraceSink, TraceStream) {
    let (tx, rx) = mpsc::unbounded_channel();
    (TraceSink { tx: Some(tx) }, TraceStream { rx })
}

/// Sending half handed to the agent
#[derive(Clone, Debug)]
pub struct TraceSink {
    tx: Option<mpsc::UnboundedSender<TraceEvent>>,
}

impl TraceSink {
    /// A sink that drops every event
    pub const fn discard() -> Self {
        Self { tx: None }
    }

    /// Emit an event. A receiver that went away is not an error: the trace is
    /// display-only.
    pub fn emit(&self, event: TraceEvent) {
        if let Some(tx) = &self.tx {
            if tx.send(event).is_err() {
                tracing::trace!("trace receiver dropped");
            }
        }
    }
}

/// Receiving half drained by the UI layer
#[derive(Debug)]
pub struct TraceStream {
    rx: mpsc::UnboundedReceiver<TraceEvent>,
}

impl TraceStream {
    /// Wait for the next event; `None` once every sink is dropped
    pub async fn recv(&mut self) -> Option<TraceEvent> {
        self.rx.recv().await
    }

    /// Take whatever is buffered right now without waiting
    pub fn drain(&mut self) -> Vec<TraceEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            events.push(event);
        }
        events
    }
}

impl Stream for TraceStream {
    type Item = TraceEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}
