//! Merged event stream.

use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use crossterm::event::{Event as CrosstermEvent, EventStream, KeyEventKind};
use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::Event;
use crate::monitor::CycleReport;

/// Stream of [`Event`]s fed by a background task.
pub struct EventHandler {
    event_rx: mpsc::UnboundedReceiver<Event>,
    cancel: CancellationToken,
}

impl EventHandler {
    /// Spawns the reader task. Key releases and repeats are dropped so
    /// every key press is handled once.
    pub fn new(tick_rate: Duration, mut reports: mpsc::UnboundedReceiver<CycleReport>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let token = cancel.clone();

        tokio::spawn(async move {
            let mut terminal = EventStream::new();
            let mut tick = time::interval(tick_rate);
            loop {
                let event = tokio::select! {
                    _ = token.cancelled() => break,
                    Some(report) = reports.recv() => Event::Cycle(Box::new(report)),
                    next = terminal.next() => match next {
                        Some(Ok(CrosstermEvent::Key(key))) if key.kind == KeyEventKind::Press => {
                            Event::Key(key)
                        }
                        Some(Ok(CrosstermEvent::Resize(width, height))) => {
                            Event::Resize(width, height)
                        }
                        Some(Ok(_)) => continue,
                        Some(Err(err)) => {
                            warn!(error = %err, "terminal event read failed");
                            continue;
                        }
                        None => break,
                    },
                    _ = tick.tick() => Event::Tick,
                };
                if tx.send(event).is_err() {
                    break;
                }
            }
            debug!("event reader stopped");
        });

        Self {
            event_rx: rx,
            cancel,
        }
    }

    /// Handler over an existing channel, without a terminal reader.
    pub fn from_channel(event_rx: mpsc::UnboundedReceiver<Event>) -> Self {
        Self {
            event_rx,
            cancel: CancellationToken::new(),
        }
    }

    fn poll_event(&mut self, cx: &mut Context<'_>) -> Poll<Option<Event>> {
        self.event_rx.poll_recv(cx)
    }
}

impl Drop for EventHandler {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl Stream for EventHandler {
    type Item = Event;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.poll_event(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

    #[tokio::test]
    async fn yields_events_in_order_then_ends() {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut handler = EventHandler::from_channel(rx);
        tx.send(Event::Key(KeyEvent::new(KeyCode::Char('r'), KeyModifiers::NONE)))
            .unwrap();
        tx.send(Event::Cycle(Box::default())).unwrap();
        drop(tx);

        assert!(matches!(handler.next().await, Some(Event::Key(k)) if k.code == KeyCode::Char('r')));
        assert!(matches!(handler.next().await, Some(Event::Cycle(_))));
        assert!(handler.next().await.is_none());
    }
}
