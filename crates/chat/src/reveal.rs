use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use tokio::sync::mpsc;

use crate::message::RevealTarget;

/// Boxed worker future that drives one reveal stream to completion.
///
/// The caller decides where it runs; dropping it abandons the stream without
/// touching any conversation state.
pub type RevealWorker = Pin<Box<dyn Future<Output = ()> + Send + 'static>>;

/// One incremental event of a reveal stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RevealEvent {
    /// The next word of the reply, to be joined with a single space.
    Step { target: RevealTarget, word: String },
    /// Emitted exactly once after the final word (immediately for an empty
    /// reply). Receipt is the moment the video link may be unveiled.
    Completed { target: RevealTarget },
}

impl RevealEvent {
    pub fn target(&self) -> RevealTarget {
        match self {
            Self::Step { target, .. } | Self::Completed { target } => *target,
        }
    }
}

/// Builds the reveal stream for one assistant reply.
///
/// The reply is split into whitespace-delimited words; the worker sleeps
/// `cadence` before each word, so a reply of N words produces exactly N
/// `Step` events followed by one `Completed`. Events carry the target that
/// was captured when the placeholder turn was appended, never "the active
/// conversation", so mid-stream list mutations cannot misroute a write.
pub fn reveal_stream(
    target: RevealTarget,
    text: &str,
    cadence: Duration,
) -> (mpsc::UnboundedReceiver<RevealEvent>, RevealWorker) {
    let words = text
        .split_whitespace()
        .map(str::to_string)
        .collect::<Vec<_>>();

    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let worker: RevealWorker = Box::pin(run_reveal_worker(target, words, cadence, event_tx));

    (event_rx, worker)
}

async fn run_reveal_worker(
    target: RevealTarget,
    words: Vec<String>,
    cadence: Duration,
    event_tx: mpsc::UnboundedSender<RevealEvent>,
) {
    let word_count = words.len();

    for word in words {
        tokio::time::sleep(cadence).await;

        if event_tx.send(RevealEvent::Step { target, word }).is_err() {
            // Receiver gone: the exchange was abandoned, stop revealing.
            tracing::debug!(?target, "reveal receiver dropped mid-stream");
            return;
        }
    }

    tracing::debug!(?target, word_count, "reveal stream completed");
    let _ = event_tx.send(RevealEvent::Completed { target });
}
