use parley_types::StreamFragment;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// The consumer of a turn's fragments went away
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("fragment receiver closed")]
pub struct SinkClosed;

/// Sending half of a turn's fragment channel, paired with the turn's
/// cancellation signal.
#[derive(Debug, Clone)]
pub struct FragmentSink {
    tx: mpsc::Sender<StreamFragment>,
    cancellation: CancellationToken,
}

impl FragmentSink {
    pub fn new(tx: mpsc::Sender<StreamFragment>, cancellation: CancellationToken) -> Self {
        Self { tx, cancellation }
    }

    /// Deliver one fragment, waiting for channel capacity.
    ///
    /// Fails once the turn is cancelled or the receiver is dropped; the
    /// latter also cancels the token so every observer sees it.
    pub async fn send(&self, fragment: StreamFragment) -> Result<(), SinkClosed> {
        tokio::select! {
            biased;
            _ = self.cancellation.cancelled() => Err(SinkClosed),
            sent = self.tx.send(fragment) => sent.map_err(|_| {
                self.cancellation.cancel();
                SinkClosed
            }),
        }
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

/// Bounded fragment channel with a fresh cancellation token
pub fn fragment_channel(capacity: usize) -> (FragmentSink, mpsc::Receiver<StreamFragment>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    (FragmentSink::new(tx, CancellationToken::new()), rx)
}
