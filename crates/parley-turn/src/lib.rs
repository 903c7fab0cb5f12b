pub mod reconciler;
pub mod sink;

pub use reconciler::{
    ChatTurnRequest, Reconciler, TurnHandle, TurnOutcome, DEFAULT_CHANNEL_CAPACITY,
    DEFAULT_HISTORY_LIMIT,
};
pub use sink::{fragment_channel, FragmentSink, SinkClosed};
