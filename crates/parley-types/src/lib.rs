pub mod fragment;
pub mod message;
pub mod thread;

pub use fragment::{FragmentKind, StreamFragment};
pub use message::{Message, MessageRole};
pub use thread::{
    canonical_thread_id, legacy_thread_id, thread_id_spaces, title_from_content, Thread,
    ThreadSummary, CANONICAL_THREAD_PREFIX, TITLE_WORD_LIMIT,
};
