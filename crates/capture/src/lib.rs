pub mod body;
pub mod cache;
pub mod client;
pub mod deferred;
pub mod listener;
pub mod normalize;
pub mod stack;
pub mod transaction;

pub use body::Body;
pub use cache::{CacheDetector, CacheProbe};
pub use client::RecordingClient;
pub use deferred::DeferredResponse;
pub use listener::TransactionListener;
pub use normalize::Normalizer;
pub use transaction::{
    EventKind, EventedTransaction, Exchange, ExchangeRequest, ExchangeResponse, HistoryEntry,
    RawRequest, RawResponse, RawTransaction, RecordedTransaction,
};
