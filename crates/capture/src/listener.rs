use std::sync::Arc;

use crate::transaction::RawTransaction;

/// Lifecycle callbacks a transport invokes once per exchange.
///
/// `on_complete` fires when a response arrived, whatever its status.
/// `on_error` fires when no response could be obtained.
pub trait TransactionListener: Send + Sync {
    fn on_complete(&self, transaction: RawTransaction);

    fn on_error(&self, transaction: RawTransaction);
}

impl<T> TransactionListener for Arc<T>
where
    T: TransactionListener + ?Sized,
{
    fn on_complete(&self, transaction: RawTransaction) {
        (**self).on_complete(transaction);
    }

    fn on_error(&self, transaction: RawTransaction) {
        (**self).on_error(transaction);
    }
}
