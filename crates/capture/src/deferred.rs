use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};

use callscope_core::error::Result;
use futures::FutureExt;
use futures::future::BoxFuture;
use tokio::runtime::{Builder, Handle, RuntimeFlavor};
use tracing::warn;

use crate::transaction::RawResponse;

/// A response that is either available or still owed by the transport.
pub struct DeferredResponse {
    state: Mutex<State>,
}

enum State {
    Pending(BoxFuture<'static, Result<RawResponse>>),
    Ready(Arc<RawResponse>),
    Failed(String),
}

impl DeferredResponse {
    pub fn ready(response: RawResponse) -> Self {
        Self {
            state: Mutex::new(State::Ready(Arc::new(response))),
        }
    }

    pub fn pending<F>(future: F) -> Self
    where
        F: Future<Output = Result<RawResponse>> + Send + 'static,
    {
        Self {
            state: Mutex::new(State::Pending(future.boxed())),
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(*self.lock(), State::Pending(_))
    }

    /// Blocks until a pending response settles. The outcome is
    /// kept, so the future runs at most once. Errors and panics raised while
    /// waiting come back as the failure message.
    pub fn resolve(&self) -> std::result::Result<Arc<RawResponse>, String> {
        let mut state = self.lock();
        let current = std::mem::replace(&mut *state, State::Failed(String::new()));
        let next = match current {
            State::Pending(future) => wait(future),
            settled => settled,
        };
        let outcome = match &next {
            State::Ready(response) => Ok(Arc::clone(response)),
            State::Failed(message) => Err(message.clone()),
            State::Pending(_) => Err("response still pending".to_string()),
        };
        *state = next;
        outcome
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

type Outcome = std::thread::Result<Result<RawResponse>>;

fn wait(future: BoxFuture<'static, Result<RawResponse>>) -> State {
    match drive(future) {
        Ok(Ok(Ok(response))) => State::Ready(Arc::new(response)),
        Ok(Ok(Err(e))) => {
            warn!(error = %e, "deferred response failed");
            State::Failed(e.to_string())
        }
        Ok(Err(panic)) => {
            let message = panic_message(panic.as_ref());
            warn!(error = %message, "deferred response panicked");
            State::Failed(message)
        }
        Err(message) => {
            warn!(error = %message, "deferred response could not be driven");
            State::Failed(message)
        }
    }
}

// Futures may need a tokio timer or IO driver. Inside a multi-thread runtime
// the caller's worker is handed off while the runtime drives the future; a
// current-thread runtime cannot block on itself, so a helper thread runs it
// on a runtime of its own.
fn drive(future: BoxFuture<'static, Result<RawResponse>>) -> std::result::Result<Outcome, String> {
    let guarded = AssertUnwindSafe(future).catch_unwind();
    match Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == RuntimeFlavor::MultiThread => {
            Ok(tokio::task::block_in_place(|| handle.block_on(guarded)))
        }
        Ok(_) => std::thread::scope(|scope| {
            scope
                .spawn(move || on_own_runtime(guarded))
                .join()
                .unwrap_or_else(|panic| Err(panic_message(panic.as_ref())))
        }),
        Err(_) => on_own_runtime(guarded),
    }
}

fn on_own_runtime<F: Future>(future: F) -> std::result::Result<F::Output, String> {
    let runtime = Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(|e| format!("failed to start response runtime: {e}"))?;
    Ok(runtime.block_on(future))
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "response future panicked".to_string()
    }
}

impl fmt::Debug for DeferredResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.lock() {
            State::Pending(_) => f.write_str("DeferredResponse::Pending"),
            State::Ready(r) => f.debug_tuple("DeferredResponse::Ready").field(r).finish(),
            State::Failed(m) => f.debug_tuple("DeferredResponse::Failed").field(m).finish(),
        }
    }
}
