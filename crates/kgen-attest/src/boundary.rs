//! Store calls with an optional deadline.

use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use kgen_store::{AttestationStore, StoreError};
use tracing::warn;

use crate::error::AttestError;

/// Runs `call` against `store`, giving up after `timeout`.
///
/// A call that misses its deadline keeps running on its own thread; its
/// result is discarded. Puts are insert-if-absent, so a late write is safe to
/// retry.
pub(crate) fn call_store<T, F>(
    store: &Arc<dyn AttestationStore>,
    timeout: Option<Duration>,
    operation: &'static str,
    call: F,
) -> Result<T, AttestError>
where
    T: Send + 'static,
    F: FnOnce(&dyn AttestationStore) -> Result<T, StoreError> + Send + 'static,
{
    let Some(after) = timeout else {
        return call(store.as_ref()).map_err(AttestError::from);
    };

    let (tx, rx) = mpsc::channel();
    let store = Arc::clone(store);
    thread::spawn(move || {
        let _ = tx.send(call(store.as_ref()));
    });
    match rx.recv_timeout(after) {
        Ok(result) => result.map_err(AttestError::from),
        Err(mpsc::RecvTimeoutError::Timeout) => {
            warn!(operation, ?after, "store call timed out");
            Err(AttestError::Timeout { operation, after })
        }
        Err(mpsc::RecvTimeoutError::Disconnected) => Err(AttestError::Store(StoreError::Other(
            format!("{} worker exited without a result", operation),
        ))),
    }
}
