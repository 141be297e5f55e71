//! Scoped unit-of-work acquisition.
//!
//! # Invariants
//! - A guarded session is closed on every exit path, unwinding included.
//! - An active transaction is rolled back before the session closes.
//! - Closing twice is a no-op.

use crate::db::DbResult;
use crate::engine::Session;
use log::{error, warn};
use std::ops::{Deref, DerefMut};

/// Session guard returned by repository `session()` calls.
pub struct ScopedSession<S: Session> {
    inner: S,
}

impl<S: Session> ScopedSession<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    /// Closes the session, rolling back any transaction left open.
    pub fn close(&mut self) -> DbResult<()> {
        if self.inner.is_transaction_active() {
            warn!("event=session_release module=repo status=rollback reason=transaction_left_open");
            if let Err(err) = self.inner.rollback() {
                error!(
                    "event=session_release module=repo status=error error_code=rollback_failed error={}",
                    err
                );
            }
        }
        self.inner.close()
    }

    /// Closes the session and logs instead of returning close failures.
    pub fn release(mut self) {
        if let Err(err) = self.close() {
            error!(
                "event=session_release module=repo status=error error_code=close_failed error={}",
                err
            );
        }
    }
}

impl<S: Session> Deref for ScopedSession<S> {
    type Target = S;

    fn deref(&self) -> &S {
        &self.inner
    }
}

impl<S: Session> DerefMut for ScopedSession<S> {
    fn deref_mut(&mut self) -> &mut S {
        &mut self.inner
    }
}

impl<S: Session> Drop for ScopedSession<S> {
    fn drop(&mut self) {
        if !self.inner.is_open() {
            return;
        }
        if let Err(err) = self.close() {
            error!(
                "event=session_release module=repo status=error error_code=close_failed error={}",
                err
            );
        }
    }
}
