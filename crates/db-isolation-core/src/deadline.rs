// crates/db-isolation-core/src/deadline.rs
// ============================================================================
// Module: Deadlines
// Description: Caller-supplied deadlines and cooperative cancellation.
// Purpose: Bound every blocking isolation operation in time.
// Dependencies: std
// ============================================================================

//! ## Overview
//! A [`Deadline`] combines an optional expiry instant with an optional
//! [`CancelToken`]. Operations tighten the caller's deadline with their own
//! policy timeout and check it between blocking steps.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::time::Duration;
use std::time::Instant;

use thiserror::Error;

// ============================================================================
// SECTION: Cancellation
// ============================================================================

/// Shared cancellation flag.
///
/// # Invariants
/// - Once cancelled, a token stays cancelled; clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    /// Cancellation flag shared across clones.
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    /// Creates a token that is not cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Signals cancellation to every holder of this token.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    /// Returns true once [`CancelToken::cancel`] has been called.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

// ============================================================================
// SECTION: Deadline
// ============================================================================

/// Reason a deadline check failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DeadlineError {
    /// The expiry instant has passed.
    #[error("deadline exceeded")]
    Expired,
    /// The caller cancelled the operation.
    #[error("operation cancelled")]
    Cancelled,
}

/// Expiry instant plus optional cancellation signal.
#[derive(Debug, Clone, Default)]
pub struct Deadline {
    /// Instant after which the deadline is expired.
    expires_at: Option<Instant>,
    /// Cancellation signal from the caller.
    cancel: Option<CancelToken>,
}

impl Deadline {
    /// Returns a deadline that never expires and cannot be cancelled.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Returns a deadline expiring `timeout` from now.
    #[must_use]
    pub fn after(timeout: Duration) -> Self {
        Self {
            expires_at: Instant::now().checked_add(timeout),
            cancel: None,
        }
    }

    /// Attaches a cancellation token.
    #[must_use]
    pub fn with_cancel(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Returns the earlier of this deadline and `now + limit`, keeping cancellation.
    #[must_use]
    pub fn tighten(&self, limit: Duration) -> Self {
        let candidate = Instant::now().checked_add(limit);
        let expires_at = match (self.expires_at, candidate) {
            (Some(current), Some(candidate)) => Some(current.min(candidate)),
            (Some(current), None) => Some(current),
            (None, candidate) => candidate,
        };
        Self {
            expires_at,
            cancel: self.cancel.clone(),
        }
    }

    /// Returns the time left before expiry, or `None` when unbounded.
    ///
    /// An expired deadline reports [`Duration::ZERO`].
    #[must_use]
    pub fn remaining(&self) -> Option<Duration> {
        self.expires_at.map(|at| at.saturating_duration_since(Instant::now()))
    }

    /// Returns true when the caller cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(CancelToken::is_cancelled)
    }

    /// Fails when cancelled or expired.
    ///
    /// # Errors
    ///
    /// Returns [`DeadlineError`] describing why the operation must stop.
    pub fn check(&self) -> Result<(), DeadlineError> {
        if self.is_cancelled() {
            return Err(DeadlineError::Cancelled);
        }
        if let Some(at) = self.expires_at
            && Instant::now() >= at
        {
            return Err(DeadlineError::Expired);
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Tests
// ============================================================================
