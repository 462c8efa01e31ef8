//! Cancellation and deadlines for a single operation call.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::errors::{SccError, SccResult};

/// Cancellation context passed to every `*_with_context` operation.
///
/// A context combines an explicit [`CancellationToken`] with an optional
/// deadline. Cloning shares the token, so cancelling a clone cancels the
/// original.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    token: CancellationToken,
    deadline: Option<Instant>,
}

impl RequestContext {
    /// A context that is never cancelled and has no deadline.
    pub fn background() -> Self {
        Self::default()
    }

    /// A context whose deadline is `timeout` from now.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::with_deadline(Instant::now() + timeout)
    }

    /// A context that expires at `deadline`.
    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            token: CancellationToken::new(),
            deadline: Some(deadline),
        }
    }

    /// Wraps an existing token.
    pub fn with_token(token: CancellationToken) -> Self {
        Self {
            token,
            deadline: None,
        }
    }

    /// Returns a copy of this context with a deadline, keeping the earlier one.
    #[must_use]
    pub fn and_timeout(&self, timeout: Duration) -> Self {
        let candidate = Instant::now() + timeout;
        let deadline = match self.deadline {
            Some(existing) if existing < candidate => existing,
            _ => candidate,
        };
        Self {
            token: self.token.clone(),
            deadline: Some(deadline),
        }
    }

    /// Cancels the context.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Returns the cancellation token.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Returns the deadline, if any.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Time left before the deadline; `None` when there is no deadline.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline
            .map(|d| d.saturating_duration_since(Instant::now()))
    }

    /// Fails if the context is already cancelled or past its deadline.
    pub fn check(&self, stage: &str) -> SccResult<()> {
        if self.token.is_cancelled() {
            return Err(cancelled(stage));
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return Err(deadline_exceeded(stage));
            }
        }
        Ok(())
    }

    /// Runs `future` until it completes or the context ends, whichever is first.
    pub async fn run<F, T>(&self, stage: &str, future: F) -> SccResult<T>
    where
        F: Future<Output = T>,
    {
        self.check(stage)?;

        let expiry = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            biased;
            () = self.token.cancelled() => Err(cancelled(stage)),
            () = expiry => Err(deadline_exceeded(stage)),
            output = future => Ok(output),
        }
    }

    /// Sleeps for `duration` unless the context ends first.
    pub async fn sleep(&self, duration: Duration) -> SccResult<()> {
        self.run("waiting to retry", tokio::time::sleep(duration))
            .await
    }
}

fn cancelled(stage: &str) -> SccError {
    SccError::Cancelled {
        message: format!("cancelled while {stage}"),
    }
}

fn deadline_exceeded(stage: &str) -> SccError {
    SccError::Deadline {
        message: format!("context deadline elapsed while {stage}"),
    }
}
