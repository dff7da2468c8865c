//! Race combinators for bounding how long the gate waits on telemetry.
//!
//! The loser of a race is dropped, never actively cancelled. Callers that
//! need the losing work to keep running spawn it first and race the
//! `JoinHandle`; dropping a handle detaches the task.

use crate::error::DeadlineElapsed;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// How long to wait for an operation.
///
/// `Unbounded` installs no timer at all, which is distinct from
/// `After(Duration::ZERO)`: the latter still races and only lets the
/// operation win if it is ready on its first poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deadline {
    /// Wait indefinitely.
    Unbounded,
    /// Give up after this long.
    After(Duration),
}

impl Deadline {
    /// Millisecond form used by configuration: `None` and `0` mean unbounded.
    pub fn from_millis(ms: Option<u64>) -> Self {
        match ms {
            None | Some(0) => Deadline::Unbounded,
            Some(ms) => Deadline::After(Duration::from_millis(ms)),
        }
    }

    /// The timer duration, if any.
    pub fn duration(&self) -> Option<Duration> {
        match self {
            Deadline::Unbounded => None,
            Deadline::After(after) => Some(*after),
        }
    }
}

/// Which side of a [`race`] settled first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Race<A, B> {
    First(A),
    Second(B),
}

/// Poll both futures and return whichever completes first.
///
/// `first` is polled before `second` on every wake-up, so a tie goes to
/// `first`.
pub async fn race<A, B>(first: A, second: B) -> Race<A::Output, B::Output>
where
    A: Future,
    B: Future,
{
    tokio::select! {
        biased;
        a = first => Race::First(a),
        b = second => Race::Second(b),
    }
}

/// Await `operation`, giving up once `deadline` passes.
pub async fn settle_within<F>(
    operation: F,
    deadline: Deadline,
) -> Result<F::Output, DeadlineElapsed>
where
    F: Future,
{
    match deadline {
        Deadline::Unbounded => Ok(operation.await),
        Deadline::After(after) => match race(operation, sleep(after)).await {
            Race::First(output) => Ok(output),
            Race::Second(()) => Err(DeadlineElapsed { after }),
        },
    }
}
