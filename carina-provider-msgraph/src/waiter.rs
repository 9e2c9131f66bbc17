//! Waiting for eventually consistent deletes to converge
//!
//! Graph acknowledges a DELETE before every replica has dropped the entity,
//! so a read right after deletion can still find it. The waiter polls an
//! existence probe until the entity is confirmed absent or the deadline
//! passes. There is no completion event to subscribe to.

use std::future::Future;
use std::time::Duration;

use log::debug;
use tokio::time::Instant;

/// Errors that can signal "the entity does not exist"
pub trait NotFound {
    fn is_not_found(&self) -> bool;
}

/// Why waiting for deletion failed
#[derive(Debug, thiserror::Error)]
pub enum WaitError<E: std::error::Error + 'static> {
    /// The entity was still observed when the deadline passed
    #[error("timed out after {polls} polls ({elapsed:?}); the resource may still exist")]
    Timeout { polls: u32, elapsed: Duration },

    /// The probe failed with something other than "not found"
    #[error("probing for existence: {0}")]
    Probe(#[source] E),
}

impl<E: std::error::Error + 'static> WaitError<E> {
    pub fn is_timeout(&self) -> bool {
        matches!(self, WaitError::Timeout { .. })
    }
}

/// Poll `probe` every `interval` until it reports the entity gone
///
/// The probe returns `Ok(true)` while the entity is still present and
/// `Ok(false)` once it is absent. A probe error whose [`NotFound::is_not_found`]
/// is true counts as absent. Returns the number of polls performed.
///
/// The first poll happens immediately. Sleeps are cut short at `deadline`,
/// and a probe still in flight at the deadline is abandoned.
pub async fn wait_for_deletion<F, Fut, E>(
    deadline: Instant,
    interval: Duration,
    mut probe: F,
) -> Result<u32, WaitError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool, E>>,
    E: NotFound + std::error::Error + 'static,
{
    let started = Instant::now();
    let mut polls = 0u32;

    loop {
        if Instant::now() >= deadline {
            return Err(WaitError::Timeout {
                polls,
                elapsed: started.elapsed(),
            });
        }

        polls += 1;
        let outcome = match tokio::time::timeout_at(deadline, probe()).await {
            Ok(outcome) => outcome,
            Err(_) => {
                return Err(WaitError::Timeout {
                    polls,
                    elapsed: started.elapsed(),
                });
            }
        };

        match outcome {
            Ok(false) => {
                debug!("resource confirmed absent after {} polls", polls);
                return Ok(polls);
            }
            Err(e) if e.is_not_found() => {
                debug!("resource reported not found after {} polls", polls);
                return Ok(polls);
            }
            Err(e) => return Err(WaitError::Probe(e)),
            Ok(true) => {
                debug!("resource still present (poll {}), waiting {:?}", polls, interval);
            }
        }

        tokio::time::sleep_until((Instant::now() + interval).min(deadline)).await;
    }
}
