//! Single-flight pattern synchronization.
//!
//! At most one `sync_patterns` call is outstanding per gate. Callers that
//! arrive while a run is in flight await that run instead of starting another.

use crate::error::SdkError;
use crate::sdk::{DetectionSdk, SyncResult};
use futures_util::FutureExt;
use futures_util::future::{BoxFuture, Shared};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::task::TaskTracker;
use tracing::{debug, warn};

type SharedSync = Shared<BoxFuture<'static, Result<SyncResult, SdkError>>>;

// ============================================================================
// Sync outcome
// ============================================================================

/// What a call to [`PatternSync::run`] did.
#[derive(Debug, Clone, PartialEq)]
pub enum SyncOutcome {
    /// This call started a run and it succeeded.
    Synced(SyncResult),
    /// This call started a run and it failed; the SDK keeps its current patterns.
    Failed(SdkError),
    /// A run was already in flight; this call waited for it.
    Joined,
    /// No API key, nothing to sync.
    Skipped,
}

// ============================================================================
// Pattern sync
// ============================================================================

/// Pattern sync guard owned by one gate.
///
/// The in-flight slot is set under the lock before the lock is released, so
/// concurrent callers either start the run or join it. The run itself is a
/// spawned task that clears the slot when it finishes, whether it succeeded
/// or failed, and independently of whether any caller is still waiting.
pub struct PatternSync {
    sdk: Arc<dyn DetectionSdk>,
    in_flight: Arc<Mutex<Option<SharedSync>>>,
    tracker: TaskTracker,
    debug: bool,
}

impl PatternSync {
    pub fn new(sdk: Arc<dyn DetectionSdk>, tracker: TaskTracker, debug: bool) -> Self {
        Self {
            sdk,
            in_flight: Arc::new(Mutex::new(None)),
            tracker,
            debug,
        }
    }

    /// Synchronize patterns, or wait for the synchronization already running.
    ///
    /// Never fails: errors are reported in debug mode and otherwise dropped.
    pub async fn run(&self) -> SyncOutcome {
        let shared = {
            let mut slot = self.in_flight.lock().await;

            if let Some(existing) = slot.as_ref().cloned() {
                drop(slot);
                if self.debug {
                    debug!("Pattern sync already in progress, waiting");
                }
                let _ = existing.await;
                return SyncOutcome::Joined;
            }

            if !self.sdk.has_api_key() {
                if self.debug {
                    warn!("No API key provided, using default patterns only");
                }
                return SyncOutcome::Skipped;
            }

            if self.debug {
                debug!("Starting pattern sync");
            }
            let shared = self.start();
            *slot = Some(shared.clone());
            shared
        };

        match shared.await {
            Ok(result) => {
                if self.debug {
                    debug!(
                        version = %result.version,
                        patterns = result.patterns.len(),
                        ai_referrers = result.ai_referrers.len(),
                        "Pattern sync complete"
                    );
                }
                SyncOutcome::Synced(result)
            }
            Err(err) => {
                if self.debug {
                    warn!(error = %err, "Pattern sync failed, using defaults");
                }
                SyncOutcome::Failed(err)
            }
        }
    }

    /// Returns `true` while a run is outstanding.
    pub async fn is_in_flight(&self) -> bool {
        self.in_flight.lock().await.is_some()
    }

    /// Spawn the network call. Must be called with the slot lock held.
    fn start(&self) -> SharedSync {
        let sdk = self.sdk.clone();
        let slot = self.in_flight.clone();

        let handle = self.tracker.spawn(async move {
            let result = sdk.sync_patterns().await;
            slot.lock().await.take();
            result
        });

        handle
            .map(|joined| {
                joined.unwrap_or_else(|err| {
                    Err(SdkError::Aborted {
                        details: err.to_string(),
                    })
                })
            })
            .boxed()
            .shared()
    }
}

// ============================================================================
// Tests
// ============================================================================
