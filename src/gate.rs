//! The request gate.
//!
//! One [`Gate`] wraps one detection SDK instance. It filters out asset and
//! framework paths, asks the SDK to classify the visitor, and reports or
//! blocks interesting traffic. Reporting is best-effort: it never changes a
//! decision and never holds a response longer than the configured timeout.

use crate::config::{EnvDefaults, GateConfig, GateSettings};
use crate::context::{
    GateRequest, RequestContext, RequestTarget, ResponseSink, normalize_headers,
};
use crate::decision::{
    ALLOWED_STATUS, BLOCKED_BODY, BLOCKED_CONTENT_TYPE, BLOCKED_STATUS, GateDecision,
};
use crate::error::{DeadlineElapsed, GateError, ReportError, SdkError};
use crate::exclusion::exclusion_reason;
use crate::pattern_sync::{PatternSync, SyncOutcome};
use crate::race::{Deadline, settle_within};
use crate::sdk::{DetectionResult, DetectionSdk, SdkOptions};
use http::header::{CONTENT_TYPE, HeaderValue};
use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

/// User-agent characters shown in debug output.
const USER_AGENT_PREVIEW_CHARS: usize = 100;

/// Bot and AI-crawler gate for inbound HTTP requests.
///
/// Cheap to clone; clones share the SDK, the pattern-sync guard and the
/// background task tracker.
#[derive(Clone)]
pub struct Gate {
    inner: Arc<GateInner>,
}

struct GateInner {
    sdk: Arc<dyn DetectionSdk>,
    settings: GateSettings,
    sync: PatternSync,
    tracker: TaskTracker,
}

impl Gate {
    /// Resolve `config` against the process environment, build the SDK with
    /// `make_sdk`, and start the gate.
    pub fn from_config<F>(config: GateConfig, make_sdk: F) -> Result<Self, GateError>
    where
        F: FnOnce(&SdkOptions) -> Arc<dyn DetectionSdk>,
    {
        Self::from_config_with_env(config, &EnvDefaults::from_process(), make_sdk)
    }

    /// Like [`Gate::from_config`], with explicit environment fallbacks.
    pub fn from_config_with_env<F>(
        config: GateConfig,
        env: &EnvDefaults,
        make_sdk: F,
    ) -> Result<Self, GateError>
    where
        F: FnOnce(&SdkOptions) -> Arc<dyn DetectionSdk>,
    {
        let settings = config.resolve(env)?;
        let sdk = make_sdk(&settings.sdk_options());
        Ok(Self::new(settings, sdk))
    }

    /// Start a gate over an already-built SDK.
    ///
    /// If the SDK has an API key, a pattern sync is started in the background
    /// when a tokio runtime is available. Construction never waits for it.
    pub fn new(settings: GateSettings, sdk: Arc<dyn DetectionSdk>) -> Self {
        let tracker = TaskTracker::new();
        let sync = PatternSync::new(sdk.clone(), tracker.clone(), settings.debug);
        let has_api_key = sdk.has_api_key();

        info!(
            platform = %settings.platform_type,
            api_key = has_api_key,
            exclude_rules = settings.exclude_paths.len(),
            blocking_timeout = ?settings.logging.blocking_timeout.duration(),
            "Spyglasses gate initialized"
        );

        let gate = Self {
            inner: Arc::new(GateInner {
                sdk,
                settings,
                sync,
                tracker,
            }),
        };

        if has_api_key {
            gate.spawn_initial_sync();
        }
        gate
    }

    fn spawn_initial_sync(&self) {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let gate = self.clone();
                self.inner.tracker.spawn_on(
                    async move {
                        gate.sync_patterns().await;
                    },
                    &handle,
                );
            }
            Err(_) => {
                if self.inner.settings.debug {
                    warn!("No tokio runtime at construction, initial pattern sync skipped");
                }
            }
        }
    }

    /// Resolved configuration.
    pub fn settings(&self) -> &GateSettings {
        &self.inner.settings
    }

    /// Whether the SDK has an API key.
    pub fn has_api_key(&self) -> bool {
        self.inner.sdk.has_api_key()
    }

    /// Synchronize detection patterns (single-flight).
    pub async fn sync_patterns(&self) -> SyncOutcome {
        self.inner.sync.run().await
    }

    /// Number of background tasks (sync, visit reports) still running.
    pub fn pending_reports(&self) -> usize {
        self.inner.tracker.len()
    }

    /// Stop accepting new background work as part of shutdown and wait for
    /// outstanding work, up to `deadline`.
    pub async fn drain(&self, deadline: Deadline) -> Result<(), DeadlineElapsed> {
        self.inner.tracker.close();
        settle_within(self.inner.tracker.wait(), deadline).await
    }

    /// Host hook: run the gate and, if the visitor is blocked, mark `response`
    /// as 403 `text/plain` and return the body to send.
    ///
    /// `None` means the host should continue with normal handling.
    pub async fn handle<R>(
        &self,
        request: &GateRequest,
        response: &mut R,
    ) -> Option<&'static str>
    where
        R: ResponseSink + ?Sized,
    {
        if self.process(request).await.is_pass_through() {
            return None;
        }

        response.set_status(BLOCKED_STATUS);
        response.set_header(CONTENT_TYPE, HeaderValue::from_static(BLOCKED_CONTENT_TYPE));
        Some(BLOCKED_BODY)
    }

    /// Run the gate for `request` without touching a response.
    ///
    /// For blocked visitors this returns after the blocked-visit report has
    /// settled (or timed out), unless `await_blocked_logging` is off.
    pub async fn process(&self, request: &GateRequest) -> GateDecision {
        let inner = &*self.inner;
        let debug = inner.settings.debug;
        let target = RequestTarget::parse(request.url());

        if let Some(reason) = exclusion_reason(&target.path, &inner.settings.exclude_paths) {
            if debug {
                debug!(path = %target.path, %reason, "Excluding path");
            }
            return GateDecision::Excluded;
        }

        let headers = normalize_headers(request.headers());
        let user_agent = first_header(&headers, &["user-agent"]);
        let referrer = first_header(&headers, &["referer", "referrer"]);

        if debug {
            debug!(
                path = %target.path,
                user_agent = %preview(&user_agent),
                referrer = %referrer,
                "Processing request"
            );
        }

        let detection = inner.sdk.detect(&user_agent, &referrer);
        if detection.source_type.is_none() {
            return GateDecision::Undetected;
        }

        if debug {
            debug!(
                source_type = %detection.source_type,
                is_bot = detection.is_bot,
                should_block = detection.should_block,
                matched_pattern = ?detection.matched_pattern,
                info = ?detection.info,
                "Detection result"
            );
        }

        if !inner.sdk.has_api_key() {
            return GateDecision::Unreported;
        }

        let ip = first_header(&headers, &["x-forwarded-for"]);
        let context = RequestContext {
            url: target.url,
            method: request.method().to_string(),
            path: target.path,
            query: target.query,
            user_agent,
            referrer,
            ip,
            headers,
            response_status: ALLOWED_STATUS.as_u16(),
        };

        if detection.should_block {
            if debug {
                debug!(
                    source_type = %detection.source_type,
                    matched_pattern = ?detection.matched_pattern,
                    "Blocking visitor"
                );
            }
            let context = RequestContext {
                response_status: BLOCKED_STATUS.as_u16(),
                ..context
            };
            self.report_blocked(detection, context).await;
            return GateDecision::Blocked;
        }

        self.report_visit(detection, context);
        GateDecision::Reported
    }

    /// Report a blocked visit, bounded by the blocking timeout.
    async fn report_blocked(&self, detection: DetectionResult, context: RequestContext) {
        let policy = self.inner.settings.logging;
        let debug = self.inner.settings.debug;
        let report = self.spawn_report(detection, context);

        let attempt = async move {
            if let Err(err) = await_report(report, policy.blocking_timeout).await {
                if debug {
                    warn!(error = %err, "Error logging blocked visit");
                }
            }
        };

        if policy.await_blocked_logging {
            attempt.await;
        } else {
            self.inner.tracker.spawn(attempt);
        }
    }

    /// Report an allowed visit without waiting for it.
    fn report_visit(&self, detection: DetectionResult, context: RequestContext) {
        let sdk = self.inner.sdk.clone();
        let debug = self.inner.settings.debug;

        self.inner.tracker.spawn(async move {
            if let Err(err) = sdk.log_request(&detection, &context).await {
                if debug {
                    warn!(error = %err, "Error logging visit");
                }
            }
        });
    }

    /// Run the log call as its own task so a timed-out race leaves it running.
    fn spawn_report(
        &self,
        detection: DetectionResult,
        context: RequestContext,
    ) -> JoinHandle<Result<(), SdkError>> {
        let sdk = self.inner.sdk.clone();
        self.inner
            .tracker
            .spawn(async move { sdk.log_request(&detection, &context).await })
    }
}

impl fmt::Debug for Gate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gate")
            .field("settings", &self.inner.settings)
            .field("pending_reports", &self.pending_reports())
            .finish()
    }
}

async fn await_report(
    report: JoinHandle<Result<(), SdkError>>,
    deadline: Deadline,
) -> Result<(), ReportError> {
    let joined = settle_within(report, deadline).await?;
    joined??;
    Ok(())
}

/// First non-empty value among `names`, or an empty string.
fn first_header(headers: &BTreeMap<String, String>, names: &[&str]) -> String {
    names
        .iter()
        .filter_map(|name| headers.get(*name))
        .find(|value| !value.is_empty())
        .cloned()
        .unwrap_or_default()
}

fn preview(user_agent: &str) -> Cow<'_, str> {
    match user_agent.char_indices().nth(USER_AGENT_PREVIEW_CHARS) {
        Some((cut, _)) => Cow::Owned(format!("{}...", &user_agent[..cut])),
        None => Cow::Borrowed(user_agent),
    }
}
