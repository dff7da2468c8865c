//! Spyglasses request gate - bot and AI-crawler detection for HTTP servers.
//!
//! This library adapts a Spyglasses detection SDK into a per-request hook.
//! For every request the gate skips static and framework paths, classifies
//! the visitor, blocks it when the property rules say so, and reports the
//! visit to the collector without holding normal traffic on network calls.
//!
//! # Request Paths
//!
//! - **Excluded:** assets, `/_nuxt/`, `/__nuxt`, `/api/` and custom rules.
//! - **Quiet:** nothing detected, or no API key. No I/O at all.
//! - **Reported:** detected and allowed; the visit is logged in the background.
//! - **Blocked:** 403 `Access Denied`, after a bounded wait on the report.
//!
//! # Example
//!
//! ```ignore
//! use spyglasses_gate::{Gate, GateConfig, GateLayer};
//!
//! let gate = Gate::from_config(GateConfig::with_api_key("key"), |options| {
//!     Arc::new(MySdk::new(options))
//! })?;
//! let app = Router::new().route("/", get(index)).layer(GateLayer::new(gate));
//! ```

pub mod config;
pub mod context;
pub mod decision;
pub mod error;
pub mod exclusion;
pub mod gate;
pub mod layer;
pub mod pattern_sync;
pub mod race;
pub mod sdk;

pub use config::{EnvDefaults, GateConfig, GateSettings, LoggingConfig, LoggingPolicy};
pub use context::{GateRequest, RequestContext, ResponseSink};
pub use decision::{BLOCKED_BODY, GateDecision};
pub use error::{GateError, SdkError};
pub use exclusion::{ExcludeRule, should_exclude_path};
pub use gate::Gate;
pub use layer::{GateBody, GateLayer, GateService};
pub use pattern_sync::SyncOutcome;
pub use race::Deadline;
pub use sdk::{DetectionResult, DetectionSdk, SdkOptions, SourceType, SyncResult};
