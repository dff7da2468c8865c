//! Capability interface of the detection SDK.
//!
//! The gate never classifies traffic or talks to the collector itself. It
//! drives an implementation of [`DetectionSdk`], which owns the bot signature
//! database, the scoring, and the HTTP client for the Spyglasses services.

use crate::context::RequestContext;
use crate::error::SdkError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use url::Url;

/// Classifier tag attached to a detection result.
///
/// Anything other than [`SourceType::None`] is "interesting" traffic that the
/// gate reports (and possibly blocks).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SourceType {
    /// Nothing matched.
    #[default]
    None,
    /// A bot user-agent pattern matched.
    Bot,
    /// The referrer is a known AI assistant.
    AiReferrer,
    /// Any other tag the SDK emits.
    Other(String),
}

impl SourceType {
    /// Returns `true` if nothing was detected.
    pub fn is_none(&self) -> bool {
        matches!(self, SourceType::None)
    }

    /// Wire representation of the tag.
    pub fn as_str(&self) -> &str {
        match self {
            SourceType::None => "none",
            SourceType::Bot => "bot",
            SourceType::AiReferrer => "ai_referrer",
            SourceType::Other(tag) => tag,
        }
    }
}

impl From<String> for SourceType {
    fn from(tag: String) -> Self {
        match tag.as_str() {
            "none" => SourceType::None,
            "bot" => SourceType::Bot,
            "ai_referrer" => SourceType::AiReferrer,
            _ => SourceType::Other(tag),
        }
    }
}

impl From<SourceType> for String {
    fn from(source: SourceType) -> Self {
        source.as_str().to_string()
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of classifying one request.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionResult {
    /// Classifier tag
    pub source_type: SourceType,
    /// Whether the visitor is an automated agent
    pub is_bot: bool,
    /// Whether the property settings say to deny this visitor
    pub should_block: bool,
    /// The pattern that matched, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_pattern: Option<String>,
    /// SDK-specific details about the match
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<serde_json::Value>,
}

impl DetectionResult {
    /// A result for traffic that matched nothing.
    pub fn undetected() -> Self {
        Self::default()
    }
}

/// Per-property blocking rules delivered with the pattern set.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PropertySettings {
    pub block_ai_model_trainers: bool,
    pub custom_blocks: Vec<String>,
    pub custom_allows: Vec<String>,
}

/// Summary of a successful pattern synchronization.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SyncResult {
    /// Version of the pattern set now loaded
    pub version: String,
    /// Bot patterns received
    pub patterns: Vec<serde_json::Value>,
    /// AI referrers received
    pub ai_referrers: Vec<serde_json::Value>,
    /// Property-level block/allow settings
    pub property_settings: PropertySettings,
}

/// Options the gate resolves and hands to the SDK constructor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SdkOptions {
    pub api_key: Option<String>,
    pub debug: bool,
    pub collect_endpoint: Url,
    pub patterns_endpoint: Url,
    pub platform_type: String,
}

/// The detection SDK as seen by the gate.
///
/// `detect` sits on the request hot path and must neither block on I/O nor
/// suspend. The two async methods perform network calls and may fail; the gate
/// treats both as best-effort.
#[async_trait]
pub trait DetectionSdk: Send + Sync + 'static {
    /// Whether an API key is configured.
    fn has_api_key(&self) -> bool;

    /// Refresh the pattern set from the patterns endpoint.
    async fn sync_patterns(&self) -> Result<SyncResult, SdkError>;

    /// Classify a visitor.
    fn detect(&self, user_agent: &str, referrer: &str) -> DetectionResult;

    /// Report a visit to the collector.
    async fn log_request(
        &self,
        result: &DetectionResult,
        context: &RequestContext,
    ) -> Result<(), SdkError>;
}
