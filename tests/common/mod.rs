//! Recording detection SDK shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use spyglasses_gate::context::RequestContext;
use spyglasses_gate::{
    DetectionResult, DetectionSdk, EnvDefaults, Gate, GateConfig, SdkError, SdkOptions,
    SourceType, SyncResult,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// How `log_request` behaves.
#[derive(Debug, Clone, Copy)]
pub enum LogBehavior {
    Succeed,
    Fail,
    Hang,
    Delay(Duration),
}

pub struct MockSdk {
    has_key: bool,
    detection: Mutex<DetectionResult>,
    log_behavior: Mutex<LogBehavior>,
    sync_delay: Duration,
    sync_fails: bool,
    pub detect_calls: AtomicUsize,
    pub sync_calls: AtomicUsize,
    pub log_calls: AtomicUsize,
    pub logs_completed: AtomicUsize,
    pub logged: Mutex<Vec<(DetectionResult, RequestContext)>>,
    pub options: Mutex<Option<SdkOptions>>,
}

impl MockSdk {
    pub fn new(has_key: bool) -> Self {
        Self {
            has_key,
            detection: Mutex::new(DetectionResult::undetected()),
            log_behavior: Mutex::new(LogBehavior::Succeed),
            sync_delay: Duration::ZERO,
            sync_fails: false,
            detect_calls: AtomicUsize::new(0),
            sync_calls: AtomicUsize::new(0),
            log_calls: AtomicUsize::new(0),
            logs_completed: AtomicUsize::new(0),
            logged: Mutex::new(Vec::new()),
            options: Mutex::new(None),
        }
    }

    pub fn detecting(self, detection: DetectionResult) -> Self {
        *self.detection.lock().unwrap() = detection;
        self
    }

    pub fn logging(self, behavior: LogBehavior) -> Self {
        *self.log_behavior.lock().unwrap() = behavior;
        self
    }

    pub fn sync_delay(mut self, delay: Duration) -> Self {
        self.sync_delay = delay;
        self
    }

    pub fn failing_sync(mut self) -> Self {
        self.sync_fails = true;
        self
    }

    pub fn detect_count(&self) -> usize {
        self.detect_calls.load(Ordering::SeqCst)
    }

    pub fn sync_count(&self) -> usize {
        self.sync_calls.load(Ordering::SeqCst)
    }

    pub fn log_count(&self) -> usize {
        self.log_calls.load(Ordering::SeqCst)
    }

    pub fn completed_logs(&self) -> usize {
        self.logs_completed.load(Ordering::SeqCst)
    }

    pub fn last_context(&self) -> RequestContext {
        self.logged
            .lock()
            .unwrap()
            .last()
            .map(|(_, context)| context.clone())
            .expect("no visit was logged")
    }
}

#[async_trait]
impl DetectionSdk for MockSdk {
    fn has_api_key(&self) -> bool {
        self.has_key
    }

    async fn sync_patterns(&self) -> Result<SyncResult, SdkError> {
        self.sync_calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.sync_delay).await;
        if self.sync_fails {
            return Err(SdkError::Transport {
                details: "connection refused".to_string(),
            });
        }
        Ok(SyncResult {
            version: "1.0.0".to_string(),
            ..SyncResult::default()
        })
    }

    fn detect(&self, _user_agent: &str, _referrer: &str) -> DetectionResult {
        self.detect_calls.fetch_add(1, Ordering::SeqCst);
        self.detection.lock().unwrap().clone()
    }

    async fn log_request(
        &self,
        result: &DetectionResult,
        context: &RequestContext,
    ) -> Result<(), SdkError> {
        self.log_calls.fetch_add(1, Ordering::SeqCst);
        self.logged
            .lock()
            .unwrap()
            .push((result.clone(), context.clone()));

        let behavior = *self.log_behavior.lock().unwrap();
        let outcome = match behavior {
            LogBehavior::Succeed => Ok(()),
            LogBehavior::Fail => Err(SdkError::Status { code: 500 }),
            LogBehavior::Hang => std::future::pending().await,
            LogBehavior::Delay(delay) => {
                tokio::time::sleep(delay).await;
                Ok(())
            }
        };
        self.logs_completed.fetch_add(1, Ordering::SeqCst);
        outcome
    }
}

/// A bot detection result.
pub fn bot(should_block: bool) -> DetectionResult {
    DetectionResult {
        source_type: SourceType::Bot,
        is_bot: true,
        should_block,
        matched_pattern: Some("AITrainer".to_string()),
        info: None,
    }
}

/// Build a gate over `sdk` with no environment fallbacks.
pub fn gate_with(config: GateConfig, sdk: &Arc<MockSdk>) -> Gate {
    let sdk = sdk.clone();
    Gate::from_config_with_env(config, &EnvDefaults::default(), move |options| {
        *sdk.options.lock().unwrap() = Some(options.clone());
        sdk as Arc<dyn DetectionSdk>
    })
    .expect("valid gate config")
}
