//! Scripted providers for orchestrator tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use advocate_runtime::providers::{
    ChatMessage, CompletionConfig, CompletionResponse, TokenUsage,
};
use advocate_runtime::{
    LlmProvider, Orchestrator, ProviderError, ProviderFactory, ProviderRegistry, RuntimeConfig,
};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value as JsonValue;

pub const QUESTIONS_JSON: &str = r#"{"questions":[
    {"text":"What could be causing my fatigue?","category":"Diagnosis","priority":"high"},
    {"text":"Should my thyroid be checked?","category":"Testing","priority":"medium"}
]}"#;

pub const TALKING_POINTS_JSON: &str = r#"{"talkingPoints":[
    {"point":"I have had this for three months.","category":"Symptom Documentation",
     "context":"Establishes duration","whenToUse":"At the start"}
]}"#;

pub const ANALYSIS_JSON: &str = r#"{"concerns":["Elevated BP"],"missing":["Follow-up date"],
    "recommendations":["Ask about recheck"],"summary":"Blood pressure was high."}"#;

/// One scripted reaction to a call.
#[derive(Debug, Clone)]
pub enum Step {
    Reply(&'static str),
    Fail { status: u16, message: &'static str },
    RateLimited,
    Hang,
}

/// A provider that follows a script, then repeats its fallback step.
pub struct ScriptedProvider {
    name: &'static str,
    script: Mutex<VecDeque<Step>>,
    fallback: Step,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn new(name: &'static str, fallback: Step) -> Arc<Self> {
        Arc::new(Self {
            name,
            script: Mutex::new(VecDeque::new()),
            fallback,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn then(self: &Arc<Self>, step: Step) -> Arc<Self> {
        self.script.lock().push_back(step);
        Arc::clone(self)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    async fn complete(
        &self,
        _messages: Vec<ChatMessage>,
        config: &CompletionConfig,
    ) -> Result<CompletionResponse, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let step = self
            .script
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());

        match step {
            Step::Reply(body) => Ok(CompletionResponse {
                content: body.to_string(),
                usage: TokenUsage::default(),
                model: config.model.clone(),
            }),
            Step::Fail { status, message } => Err(ProviderError::ApiError {
                status,
                message: message.to_string(),
            }),
            Step::RateLimited => Err(ProviderError::RateLimited { retry_after: None }),
            Step::Hang => std::future::pending().await,
        }
    }

    fn name(&self) -> &str {
        self.name
    }
}

/// Factory handing out a shared scripted provider.
pub struct ScriptedFactory {
    kind: &'static str,
    provider: Arc<ScriptedProvider>,
    configured: bool,
    broken: bool,
    creations: Arc<AtomicUsize>,
}

impl ScriptedFactory {
    pub fn new(kind: &'static str, provider: Arc<ScriptedProvider>) -> Self {
        Self {
            kind,
            provider,
            configured: true,
            broken: false,
            creations: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// No credentials present.
    pub fn unconfigured(mut self) -> Self {
        self.configured = false;
        self
    }

    /// Credentials present but construction fails.
    pub fn broken(mut self) -> Self {
        self.broken = true;
        self
    }

    pub fn creations(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.creations)
    }
}

impl ProviderFactory for ScriptedFactory {
    fn provider_type(&self) -> &'static str {
        self.kind
    }

    fn is_configured(&self, _config: &JsonValue) -> bool {
        self.configured
    }

    fn create(&self, _config: &JsonValue) -> Result<Arc<dyn LlmProvider>, ProviderError> {
        self.creations.fetch_add(1, Ordering::SeqCst);
        if self.broken {
            return Err(ProviderError::NotConfigured("client library missing".to_string()));
        }
        Ok(self.provider.clone())
    }
}

pub fn orchestrator(factories: Vec<ScriptedFactory>) -> Orchestrator {
    orchestrator_with(RuntimeConfig::default(), factories)
}

pub fn orchestrator_with(config: RuntimeConfig, factories: Vec<ScriptedFactory>) -> Orchestrator {
    let mut registry = ProviderRegistry::new();
    for factory in factories {
        registry.register(Arc::new(factory));
    }
    Orchestrator::new(config, registry)
}
