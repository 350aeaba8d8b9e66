use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde::Serialize;
use serde_json::Value;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::Instrument;

use crate::config::{ApologyConfig, Config, Mode};
use crate::relay::backend::{BackendError, GenerationParams, TextGenerator};
use crate::relay::{
    NormalizationPolicy, PromptEnvelope, PromptTemplate, Question, QuestionValidator,
    ValidationError,
};

#[derive(Debug, Clone, Serialize)]
pub struct NormalizedResponse {
    pub response: String,
    pub query: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("Generation backend returned an empty answer")]
    EmptyResponse,
    #[error("Unexpected failure: {0}")]
    Unexpected(String),
}

impl PipelineError {
    /// Message of the innermost error, without the wrapping context.
    pub fn detail(&self) -> String {
        match self {
            PipelineError::Backend(BackendError::Transport(e)) => e.to_string(),
            PipelineError::Unexpected(message) => message.clone(),
            other => other.to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Backend,
    EmptyResponse,
    Unexpected,
}

/// Failure as shown to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResult {
    #[serde(skip)]
    pub kind: ErrorKind,
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub example: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// Validate, prompt, generate, normalize. Built once at startup and shared.
pub struct QueryPipeline {
    validator: QuestionValidator,
    template: PromptTemplate,
    params: GenerationParams,
    policy: NormalizationPolicy,
    deadline: Option<Duration>,
    mode: Mode,
    apology: ApologyConfig,
    backend: Arc<dyn TextGenerator>,
}

impl QueryPipeline {
    pub fn new(config: &Config, backend: Arc<dyn TextGenerator>) -> Self {
        Self {
            validator: QuestionValidator::new(
                config.pipeline.field_aliases.clone(),
                config.pipeline.min_question_chars,
            ),
            template: PromptTemplate::new(&config.prompt),
            params: GenerationParams::from(&config.llm),
            policy: config.pipeline.normalization,
            deadline: config.pipeline.deadline_secs.map(Duration::from_secs),
            mode: config.mode,
            apology: config.apology.clone(),
            backend,
        }
    }

    pub fn validate(&self, input: &Value) -> Result<Question, ValidationError> {
        self.validator.validate(input)
    }

    pub fn build_envelope(&self, question: &Question) -> PromptEnvelope {
        self.template.build(question)
    }

    pub async fn invoke_backend(&self, envelope: &PromptEnvelope) -> Result<String, PipelineError> {
        let call = self.backend.generate(envelope, &self.params);

        let raw = match self.deadline {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| BackendError::Timeout(limit))??,
            None => call.await?,
        };

        if raw.trim().is_empty() {
            return Err(PipelineError::EmptyResponse);
        }
        Ok(raw)
    }

    pub fn normalize(&self, raw: &str) -> String {
        self.policy.apply(raw)
    }

    /// Runs a JSON request body through the pipeline.
    pub async fn handle_body(&self, body: &[u8]) -> Result<NormalizedResponse, ErrorResult> {
        match serde_json::from_slice::<Value>(body) {
            Ok(input) => self.handle(&input).await,
            Err(_) => Err(self.to_error_result(PipelineError::Validation(
                ValidationError::MalformedBody,
            ))),
        }
    }

    pub async fn handle(&self, input: &Value) -> Result<NormalizedResponse, ErrorResult> {
        let request_id = uuid::Uuid::new_v4();
        let span = tracing::info_span!("chat", %request_id);

        let outcome = AssertUnwindSafe(self.run(input).instrument(span.clone()))
            .catch_unwind()
            .await
            .unwrap_or_else(|panic| Err(PipelineError::Unexpected(panic_message(&*panic))));

        let _entered = span.enter();
        outcome.map_err(|err| {
            match &err {
                PipelineError::Validation(e) => tracing::debug!("Rejected question: {}", e),
                other => tracing::error!("Chat request failed: {}", other),
            }
            self.to_error_result(err)
        })
    }

    async fn run(&self, input: &Value) -> Result<NormalizedResponse, PipelineError> {
        let question = self.validate(input)?;
        tracing::info!(chars = question.text().chars().count(), "Question accepted");

        let envelope = self.build_envelope(&question);
        let raw = self.invoke_backend(&envelope).await?;
        let response = self.normalize(&raw);

        if response.is_empty() {
            tracing::warn!("Normalization left no answer lines");
        }

        Ok(NormalizedResponse {
            response,
            query: question.original().to_string(),
            timestamp: Utc::now(),
        })
    }

    fn to_error_result(&self, err: PipelineError) -> ErrorResult {
        let kind = match &err {
            PipelineError::Validation(_) => ErrorKind::Validation,
            PipelineError::Backend(_) => ErrorKind::Backend,
            PipelineError::EmptyResponse => ErrorKind::EmptyResponse,
            PipelineError::Unexpected(_) => ErrorKind::Unexpected,
        };

        match err {
            PipelineError::Validation(e) => ErrorResult {
                kind,
                error: e.to_string(),
                example: Some(self.validator.example()),
                action: None,
                details: None,
            },
            other => ErrorResult {
                kind,
                error: self.apology.error.clone(),
                example: None,
                action: Some(self.apology.action.clone()),
                details: self.mode.is_development().then(|| other.detail()),
            },
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "panic in request handler".to_string())
}
