//! Advice gateway to the external text-generation service.
//!
//! The gateway never fails towards its caller: any provider error is logged
//! and replaced by one of two canned answers.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;
use validator::{Validate, ValidationError};

use crate::core::chat::MAX_QUESTION_CHARS;
use crate::core::data::patient_context;
use crate::core::triage::TriagePolicy;
use crate::models::PatientData;

/// Question keywords that select the breathing/secretion fallback.
const RESPIRATORY_KEYWORDS: &[&str] = &[
    "가래", "호흡", "phlegm", "mucus", "secretion", "sputum", "breath",
];

pub const RESPIRATORY_FALLBACK: &str = "(Demo mode: AI connection failed) This must be worrying.\n\n\
**Check first**\n\
1. Perform **suction** right away.\n\
2. Make sure the tube is not kinked or dislodged.\n\n\
If the symptoms continue, contact the care team.";

pub const GENERAL_FALLBACK: &str = "(Demo mode: AI connection failed) The connection is not stable right now.\n\n\
**Recommended**\n\
1. Check your child's **breathing** directly.\n\
2. Make sure **SpO2** stays at 90% or above.\n\n\
In an emergency, call emergency services immediately.";

const SYSTEM_PROMPT: &str = "You are a respiratory-care guide for caregivers of a child on home \
ventilation. Explain simply, never diagnose or prescribe, and recommend emergency services when \
red-flag signs are present. Reply only with a JSON object with the keys answer (string), \
redFlag (boolean), safetyNote (string) and citations (array of {source, year, note}).";

#[derive(Debug, Error)]
pub enum AdviceError {
    #[error("advice service credential is not configured")]
    MissingCredential,

    #[error("advice service request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("advice service returned status {0}")]
    Status(u16),

    #[error("advice service returned a malformed response: {0}")]
    Malformed(String),
}

/// Incoming relay request.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AdviceRequest {
    #[serde(alias = "message")]
    #[validate(custom = "validate_question")]
    pub question: String,
    pub patient: PatientData,
}

/// Length limits apply to the trimmed question.
fn validate_question(question: &str) -> Result<(), ValidationError> {
    let length = question.trim().chars().count();
    if length == 0 || length > MAX_QUESTION_CHARS {
        return Err(ValidationError::new("length"));
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdviceResponse {
    #[serde(alias = "reply")]
    pub answer: String,
    #[serde(default)]
    pub red_flag: bool,
    #[serde(default)]
    pub safety_note: String,
    #[serde(default)]
    pub citations: Vec<Citation>,
}

impl AdviceResponse {
    pub fn plain(answer: impl Into<String>) -> Self {
        Self {
            answer: answer.into(),
            red_flag: false,
            safety_note: String::new(),
            citations: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AdviceSource {
    Model,
    Fallback,
}

/// What the gateway hands back: always an answer, plus where it came from.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Advice {
    #[serde(flatten)]
    pub response: AdviceResponse,
    pub source: AdviceSource,
}

/// The opaque text-completion collaborator.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AdviceProvider: Send + Sync {
    async fn complete(
        &self,
        question: &str,
        patient: &PatientData,
    ) -> Result<AdviceResponse, AdviceError>;
}

/// OpenAI-compatible chat-completions client.
pub struct OpenAiProvider {
    client: Client,
    api_key: Option<String>,
    endpoint: Url,
    model: String,
    temperature: f32,
    policy: TriagePolicy,
}

impl OpenAiProvider {
    pub fn new(
        api_key: Option<String>,
        base_url: &str,
        model: impl Into<String>,
        temperature: f32,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let mut base = Url::parse(base_url)?;
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        let endpoint = base.join("chat/completions")?;
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            api_key: api_key.filter(|key| !key.trim().is_empty()),
            endpoint,
            model: model.into(),
            temperature,
            policy: TriagePolicy::default(),
        })
    }

    /// Thresholds quoted in the patient context; must match the ones the
    /// screens classify with.
    pub fn with_policy(mut self, policy: TriagePolicy) -> Self {
        self.policy = policy;
        self
    }
}

#[async_trait]
impl AdviceProvider for OpenAiProvider {
    async fn complete(
        &self,
        question: &str,
        patient: &PatientData,
    ) -> Result<AdviceResponse, AdviceError> {
        let api_key = self.api_key.as_deref().ok_or(AdviceError::MissingCredential)?;

        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(api_key)
            .json(&json!({
                "model": self.model,
                "temperature": self.temperature,
                "response_format": { "type": "json_object" },
                "messages": [
                    { "role": "system", "content": SYSTEM_PROMPT },
                    {
                        "role": "user",
                        "content": format!(
                            "[Caregiver question]\n{question}\n\n{}",
                            patient_context(patient, &self.policy)
                        ),
                    },
                ],
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(AdviceError::Status(status.as_u16()));
        }

        let body = response.json::<serde_json::Value>().await?;
        let content = body["choices"][0]["message"]["content"]
            .as_str()
            .map(str::trim)
            .filter(|content| !content.is_empty())
            .ok_or_else(|| AdviceError::Malformed("empty completion".to_string()))?;

        parse_completion(content)
    }
}

/// Structured JSON if the model honoured the format, plain text otherwise.
fn parse_completion(content: &str) -> Result<AdviceResponse, AdviceError> {
    let parsed = match serde_json::from_str::<AdviceResponse>(content) {
        Ok(parsed) => parsed,
        Err(err) if content.starts_with('{') => {
            return Err(AdviceError::Malformed(err.to_string()));
        }
        Err(_) => AdviceResponse::plain(content),
    };

    if parsed.answer.trim().is_empty() {
        return Err(AdviceError::Malformed("empty answer".to_string()));
    }
    Ok(parsed)
}

/// Picks the canned answer for `question`.
pub fn fallback_for(question: &str) -> &'static str {
    let lowered = question.to_lowercase();
    if RESPIRATORY_KEYWORDS
        .iter()
        .any(|keyword| lowered.contains(keyword))
    {
        RESPIRATORY_FALLBACK
    } else {
        GENERAL_FALLBACK
    }
}

#[derive(Clone)]
pub struct AdviceGateway {
    provider: Arc<dyn AdviceProvider>,
}

impl AdviceGateway {
    pub fn new(provider: Arc<dyn AdviceProvider>) -> Self {
        Self { provider }
    }

    pub async fn ask(&self, question: &str, patient: &PatientData) -> Advice {
        match self.provider.complete(question, patient).await {
            Ok(response) => {
                debug!(red_flag = response.red_flag, "advice received from model");
                Advice {
                    response,
                    source: AdviceSource::Model,
                }
            }
            Err(err) => {
                warn!(error = %err, "advice request failed, using fallback");
                Advice {
                    response: AdviceResponse::plain(fallback_for(question)),
                    source: AdviceSource::Fallback,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_is_chosen_by_keyword() {
        assert_eq!(fallback_for("가래가 많아졌어요"), RESPIRATORY_FALLBACK);
        assert_eq!(fallback_for("호흡이 가빠요"), RESPIRATORY_FALLBACK);
        assert_eq!(fallback_for("Her BREATHING looks fast"), RESPIRATORY_FALLBACK);
        assert_eq!(fallback_for("What should I pack for a trip?"), GENERAL_FALLBACK);
        assert_eq!(fallback_for(""), GENERAL_FALLBACK);
    }

    #[test]
    fn parse_completion_accepts_structured_and_plain() {
        let structured = r#"{"answer":"Suction first.","redFlag":true,"safetyNote":"Go to ER","citations":[{"source":"ATS","year":2019}]}"#;
        let parsed = parse_completion(structured).unwrap();
        assert!(parsed.red_flag);
        assert_eq!(parsed.citations[0].year, Some(2019));

        let reply = parse_completion(r#"{"reply":"ok"}"#).unwrap();
        assert_eq!(reply.answer, "ok");

        let plain = parse_completion("Just keep watching.").unwrap();
        assert_eq!(plain.answer, "Just keep watching.");
        assert!(!plain.red_flag);
    }

    #[test]
    fn parse_completion_rejects_broken_json() {
        assert!(matches!(
            parse_completion(r#"{"answer": "#),
            Err(AdviceError::Malformed(_))
        ));
        assert!(matches!(
            parse_completion(r#"{"answer": "  "}"#),
            Err(AdviceError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn missing_credential_uses_fallback_without_network() {
        let provider = OpenAiProvider::new(
            None,
            "http://127.0.0.1:9/v1",
            "gpt-4.1-mini",
            0.3,
            Duration::from_secs(1),
        )
        .unwrap();
        let gateway = AdviceGateway::new(Arc::new(provider));

        let advice = gateway.ask("phlegm again", &PatientData::default()).await;
        assert_eq!(advice.source, AdviceSource::Fallback);
        assert_eq!(advice.response.answer, RESPIRATORY_FALLBACK);
    }

    #[tokio::test]
    async fn provider_error_becomes_fallback() {
        let mut provider = MockAdviceProvider::new();
        provider
            .expect_complete()
            .returning(|_, _| Err(AdviceError::Status(503)));
        let gateway = AdviceGateway::new(Arc::new(provider));

        let advice = gateway.ask("Can we take a bath?", &PatientData::default()).await;
        assert_eq!(advice.source, AdviceSource::Fallback);
        assert_eq!(advice.response.answer, GENERAL_FALLBACK);
    }

    #[test]
    fn question_length_counts_trimmed_characters() {
        let padded = format!("   {}   ", "a".repeat(MAX_QUESTION_CHARS - 2));
        assert!(validate_question(&padded).is_ok());
        assert!(validate_question(&"가".repeat(MAX_QUESTION_CHARS)).is_ok());
        assert!(validate_question(" \n ").is_err());
        assert!(validate_question(&"a".repeat(MAX_QUESTION_CHARS + 1)).is_err());
    }

    #[test]
    fn endpoint_joins_base_path() {
        let provider = OpenAiProvider::new(
            Some("k".into()),
            "https://api.openai.com/v1",
            "m",
            0.3,
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(
            provider.endpoint.as_str(),
            "https://api.openai.com/v1/chat/completions"
        );
    }
}
