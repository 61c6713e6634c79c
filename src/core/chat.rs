//! The caregiver conversation of the single session.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tracing::info;
use uuid::Uuid;

use crate::core::ai::AdviceGateway;
use crate::core::triage::TriagePolicy;
use crate::models::{ChatMessage, Feedback, PatientData, Role};

pub const MAX_QUESTION_CHARS: usize = 300;

const EMPTY_ANSWER_TEXT: &str =
    "Sorry, no answer could be generated. Please try again in a moment.";

const EMERGENCY_SUGGESTIONS: &[&str] = &[
    "There is more phlegm and the breathing looks very fast",
    "The numbers do not go up even after suction",
    "Should we go to the ER now?",
    "The lips turned blue",
];

const NORMAL_SUGGESTIONS: &[&str] = &[
    "Should we suction regularly even without phlegm?",
    "What humidifier temperature is best during sleep?",
    "Is the breathing better than last week?",
    "What should I watch out for at bath time?",
    "What supplies should we keep ready for emergencies?",
];

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChatError {
    #[error("question is empty")]
    EmptyQuestion,

    #[error("question is longer than {MAX_QUESTION_CHARS} characters")]
    QuestionTooLong,

    #[error("a question is already being answered")]
    Busy,

    #[error("no message with id {0}")]
    UnknownMessage(Uuid),

    #[error("only model messages take feedback")]
    NotModelMessage,
}

#[derive(Default)]
struct ChatState {
    messages: Vec<ChatMessage>,
    sent_questions: Vec<String>,
    emergency: Option<bool>,
}

pub struct ChatSession {
    gateway: AdviceGateway,
    policy: TriagePolicy,
    state: Mutex<ChatState>,
    pending: AtomicBool,
}

/// Clears the pending flag even if the send future is dropped mid-flight.
struct PendingGuard<'a>(&'a AtomicBool);

impl Drop for PendingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl ChatSession {
    pub fn new(gateway: AdviceGateway, policy: TriagePolicy, patient: &PatientData) -> Self {
        let session = Self {
            gateway,
            policy,
            state: Mutex::new(ChatState::default()),
            pending: AtomicBool::new(false),
        };
        session.sync_with(patient);
        session
    }

    fn state(&self) -> MutexGuard<'_, ChatState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn is_emergency(&self, patient: &PatientData) -> bool {
        self.policy.classify(patient).binary().is_emergency()
    }

    /// Appends a status message when the emergency state of `patient`
    /// differs from the last one announced. Returns whether one was added.
    pub fn sync_with(&self, patient: &PatientData) -> bool {
        let emergency = self.is_emergency(patient);
        let mut state = self.state();
        if state.emergency == Some(emergency) {
            return false;
        }

        state.emergency = Some(emergency);
        state.messages.push(ChatMessage::model(status_message(patient, emergency)));
        info!(emergency, "chat status message appended");
        true
    }

    pub async fn send(
        &self,
        question: &str,
        patient: &PatientData,
    ) -> Result<ChatMessage, ChatError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(ChatError::EmptyQuestion);
        }
        if question.chars().count() > MAX_QUESTION_CHARS {
            return Err(ChatError::QuestionTooLong);
        }

        if self
            .pending
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(ChatError::Busy);
        }
        let _pending = PendingGuard(&self.pending);

        {
            let mut state = self.state();
            state.messages.push(ChatMessage::user(question));
            if !state.sent_questions.iter().any(|q| q == question) {
                state.sent_questions.push(question.to_string());
            }
        }

        let advice = self.gateway.ask(question, patient).await;
        let answer = advice.response.answer.trim();
        let reply = ChatMessage::model(if answer.is_empty() {
            EMPTY_ANSWER_TEXT
        } else {
            answer
        });

        self.state().messages.push(reply.clone());
        Ok(reply)
    }

    pub fn toggle_feedback(&self, id: Uuid, feedback: Feedback) -> Result<ChatMessage, ChatError> {
        let mut state = self.state();
        let message = state
            .messages
            .iter_mut()
            .find(|m| m.id == id)
            .ok_or(ChatError::UnknownMessage(id))?;

        if message.role != Role::Model {
            return Err(ChatError::NotModelMessage);
        }

        message.toggle_feedback(feedback);
        Ok(message.clone())
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        self.state().messages.clone()
    }

    /// Suggested questions for the current state, minus those already asked.
    pub fn suggestions(&self, patient: &PatientData) -> Vec<String> {
        let base = if self.is_emergency(patient) {
            EMERGENCY_SUGGESTIONS
        } else {
            NORMAL_SUGGESTIONS
        };

        let state = self.state();
        base.iter()
            .filter(|q| !state.sent_questions.iter().any(|sent| sent == *q))
            .map(|q| q.to_string())
            .collect()
    }

    pub fn is_loading(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }
}

fn status_message(patient: &PatientData, emergency: bool) -> String {
    let name = &patient.identity.name;
    let v = &patient.vitals;

    if emergency {
        format!(
            "{name}'s guardian, a **low oxygen saturation ({}%)** alarm has been detected for over a minute.\n\n\
             The **respiratory rate is {}/min**, which is high. Secretions such as phlegm narrowing the airway can cause this.\n\n\
             Stay calm and **try this first**.\n\n\
             [Immediate steps]\n\
             1. Perform suction right away.\n\
             2. Check that the tube is not kinked or dislodged.",
            v.spo2, v.rr
        )
    } else {
        format!(
            "Hello. We are monitoring {name}'s breathing in real time.\n\n\
             SpO2 is {}% and the respiratory rate is {}/min, which is stable.\n\n\
             If anything looks different from usual, ask at any time.",
            v.spo2, v.rr
        )
    }
}
