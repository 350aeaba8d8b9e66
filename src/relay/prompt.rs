use serde::Serialize;

use crate::config::{ExemplarConfig, PromptConfig, QUESTION_PLACEHOLDER};
use crate::relay::Question;

/// Canned exchange placed before the real question to steer output format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExemplarTurn {
    pub user: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl From<&ExemplarConfig> for ExemplarTurn {
    fn from(config: &ExemplarConfig) -> Self {
        Self {
            user: config.user.clone(),
            model: config.model.clone(),
        }
    }
}

/// Everything the backend receives for one question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PromptEnvelope {
    pub system_instructions: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exemplar: Option<ExemplarTurn>,
    pub user_text: String,
}

#[derive(Debug, Clone)]
pub struct PromptTemplate {
    system_instructions: String,
    question_frame: Option<String>,
    exemplar: Option<ExemplarTurn>,
}

impl PromptTemplate {
    pub fn new(config: &PromptConfig) -> Self {
        Self {
            system_instructions: config.system_instructions.trim().to_string(),
            question_frame: config
                .question_frame
                .clone()
                .filter(|f| !f.trim().is_empty()),
            exemplar: config
                .exemplar
                .as_ref()
                .filter(|e| !e.user.trim().is_empty())
                .map(ExemplarTurn::from),
        }
    }

    pub fn build(&self, question: &Question) -> PromptEnvelope {
        let user_text = match &self.question_frame {
            Some(frame) => frame.replace(QUESTION_PLACEHOLDER, question.text()),
            None => question.text().to_string(),
        };

        PromptEnvelope {
            system_instructions: self.system_instructions.clone(),
            exemplar: self.exemplar.clone(),
            user_text,
        }
    }
}
