use serde_json::Value;
use thiserror::Error;

const EXAMPLE_QUESTION: &str = "Dawa ya kifaranga";

/// A question that passed validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    text: String,
    original: String,
}

impl Question {
    /// Trimmed text used to build the prompt.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The value exactly as submitted.
    pub fn original(&self) -> &str {
        &self.original
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Request body must be JSON")]
    MalformedBody,
    #[error("Missing question field")]
    Missing,
    #[error("Field \"{0}\" must be a string")]
    NotAString(String),
    #[error("Invalid question length")]
    TooShort { min: usize },
}

/// Extracts and checks the question from a request body.
#[derive(Debug, Clone)]
pub struct QuestionValidator {
    aliases: Vec<String>,
    min_chars: usize,
}

impl QuestionValidator {
    pub fn new(aliases: Vec<String>, min_chars: usize) -> Self {
        let aliases = aliases
            .into_iter()
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty())
            .collect();
        Self { aliases, min_chars }
    }

    /// Payload shown to callers whose request was rejected.
    pub fn example(&self) -> Value {
        let field = self
            .aliases
            .first()
            .map(String::as_str)
            .unwrap_or("message");
        let mut example = serde_json::Map::new();
        example.insert(field.to_string(), Value::String(EXAMPLE_QUESTION.to_string()));
        Value::Object(example)
    }

    /// Takes the first alias whose value is neither `null` nor `""` and checks
    /// that value alone. Later aliases are never consulted once one is chosen.
    pub fn validate(&self, input: &Value) -> Result<Question, ValidationError> {
        let fields = input.as_object();
        let mut saw_empty = false;

        for alias in &self.aliases {
            match fields.and_then(|f| f.get(alias)) {
                None | Some(Value::Null) => {}
                Some(Value::String(s)) if s.is_empty() => saw_empty = true,
                Some(Value::String(s)) => return self.check_length(s),
                Some(_) => return Err(ValidationError::NotAString(alias.clone())),
            }
        }

        if saw_empty {
            return self.check_length("");
        }
        Err(ValidationError::Missing)
    }

    fn check_length(&self, raw: &str) -> Result<Question, ValidationError> {
        let text = raw.trim();
        if text.chars().count() < self.min_chars {
            return Err(ValidationError::TooShort {
                min: self.min_chars,
            });
        }
        Ok(Question {
            text: text.to_string(),
            original: raw.to_string(),
        })
    }
}
