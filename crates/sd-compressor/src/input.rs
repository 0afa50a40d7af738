//! Call shapes: the context/prompt combinations `compress` accepts.

use sd_core::{CompressedPrompt, Result, SdError};

/// One string or an ordered list of strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextInput {
    One(String),
    Many(Vec<String>),
}

impl TextInput {
    pub fn is_many(&self) -> bool {
        matches!(self, Self::Many(_))
    }
}

impl From<&str> for TextInput {
    fn from(s: &str) -> Self {
        Self::One(s.to_string())
    }
}

impl From<String> for TextInput {
    fn from(s: String) -> Self {
        Self::One(s)
    }
}

impl From<&String> for TextInput {
    fn from(s: &String) -> Self {
        Self::One(s.clone())
    }
}

impl From<Vec<String>> for TextInput {
    fn from(v: Vec<String>) -> Self {
        Self::Many(v)
    }
}

impl From<Vec<&str>> for TextInput {
    fn from(v: Vec<&str>) -> Self {
        Self::Many(v.into_iter().map(String::from).collect())
    }
}

impl From<&[&str]> for TextInput {
    fn from(v: &[&str]) -> Self {
        Self::Many(v.iter().map(|s| s.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for TextInput {
    fn from(v: [&str; N]) -> Self {
        Self::Many(v.iter().map(|s| s.to_string()).collect())
    }
}

/// Resolved dispatch target for one `compress` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallShape {
    Single { context: String, prompt: String },
    /// Aligned (context, prompt) pairs in input order.
    Batch(Vec<(String, String)>),
}

impl CallShape {
    /// - one context, one prompt: single call
    /// - many contexts, many prompts: aligned batch, lengths must match
    /// - many contexts, one prompt: the prompt is broadcast
    /// - one context, many prompts: rejected
    pub fn resolve(context: TextInput, prompt: TextInput) -> Result<Self> {
        match (context, prompt) {
            (TextInput::One(context), TextInput::One(prompt)) => {
                Ok(Self::Single { context, prompt })
            }
            (TextInput::Many(contexts), TextInput::Many(prompts)) => {
                if contexts.len() != prompts.len() {
                    return Err(SdError::invalid_argument(format!(
                        "Context list and prompt list must have the same length ({} != {})",
                        contexts.len(),
                        prompts.len()
                    )));
                }
                Ok(Self::Batch(contexts.into_iter().zip(prompts).collect()))
            }
            (TextInput::Many(contexts), TextInput::One(prompt)) => Ok(Self::Batch(
                contexts
                    .into_iter()
                    .map(|context| (context, prompt.clone()))
                    .collect(),
            )),
            (TextInput::One(_), TextInput::Many(_)) => Err(SdError::invalid_argument(
                "Invalid combination of context and prompt types: single context with a prompt list",
            )),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Single { .. } => 1,
            Self::Batch(pairs) => pairs.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Output mirroring the input shape.
#[derive(Debug, Clone, PartialEq)]
pub enum Compressed {
    Single(CompressedPrompt),
    Batch(Vec<CompressedPrompt>),
}

impl Compressed {
    pub fn is_batch(&self) -> bool {
        matches!(self, Self::Batch(_))
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Single(_) => 1,
            Self::Batch(items) => items.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_single(self) -> Option<CompressedPrompt> {
        match self {
            Self::Single(p) => Some(p),
            Self::Batch(_) => None,
        }
    }

    /// All results in input order; a single result becomes a one-item list.
    pub fn into_vec(self) -> Vec<CompressedPrompt> {
        match self {
            Self::Single(p) => vec![p],
            Self::Batch(items) => items,
        }
    }
}
