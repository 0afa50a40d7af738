//! Request payload for `POST /compress/raw`.

use sd_core::{ClientConfig, Rate};
use serde::Serialize;
use serde_json::{Map, Value};

/// Per-call options layered over the client configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CallOptions {
    pub max_tokens: Option<u32>,
    /// Merged into the options object last; wins on key collision.
    pub extra: Map<String, Value>,
}

impl CallOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

/// Wire body. The options object travels under the `scaledown` key.
#[derive(Debug, Clone, Serialize)]
pub struct CompressRequest<'a> {
    pub context: &'a str,
    pub prompt: &'a str,
    pub model: &'a str,
    pub scaledown: Map<String, Value>,
}

fn rate_value(rate: Rate) -> Value {
    match rate {
        Rate::Auto => Value::from("auto"),
        Rate::Fixed(r) => Value::from(r),
    }
}

impl<'a> CompressRequest<'a> {
    pub fn build(
        config: &'a ClientConfig,
        context: &'a str,
        prompt: &'a str,
        options: &CallOptions,
    ) -> Self {
        let mut scaledown = Map::new();
        scaledown.insert("rate".into(), rate_value(config.rate));
        scaledown.insert("temperature".into(), config.temperature.map_or(Value::Null, Value::from));
        scaledown.insert("preserve_keywords".into(), Value::Bool(config.preserve_keywords));
        scaledown.insert(
            "preserve_words".into(),
            Value::Array(config.preserve_words.iter().cloned().map(Value::String).collect()),
        );
        scaledown.insert("max_tokens".into(), options.max_tokens.map_or(Value::Null, Value::from));
        for (key, value) in &options.extra {
            scaledown.insert(key.clone(), value.clone());
        }

        Self {
            context,
            prompt,
            model: &config.target_model,
            scaledown,
        }
    }
}
