//! Model caller abstraction.
//!
//! The engine never talks to a provider directly; it goes through the
//! [`ModelCaller`] trait, which accepts a stack of system prompts plus one
//! human message and returns text with optional token usage. Concrete
//! callers are registered per provider in a [`CallerSet`] and chosen per
//! run, fixed at creation/resume time.

mod error;
mod http;

pub use error::LlmError;
pub use http::HttpModelCaller;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use crate::engine::types::Provider;

/// Text returned by a model, with token usage when the provider reports it.
#[derive(Debug, Clone, Default)]
pub struct ModelReply {
    pub text: String,
    pub tokens_in: Option<u64>,
    pub tokens_out: Option<u64>,
}

impl ModelReply {
    /// Reply with text only (no usage data).
    pub fn text_only(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            tokens_in: None,
            tokens_out: None,
        }
    }
}

/// Trait for model callers.
#[async_trait]
pub trait ModelCaller: Send + Sync {
    /// Invoke the model with a stack of system prompts and one human prompt.
    async fn invoke(
        &self,
        model: &str,
        system_prompts: &[String],
        human_prompt: &str,
    ) -> Result<ModelReply, LlmError>;
}

/// Registry mapping providers to concrete callers.
#[derive(Clone, Default)]
pub struct CallerSet {
    callers: HashMap<Provider, Arc<dyn ModelCaller>>,
}

impl CallerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the caller for a provider, replacing any previous one.
    pub fn register(mut self, provider: Provider, caller: Arc<dyn ModelCaller>) -> Self {
        self.callers.insert(provider, caller);
        self
    }

    /// Look up the caller for a provider.
    pub fn caller_for(&self, provider: Provider) -> Option<Arc<dyn ModelCaller>> {
        self.callers.get(&provider).cloned()
    }

    /// Providers with a registered caller.
    pub fn providers(&self) -> Vec<Provider> {
        self.callers.keys().copied().collect()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted caller for engine tests.

    use super::*;
    use std::sync::Mutex;

    /// Returns queued replies in order; repeats the last one when exhausted.
    /// Records every prompt it receives for assertions.
    pub struct ScriptedCaller {
        replies: Mutex<Vec<Result<ModelReply, String>>>,
        pub calls: Mutex<Vec<RecordedCall>>,
    }

    #[derive(Debug, Clone)]
    pub struct RecordedCall {
        pub model: String,
        pub system_prompts: Vec<String>,
        pub human_prompt: String,
    }

    impl ScriptedCaller {
        /// Every call answers with the same text.
        pub fn always(text: &str) -> Self {
            Self::with_replies(vec![Ok(ModelReply::text_only(text))])
        }

        /// Queue replies consumed front-to-back; the last entry repeats.
        pub fn with_replies(replies: Vec<Result<ModelReply, String>>) -> Self {
            Self {
                replies: Mutex::new(replies),
                calls: Mutex::new(Vec::new()),
            }
        }

        /// Every call fails with a network error.
        pub fn always_failing(message: &str) -> Self {
            Self::with_replies(vec![Err(message.to_string())])
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ModelCaller for ScriptedCaller {
        async fn invoke(
            &self,
            model: &str,
            system_prompts: &[String],
            human_prompt: &str,
        ) -> Result<ModelReply, LlmError> {
            self.calls.lock().unwrap().push(RecordedCall {
                model: model.to_string(),
                system_prompts: system_prompts.to_vec(),
                human_prompt: human_prompt.to_string(),
            });
            let mut replies = self.replies.lock().unwrap();
            let reply = if replies.len() > 1 {
                replies.remove(0)
            } else {
                replies.first().cloned().unwrap_or_else(|| {
                    Err("scripted caller has no replies".to_string())
                })
            };
            reply.map_err(LlmError::Network)
        }
    }
}
