use std::collections::HashMap;

/// Lookup for localized or externalized messages.
///
/// Status annotation reasons may name a message key (e.g. `error.bad`);
/// the classifier asks the source first and falls back to the literal.
pub trait MessageSource: Send + Sync + 'static {
    fn message(&self, key: &str) -> Option<String>;
}

/// A source with no messages; every reason is used literally
#[derive(Debug, Clone, Copy, Default)]
pub struct NoMessages;

impl MessageSource for NoMessages {
    fn message(&self, _key: &str) -> Option<String> {
        None
    }
}

/// In-memory message table
#[derive(Debug, Clone, Default)]
pub struct StaticMessageSource {
    messages: HashMap<String, String>,
}

impl StaticMessageSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, message: impl Into<String>) -> Self {
        self.insert(key, message);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, message: impl Into<String>) {
        self.messages.insert(key.into(), message.into());
    }
}

impl MessageSource for StaticMessageSource {
    fn message(&self, key: &str) -> Option<String> {
        self.messages.get(key).cloned()
    }
}
