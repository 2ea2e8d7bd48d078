//! Handler registry.
//!
//! Maps the request type discriminator to a handler capability. The
//! registry is populated at startup and read-only afterwards; routing
//! happens exactly once, at the parse boundary, and unknown types produce
//! a typed missing-handler error there.

use std::collections::HashMap;
use std::sync::Arc;

use crate::handler::MessageHandler;

/// Registry of message handlers keyed by request type.
#[derive(Default)]
pub struct HandlerRegistry {
    handlers: HashMap<String, Arc<dyn MessageHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for a request type, replacing any previous one.
    pub fn register(&mut self, message_type: impl Into<String>, handler: Arc<dyn MessageHandler>) {
        self.handlers.insert(message_type.into(), handler);
    }

    /// Look up the handler for a request type.
    pub fn get(&self, message_type: &str) -> Option<&Arc<dyn MessageHandler>> {
        self.handlers.get(message_type)
    }

    /// Registered request types, for startup logging.
    pub fn registered_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        types.sort_unstable();
        types
    }
}
