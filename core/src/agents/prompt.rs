//! Prompt assembly shared by every provider attempt.

use serde_json::{Map, Value};

/// Fixed instruction sent ahead of every user question.
pub const SYSTEM_PROMPT: &str = "You are a helpful study assistant for students. Answer questions about studying, learning techniques, time management and motivation. Keep responses concise (2-3 sentences) and give practical, actionable advice.";

/// Conversation context supplied by the frontend, in insertion order.
pub type ChatContext = Map<String, Value>;

/// Immutable request handed to each provider.
#[derive(Debug, Clone, PartialEq)]
pub struct Prompt {
    message: String,
    context: Option<ChatContext>,
    merged: String,
}

impl Prompt {
    /// Build a prompt; `None` when the message is blank.
    pub fn new(message: &str, context: Option<&ChatContext>) -> Option<Self> {
        if message.trim().is_empty() {
            return None;
        }
        let context = context.filter(|ctx| !ctx.is_empty()).cloned();
        let merged = merge(message, context.as_ref());
        Some(Self {
            message: message.to_string(),
            context,
            merged,
        })
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn context(&self) -> Option<&ChatContext> {
        self.context.as_ref()
    }

    /// Context block followed by the message.
    pub fn merged_text(&self) -> &str {
        &self.merged
    }

    /// `Context: {...}` annotation, when context is present.
    pub fn context_block(&self) -> Option<String> {
        self.context.as_ref().map(context_block)
    }
}

/// Prepend the serialized context to `message`. Empty or absent context
/// leaves the message unchanged.
pub fn merge(message: &str, context: Option<&ChatContext>) -> String {
    match context {
        Some(ctx) if !ctx.is_empty() => format!("{}\n\n{}", context_block(ctx), message),
        _ => message.to_string(),
    }
}

fn context_block(ctx: &ChatContext) -> String {
    format!("Context: {}", Value::Object(ctx.clone()))
}
