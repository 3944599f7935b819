//! append-only conversation history for one session.

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }
    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }
    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: Role::Assistant, content: content.into() }
    }
}

/// ordered history; element 0 is always the system instruction.
///
/// there is no way to remove or reorder entries, and no way to append a
/// second system message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Transcript {
    messages: Vec<Message>,
}

impl Transcript {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        Self { messages: vec![Message::system(system_prompt)] }
    }

    pub fn push_user(&mut self, text: impl Into<String>) {
        self.messages.push(Message::user(text));
    }

    pub fn push_assistant(&mut self, text: impl Into<String>) {
        self.messages.push(Message::assistant(text));
    }

    /// everything, system message first. this is what goes over the wire.
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// messages a user may see.
    pub fn visible(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter().filter(|m| m.role != Role::System)
    }

    pub fn system_prompt(&self) -> &str {
        &self.messages[0].content
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// true when only the system message is present.
    pub fn is_empty(&self) -> bool {
        self.messages.len() == 1
    }

    pub fn last(&self) -> &Message {
        // never empty: the system message is seeded in `new`.
        &self.messages[self.messages.len() - 1]
    }
}

/// display text for the visible part of a transcript.
pub fn render_transcript(transcript: &Transcript) -> String {
    let mut out = String::new();
    for m in transcript.visible() {
        out.push_str(m.role.as_str());
        out.push_str(": ");
        out.push_str(m.content.trim());
        out.push_str("\n\n");
    }
    out
}
