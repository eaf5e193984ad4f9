use rsvp_core::{EventId, SenderId};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageKind {
    Stream,
    Private,
}

/// A chat message as delivered by the transport.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundMessage {
    pub content: String,
    pub subject: String,
    /// Stream name for stream messages.
    pub display_recipient: String,
    pub sender_id: SenderId,
    pub sender_full_name: String,
    pub sender_email: String,
    #[serde(rename = "type")]
    pub kind: MessageKind,
}

impl InboundMessage {
    pub fn event_id(&self) -> EventId {
        EventId::new(&self.display_recipient, &self.subject)
    }
}

/// What a command wants said. Without `to`, the reply goes back where the command came from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Reply {
    pub kind: MessageKind,
    pub body: String,
    pub to: Option<String>,
    pub subject: Option<String>,
}

impl Reply {
    pub fn stream(body: impl Into<String>) -> Self {
        Self { kind: MessageKind::Stream, body: body.into(), to: None, subject: None }
    }

    pub fn private(body: impl Into<String>, to: impl Into<String>) -> Self {
        Self { kind: MessageKind::Private, body: body.into(), to: Some(to.into()), subject: None }
    }

    pub fn to_topic(
        body: impl Into<String>,
        stream: impl Into<String>,
        topic: impl Into<String>,
    ) -> Self {
        Self {
            kind: MessageKind::Stream,
            body: body.into(),
            to: Some(stream.into()),
            subject: Some(topic.into()),
        }
    }
}

/// Fully addressed message ready for the transport.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutboundMessage {
    #[serde(rename = "type")]
    pub kind: MessageKind,
    /// Stream name, or the recipient's e-mail for private messages.
    pub to: String,
    pub subject: String,
    pub body: String,
}

impl OutboundMessage {
    /// Private originals force private answers to the sender.
    pub fn resolve(reply: Reply, origin: &InboundMessage) -> Self {
        if origin.kind == MessageKind::Private {
            return Self {
                kind: MessageKind::Private,
                to: origin.sender_email.clone(),
                subject: origin.subject.clone(),
                body: reply.body,
            };
        }

        let to = match (reply.to, reply.kind) {
            (Some(to), _) => to,
            (None, MessageKind::Private) => origin.sender_email.clone(),
            (None, MessageKind::Stream) => origin.display_recipient.clone(),
        };
        Self {
            kind: reply.kind,
            to,
            subject: reply.subject.unwrap_or_else(|| origin.subject.clone()),
            body: reply.body,
        }
    }
}
