//! JSON-lines chat transport: one chat event per input line, one outbound message per
//! output line.

use async_trait::async_trait;
use rsvp_bot::events::ChatEvent;
use rsvp_bot::messages::OutboundMessage;
use rsvp_bot::runner::{ChatTransport, TransportError};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, Lines};
use tokio::sync::Mutex;
use tracing::{debug, warn};

type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;
type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

pub struct LineTransport {
    reader: Mutex<Lines<BufReader<BoxedReader>>>,
    writer: Mutex<BoxedWriter>,
}

impl LineTransport {
    pub fn new(reader: BoxedReader, writer: BoxedWriter) -> Self {
        Self { reader: Mutex::new(BufReader::new(reader).lines()), writer: Mutex::new(writer) }
    }

    pub fn stdio() -> Self {
        Self::new(Box::new(tokio::io::stdin()), Box::new(tokio::io::stdout()))
    }
}

#[async_trait]
impl ChatTransport for LineTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        debug!(event_name = "rsvp.transport.connected", "reading chat events from input");
        Ok(())
    }

    async fn next_event(&self) -> Result<Option<ChatEvent>, TransportError> {
        let mut lines = self.reader.lock().await;
        loop {
            let next = lines.next_line().await;
            let Some(line) = next.map_err(|error| TransportError::Receive(error.to_string()))? else {
                return Ok(None);
            };
            if line.trim().is_empty() {
                continue;
            }

            match serde_json::from_str::<ChatEvent>(&line) {
                Ok(event) => return Ok(Some(event)),
                Err(error) => warn!(
                    event_name = "rsvp.transport.malformed_event",
                    error = %error,
                    "skipping input line that is not a chat event"
                ),
            }
        }
    }

    async fn send(&self, message: &OutboundMessage) -> Result<(), TransportError> {
        let send_error = |error: &dyn std::fmt::Display| TransportError::Send(error.to_string());
        let mut line = serde_json::to_string(message).map_err(|error| send_error(&error))?;
        line.push('\n');

        let mut writer = self.writer.lock().await;
        writer.write_all(line.as_bytes()).await.map_err(|error| send_error(&error))?;
        writer.flush().await.map_err(|error| send_error(&error))
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        self.writer
            .lock()
            .await
            .flush()
            .await
            .map_err(|error| TransportError::Disconnect(error.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use rsvp_bot::events::ChatEvent;
    use rsvp_bot::messages::{MessageKind, OutboundMessage};
    use rsvp_bot::runner::ChatTransport;
    use tokio::io::AsyncReadExt;

    use super::LineTransport;

    #[tokio::test]
    async fn reads_events_and_skips_noise() {
        let input = concat!(
            "\n",
            "not json\n",
            r#"{"type": "heartbeat"}"#,
            "\n",
            r#"{"type": "realm_user", "person": {"email": "ada@example.com", "full_name": "Ada"}}"#,
            "\n",
        );
        let (writer, _reader) = tokio::io::duplex(64);
        let transport =
            LineTransport::new(Box::new(Cursor::new(input.as_bytes().to_vec())), Box::new(writer));

        let first = transport.next_event().await.expect("read").expect("event");
        assert_eq!(first, ChatEvent::Unsupported);
        let second = transport.next_event().await.expect("read").expect("event");
        assert!(matches!(second, ChatEvent::RealmUser { .. }));
        assert!(transport.next_event().await.expect("read").is_none());
    }

    #[tokio::test]
    async fn writes_one_json_object_per_line() {
        let (writer, mut reader) = tokio::io::duplex(4096);
        let transport = LineTransport::new(Box::new(Cursor::new(Vec::new())), Box::new(writer));

        transport
            .send(&OutboundMessage {
                kind: MessageKind::Private,
                to: "ada@example.com".to_owned(),
                subject: "Lunch".to_owned(),
                body: "hi".to_owned(),
            })
            .await
            .expect("send");
        drop(transport);

        let mut written = String::new();
        reader.read_to_string(&mut written).await.expect("read back");
        let lines: Vec<&str> = written.lines().collect();
        assert_eq!(lines.len(), 1);
        let value: serde_json::Value = serde_json::from_str(lines[0]).expect("json");
        assert_eq!(value["type"], "private");
        assert_eq!(value["to"], "ada@example.com");
        assert_eq!(value["body"], "hi");
    }
}
