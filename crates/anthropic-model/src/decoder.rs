//! Decoding of the line-framed event stream of a streaming response.

use crate::Error;
use crate::io::Lines;
use crate::proto::{CONTENT_BLOCK_DELTA, MESSAGE_DELTA, StreamEvent, TEXT_DELTA};

const DATA_PREFIX: &str = "data: ";
const DONE_SENTINEL: &str = "[DONE]";

/// An event decoded from one `data:` record.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum DecodedEvent {
    /// A fragment of assistant text.
    TextDelta(String),
    /// The server announced why the message stopped.
    Stop(String),
    /// A well-formed event that carries nothing to display.
    Ignored(Option<String>),
}

/// A pull-based decoder over the response lines.
///
/// Events come out in arrival order. The sequence ends on the `[DONE]`
/// sentinel, at the end of input, or with the first error, after which
/// the decoder only returns `None`.
pub struct StreamDecoder {
    lines: Lines,
    finished: bool,
}

impl StreamDecoder {
    #[inline]
    pub fn new(lines: Lines) -> Self {
        Self {
            lines,
            finished: false,
        }
    }

    pub async fn next_event(&mut self) -> Result<Option<DecodedEvent>, Error> {
        if self.finished {
            return Ok(None);
        }
        let result = self.read_event().await;
        if !matches!(result, Ok(Some(_))) {
            self.finished = true;
        }
        result
    }

    async fn read_event(&mut self) -> Result<Option<DecodedEvent>, Error> {
        loop {
            let Some(line) =
                self.lines.next_line().await.map_err(Error::Stream)?
            else {
                return Ok(None);
            };
            trace!("got stream line: {line}");

            // Blank lines and other SSE fields (`event:`, `id:`, comments)
            // carry nothing we need.
            let Some(payload) = line.trim().strip_prefix(DATA_PREFIX) else {
                continue;
            };
            if payload == DONE_SENTINEL {
                return Ok(None);
            }

            let event = match serde_json::from_str::<StreamEvent>(payload) {
                Ok(event) => event,
                Err(err) => {
                    debug!("skipping malformed event ({err}): {payload}");
                    continue;
                }
            };
            if let Some(error) = event.error {
                return Err(Error::Api {
                    kind: error.r#type.unwrap_or_default(),
                    message: error.message.unwrap_or_default(),
                });
            }
            return Ok(Some(decode_event(event)));
        }
    }
}

fn decode_event(event: StreamEvent) -> DecodedEvent {
    let StreamEvent { r#type, delta, .. } = event;
    let Some(delta) = delta else {
        return DecodedEvent::Ignored(r#type);
    };
    match r#type.as_deref() {
        Some(CONTENT_BLOCK_DELTA)
            if delta.r#type.as_deref() == Some(TEXT_DELTA) =>
        {
            DecodedEvent::TextDelta(delta.text.unwrap_or_default())
        }
        Some(MESSAGE_DELTA) => match delta.stop_reason {
            Some(reason) => DecodedEvent::Stop(reason),
            None => DecodedEvent::Ignored(r#type),
        },
        _ => DecodedEvent::Ignored(r#type),
    }
}
