use std::pin::Pin;
use std::task::{Context, Poll, ready};

use klod_model::{ModelFinishReason, ModelResponse, ModelResponseEvent};
use pin_project_lite::pin_project;

use crate::Error;
use crate::decoder::{DecodedEvent, StreamDecoder};

struct PartialState {
    decoder: StreamDecoder,
    // Reported once the decoder runs dry, after every text delta.
    pending_finish_reason: Option<ModelFinishReason>,
}

type PinnedFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;
type NextEvent = Result<(Option<ModelResponseEvent>, PartialState), Error>;

pin_project! {
    /// A streaming response of the Messages API.
    pub struct AnthropicResponse {
        next_event_fut: Option<PinnedFuture<NextEvent>>,
    }
}

impl AnthropicResponse {
    #[inline]
    pub(crate) fn from_decoder(decoder: StreamDecoder) -> Self {
        let partial_state = PartialState {
            decoder,
            pending_finish_reason: None,
        };
        let next_event_fut = async move { next_event(partial_state).await };
        Self {
            next_event_fut: Some(Box::pin(next_event_fut)),
        }
    }
}

impl ModelResponse for AnthropicResponse {
    type Error = crate::Error;

    fn poll_next_event(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Result<Option<ModelResponseEvent>, Self::Error>> {
        let this = self.project();
        let Some(next_event_fut) = this.next_event_fut else {
            return Poll::Ready(Ok(None));
        };
        let (event, partial_state) =
            match ready!(next_event_fut.as_mut().poll(cx)) {
                Ok((Some(event), partial_state)) => (event, partial_state),
                Ok((None, _)) => {
                    *this.next_event_fut = None;
                    return Poll::Ready(Ok(None));
                }
                Err(err) => {
                    *this.next_event_fut = None;
                    return Poll::Ready(Err(err));
                }
            };

        // The stream may still have more data to pull, create a new future for
        // the next event.
        let next_event_fut = async move { next_event(partial_state).await };
        *this.next_event_fut = Some(Box::pin(next_event_fut));

        Poll::Ready(Ok(Some(event)))
    }
}

async fn next_event(mut partial_state: PartialState) -> NextEvent {
    loop {
        let event = match partial_state.decoder.next_event().await? {
            Some(event) => event,
            None => break,
        };
        trace!("got decoded event: {event:?}");
        match event {
            DecodedEvent::TextDelta(text) => {
                return Ok((
                    Some(ModelResponseEvent::MessageDelta(text)),
                    partial_state,
                ));
            }
            DecodedEvent::Stop(reason) => {
                partial_state.pending_finish_reason =
                    Some(finish_reason(&reason));
            }
            DecodedEvent::Ignored(_) => {}
        }
    }

    if let Some(finish_reason) = partial_state.pending_finish_reason.take() {
        return Ok((
            Some(ModelResponseEvent::Completed(finish_reason)),
            partial_state,
        ));
    }

    Ok((None, partial_state))
}

#[inline]
fn finish_reason(reason: &str) -> ModelFinishReason {
    match reason {
        "end_turn" => ModelFinishReason::EndTurn,
        "max_tokens" => ModelFinishReason::MaxTokens,
        "stop_sequence" => ModelFinishReason::StopSequence,
        _ => ModelFinishReason::Other,
    }
}

#[cfg(test)]
mod tests {
    use std::future::poll_fn;
    use std::pin::pin;

    use bytes::Bytes;

    use super::*;
    use crate::io::{Chunks, Lines};

    fn response_for(chunks: Vec<Bytes>) -> AnthropicResponse {
        let chunks = Chunks::from_vec_deque(chunks.into());
        AnthropicResponse::from_decoder(StreamDecoder::new(Lines::new(chunks)))
    }

    #[tokio::test]
    async fn test_fixture_stream() {
        let mut resp = pin!(response_for(vec![Bytes::from_static(
            include_bytes!("../fixtures/hello_stream.txt")
        )]));
        let mut events = vec![];
        while let Some(event) =
            poll_fn(|cx| resp.as_mut().poll_next_event(cx)).await.unwrap()
        {
            events.push(event);
        }
        assert_eq!(
            events,
            [
                ModelResponseEvent::MessageDelta("Hello".to_owned()),
                ModelResponseEvent::MessageDelta(", world".to_owned()),
                ModelResponseEvent::MessageDelta("!".to_owned()),
                ModelResponseEvent::Completed(ModelFinishReason::EndTurn),
            ]
        );

        // Polling after completion keeps returning `None`.
        let event =
            poll_fn(|cx| resp.as_mut().poll_next_event(cx)).await.unwrap();
        assert_eq!(event, None);
    }

    #[tokio::test]
    async fn test_error_ends_response() {
        let mut resp = pin!(response_for(vec![
            Bytes::from_static(
                b"data: {\"type\":\"error\",\"error\":{\"type\":\"api_error\",\"message\":\"Internal\"}}\n"
            ),
        ]));
        let err = poll_fn(|cx| resp.as_mut().poll_next_event(cx))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "API error: api_error - Internal");
        let event =
            poll_fn(|cx| resp.as_mut().poll_next_event(cx)).await.unwrap();
        assert_eq!(event, None);
    }

    #[test]
    fn test_finish_reason() {
        assert_eq!(finish_reason("max_tokens"), ModelFinishReason::MaxTokens);
        assert_eq!(finish_reason("refusal"), ModelFinishReason::Other);
    }
}
