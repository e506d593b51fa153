use std::future::poll_fn;
use std::pin::pin;

use klod_model::{
    ModelFinishReason, ModelProvider, ModelRequest, ModelResponse,
    ModelResponseEvent,
};
use tracing::Instrument;

/// A wrapper around a model provider that drives a streaming response to
/// completion.
#[derive(Clone, Debug)]
pub struct ModelClient<P> {
    provider: P,
}

impl<P: ModelProvider> ModelClient<P> {
    /// Creates a client for `provider`.
    #[inline]
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// Sends a request and waits for the whole response.
    ///
    /// Every text fragment is passed to `on_delta` as soon as it arrives,
    /// after it has been added to the returned transcript. On error nothing
    /// is returned, even if some fragments were already delivered.
    pub async fn send_request(
        &self,
        req: ModelRequest,
        on_delta: impl FnMut(&str),
    ) -> Result<ModelClientResponse, P::Error> {
        let fut = self.provider.send_request(&req);
        async move {
            trace!("got a request: {:?}", req);
            let resp = match fut.await {
                Ok(resp) => resp,
                Err(err) => {
                    error!("got an error: {err:?}");
                    return Err(err);
                }
            };
            handle_response::<P>(resp, on_delta).await
        }
        .instrument(trace_span!("model client req"))
        .await
    }
}

/// A completely received response from the model client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModelClientResponse {
    /// The concatenation of every text fragment, in arrival order.
    pub transcript: String,
    /// The reason the model finished generating, if it told us.
    pub finish_reason: Option<ModelFinishReason>,
}

async fn handle_response<P: ModelProvider>(
    resp: P::Response,
    mut on_delta: impl FnMut(&str),
) -> Result<ModelClientResponse, P::Error> {
    let mut transcript = String::new();
    let mut finish_reason = None;

    trace!("start receiving events");

    let mut pinned_resp = pin!(resp);
    loop {
        let event_or_err =
            poll_fn(|cx| pinned_resp.as_mut().poll_next_event(cx)).await;
        let event = match event_or_err {
            Ok(event) => event,
            Err(err) => {
                error!("got an error: {err:?}");
                return Err(err);
            }
        };

        let Some(event) = event else {
            break;
        };
        trace!("got an event: {event:?}");

        match event {
            ModelResponseEvent::MessageDelta(msg) => {
                transcript.push_str(&msg);
                on_delta(&msg);
            }
            ModelResponseEvent::Completed(reason) => {
                finish_reason = Some(reason);
            }
        }
    }

    trace!("finished a request");

    Ok(ModelClientResponse {
        transcript,
        finish_reason,
    })
}

#[cfg(test)]
mod tests {
    use klod_model::{ErrorKind, Message, ModelProviderError};
    use klod_test_model::{PresetEvent, PresetResponse, TestModelProvider};

    use super::*;

    fn hi_request() -> ModelRequest {
        ModelRequest {
            system: None,
            messages: vec![Message::user("Hi")],
        }
    }

    #[tokio::test]
    async fn test_send_request() {
        let mut model_provider = TestModelProvider::default();
        model_provider.add_response(PresetResponse::with_events([
            PresetEvent::MessageDelta("Hel".to_owned()),
            PresetEvent::MessageDelta("lo".to_owned()),
        ]));

        let model_client = ModelClient::new(model_provider);
        let mut deltas = vec![];
        let resp = model_client
            .send_request(hi_request(), |delta| deltas.push(delta.to_owned()))
            .await
            .unwrap();
        assert_eq!(resp.transcript, "Hello");
        assert_eq!(resp.finish_reason, Some(ModelFinishReason::EndTurn));
        assert_eq!(deltas, ["Hel", "lo"]);
        assert_eq!(resp.transcript, deltas.concat());
    }

    #[tokio::test]
    async fn test_empty_response() {
        let mut model_provider = TestModelProvider::default();
        model_provider
            .add_response(PresetResponse::with_events(Vec::<PresetEvent>::new()));

        let model_client = ModelClient::new(model_provider);
        let mut called = false;
        let resp = model_client
            .send_request(hi_request(), |_| called = true)
            .await
            .unwrap();
        assert_eq!(resp.transcript, "");
        assert!(!called);
    }

    #[tokio::test]
    async fn test_error_handling() {
        let mut model_provider = TestModelProvider::default();
        model_provider.add_response(PresetResponse::with_events([
            PresetEvent::MessageDelta("partial".to_owned()),
            PresetEvent::Error("overloaded_error".to_owned()),
        ]));
        model_provider.add_response(PresetResponse::rejected(403));

        let model_client = ModelClient::new(model_provider);
        let mut deltas = vec![];
        let err = model_client
            .send_request(hi_request(), |delta| deltas.push(delta.to_owned()))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Api);
        assert_eq!(deltas, ["partial"]);

        let err = model_client
            .send_request(hi_request(), |_| {})
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Status);
    }
}
