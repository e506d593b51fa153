//! The interactive conversation loop.

use std::io;

use klod_model::{
    Message, ModelFinishReason, ModelProvider, ModelProviderError,
    ModelRequest,
};

use crate::model_client::ModelClient;
use crate::transcript::Transcript;

/// The user-facing side of a conversation, e.g. a terminal.
pub trait Frontend {
    /// Reads one line of user input. Returns `None` at the end of input.
    fn read_input(&mut self) -> impl Future<Output = Option<String>>;

    /// Called before a request is sent.
    fn reply_started(&mut self);

    /// Called with every text fragment of the reply, in arrival order.
    fn reply_delta(&mut self, delta: &str);

    /// Called once the reply has been received completely.
    fn reply_finished(&mut self, finish_reason: Option<ModelFinishReason>);

    /// Called when a turn is abandoned because of an error.
    fn turn_failed(&mut self, error: &dyn ModelProviderError);

    /// Called when the user asks to leave.
    fn goodbye(&mut self);
}

/// A mirror of the transcript, such as a session log file.
pub trait SessionLog {
    /// Records a message that has just been appended to the transcript.
    fn append(&mut self, message: &Message) -> io::Result<()>;
}

/// Returns whether `input` (already trimmed) ends the conversation.
#[inline]
pub fn is_exit_input(input: &str) -> bool {
    matches!(input, "" | "exit" | "quit")
}

/// [`Conversation`] builder.
pub struct ConversationBuilder<P> {
    model_client: ModelClient<P>,
    system_prompt: Option<String>,
    session_log: Option<Box<dyn SessionLog>>,
}

impl<P: ModelProvider> ConversationBuilder<P> {
    /// Creates a new builder with the specified model provider.
    #[inline]
    pub fn with_model_provider(provider: P) -> Self {
        Self {
            model_client: ModelClient::new(provider),
            system_prompt: None,
            session_log: None,
        }
    }

    /// Sets the system prompt sent with every request. An empty prompt is
    /// the same as none.
    #[inline]
    pub fn with_system_prompt<S: Into<String>>(mut self, prompt: S) -> Self {
        let prompt = prompt.into();
        self.system_prompt = (!prompt.is_empty()).then_some(prompt);
        self
    }

    /// Mirrors every appended message to `session_log`.
    #[inline]
    pub fn with_session_log(
        mut self,
        session_log: impl SessionLog + 'static,
    ) -> Self {
        self.session_log = Some(Box::new(session_log));
        self
    }

    /// Builds the conversation.
    #[inline]
    pub fn build(self) -> Conversation<P> {
        Conversation {
            model_client: self.model_client,
            system_prompt: self.system_prompt,
            session_log: self.session_log,
            transcript: Transcript::default(),
        }
    }
}

#[derive(Debug)]
enum Stage {
    AwaitInput,
    Sending,
    Streaming(ModelRequest),
    Appending(String),
    Done,
}

/// A conversation with the model, owning its transcript.
///
/// Turns run strictly one after another: the transcript is only touched
/// between turns, and each reply is streamed to the [`Frontend`] before the
/// next input is read.
pub struct Conversation<P> {
    model_client: ModelClient<P>,
    system_prompt: Option<String>,
    session_log: Option<Box<dyn SessionLog>>,
    transcript: Transcript,
}

impl<P: ModelProvider> Conversation<P> {
    /// Returns the transcript so far.
    #[inline]
    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// Runs the conversation until the user leaves.
    ///
    /// `initial_prompt` is sent as the first turn without going through
    /// the exit check. Errors are always reported to the frontend. If the
    /// first turn fails the error is also returned and the conversation
    /// stops; after a later failure the loop waits for the next input. Either way the user
    /// message of a failed turn stays in the transcript.
    pub async fn run<F: Frontend>(
        &mut self,
        initial_prompt: &str,
        frontend: &mut F,
    ) -> Result<(), P::Error> {
        self.append(Message::user(initial_prompt));
        let mut is_first_turn = true;
        let mut stage = Stage::Sending;

        loop {
            trace!("conversation stage: {stage:?}");
            stage = match stage {
                Stage::AwaitInput => match frontend.read_input().await {
                    None => Stage::Done,
                    Some(input) => {
                        let input = input.trim();
                        if is_exit_input(input) {
                            frontend.goodbye();
                            Stage::Done
                        } else {
                            self.append(Message::user(input));
                            Stage::Sending
                        }
                    }
                },
                Stage::Sending => Stage::Streaming(self.build_request()),
                Stage::Streaming(request) => {
                    frontend.reply_started();
                    let resp_or_err = self
                        .model_client
                        .send_request(request, |delta| {
                            frontend.reply_delta(delta)
                        })
                        .await;
                    match resp_or_err {
                        Ok(resp) => {
                            frontend.reply_finished(resp.finish_reason);
                            Stage::Appending(resp.transcript)
                        }
                        Err(err) if is_first_turn => {
                            frontend.turn_failed(&err);
                            return Err(err);
                        }
                        Err(err) => {
                            frontend.turn_failed(&err);
                            Stage::AwaitInput
                        }
                    }
                }
                Stage::Appending(reply) => {
                    self.append(Message::assistant(reply));
                    is_first_turn = false;
                    Stage::AwaitInput
                }
                Stage::Done => return Ok(()),
            };
        }
    }

    fn build_request(&self) -> ModelRequest {
        ModelRequest {
            system: self.system_prompt.clone(),
            messages: self.transcript.messages().to_vec(),
        }
    }

    fn append(&mut self, message: Message) {
        if let Some(session_log) = &mut self.session_log {
            if let Err(err) = session_log.append(&message) {
                warn!("failed to write session log: {err}");
            }
        }
        self.transcript.push(message);
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::future::ready;
    use std::sync::{Arc, Mutex};

    use klod_model::{ErrorKind, Role};
    use klod_test_model::{PresetEvent, PresetResponse, TestModelProvider};

    use super::*;

    #[derive(Debug, PartialEq, Eq)]
    enum Shown {
        Started,
        Delta(String),
        Finished,
        Failed(ErrorKind),
        Goodbye,
    }

    #[derive(Default)]
    struct ScriptedFrontend {
        inputs: VecDeque<String>,
        shown: Vec<Shown>,
    }

    impl ScriptedFrontend {
        fn with_inputs(inputs: &[&str]) -> Self {
            Self {
                inputs: inputs.iter().map(|s| s.to_string()).collect(),
                shown: vec![],
            }
        }
    }

    impl Frontend for ScriptedFrontend {
        fn read_input(&mut self) -> impl Future<Output = Option<String>> {
            ready(self.inputs.pop_front())
        }

        fn reply_started(&mut self) {
            self.shown.push(Shown::Started);
        }

        fn reply_delta(&mut self, delta: &str) {
            self.shown.push(Shown::Delta(delta.to_owned()));
        }

        fn reply_finished(&mut self, _: Option<ModelFinishReason>) {
            self.shown.push(Shown::Finished);
        }

        fn turn_failed(&mut self, error: &dyn ModelProviderError) {
            self.shown.push(Shown::Failed(error.kind()));
        }

        fn goodbye(&mut self) {
            self.shown.push(Shown::Goodbye);
        }
    }

    #[derive(Clone, Default)]
    struct MemoryLog(Arc<Mutex<Vec<Message>>>);

    impl SessionLog for MemoryLog {
        fn append(&mut self, message: &Message) -> io::Result<()> {
            self.0.lock().unwrap().push(message.clone());
            Ok(())
        }
    }

    struct BrokenLog;

    impl SessionLog for BrokenLog {
        fn append(&mut self, _: &Message) -> io::Result<()> {
            Err(io::Error::other("disk full"))
        }
    }

    fn reply(deltas: &[&str]) -> PresetResponse {
        PresetResponse::with_events(
            deltas
                .iter()
                .map(|d| PresetEvent::MessageDelta(d.to_string()))
                .collect::<Vec<_>>(),
        )
    }

    fn contents(transcript: &Transcript) -> Vec<(Role, &str)> {
        transcript
            .iter()
            .map(|m| (m.role, m.content.as_str()))
            .collect()
    }

    #[tokio::test]
    async fn test_turns_until_exit() {
        let mut provider = TestModelProvider::default();
        provider.add_response(reply(&["Hel", "lo"]));
        provider.add_response(reply(&["Fine, ", "thanks."]));
        let log = MemoryLog::default();
        let mut conversation =
            ConversationBuilder::with_model_provider(provider.clone())
                .with_system_prompt("Be brief.")
                .with_session_log(log.clone())
                .build();
        let mut frontend =
            ScriptedFrontend::with_inputs(&["  How are you?\n", "exit"]);

        conversation.run("Hi", &mut frontend).await.unwrap();

        assert_eq!(
            contents(conversation.transcript()),
            [
                (Role::User, "Hi"),
                (Role::Assistant, "Hello"),
                (Role::User, "How are you?"),
                (Role::Assistant, "Fine, thanks."),
            ]
        );
        assert_eq!(
            frontend.shown,
            [
                Shown::Started,
                Shown::Delta("Hel".to_owned()),
                Shown::Delta("lo".to_owned()),
                Shown::Finished,
                Shown::Started,
                Shown::Delta("Fine, ".to_owned()),
                Shown::Delta("thanks.".to_owned()),
                Shown::Finished,
                Shown::Goodbye,
            ]
        );

        let requests = provider.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].system.as_deref(), Some("Be brief."));
        assert_eq!(requests[0].messages.len(), 1);
        assert_eq!(
            requests[1].messages,
            conversation.transcript().messages()[..3]
        );

        assert_eq!(
            log.0.lock().unwrap().as_slice(),
            conversation.transcript().messages()
        );
    }

    #[tokio::test]
    async fn test_exit_inputs() {
        for input in ["exit", "quit", "", "   \n"] {
            let mut provider = TestModelProvider::default();
            provider.add_response(reply(&["Hello"]));
            let mut conversation =
                ConversationBuilder::with_model_provider(provider.clone())
                    .build();
            let mut frontend = ScriptedFrontend::with_inputs(&[input, "more"]);

            conversation.run("Hi", &mut frontend).await.unwrap();

            assert_eq!(provider.requests().len(), 1);
            assert_eq!(conversation.transcript().len(), 2);
            assert_eq!(frontend.shown.last(), Some(&Shown::Goodbye));
            assert_eq!(frontend.inputs.len(), 1);
        }
    }

    #[tokio::test]
    async fn test_exit_keywords_are_case_sensitive() {
        let mut provider = TestModelProvider::default();
        provider.add_response(reply(&["Hello"]));
        provider.add_response(reply(&["Bye?"]));
        let mut conversation =
            ConversationBuilder::with_model_provider(provider.clone()).build();
        let mut frontend = ScriptedFrontend::with_inputs(&["EXIT", "quit"]);

        conversation.run("Hi", &mut frontend).await.unwrap();

        assert_eq!(provider.requests().len(), 2);
        assert_eq!(conversation.transcript().messages()[2].content, "EXIT");
    }

    #[tokio::test]
    async fn test_end_of_input() {
        let mut provider = TestModelProvider::default();
        provider.add_response(reply(&["Hello"]));
        let mut conversation =
            ConversationBuilder::with_model_provider(provider).build();
        let mut frontend = ScriptedFrontend::default();

        conversation.run("Hi", &mut frontend).await.unwrap();

        assert_eq!(conversation.transcript().len(), 2);
        assert!(!frontend.shown.contains(&Shown::Goodbye));
    }

    #[tokio::test]
    async fn test_failed_turn_keeps_user_message() {
        let mut provider = TestModelProvider::default();
        provider.add_response(reply(&["Hello"]));
        provider.add_response(PresetResponse::rejected(401));
        provider.add_response(PresetResponse::with_events([
            PresetEvent::MessageDelta("Par".to_owned()),
            PresetEvent::Error("overloaded_error".to_owned()),
        ]));
        provider.add_response(reply(&["Ok"]));
        let mut conversation =
            ConversationBuilder::with_model_provider(provider.clone()).build();
        let mut frontend = ScriptedFrontend::with_inputs(&[
            "first", "second", "third", "quit",
        ]);

        conversation.run("Hi", &mut frontend).await.unwrap();

        assert_eq!(
            contents(conversation.transcript()),
            [
                (Role::User, "Hi"),
                (Role::Assistant, "Hello"),
                (Role::User, "first"),
                (Role::User, "second"),
                (Role::User, "third"),
                (Role::Assistant, "Ok"),
            ]
        );
        assert!(frontend.shown.contains(&Shown::Failed(ErrorKind::Status)));
        assert!(frontend.shown.contains(&Shown::Failed(ErrorKind::Api)));
        // The partial reply was displayed, but never committed.
        assert!(frontend.shown.contains(&Shown::Delta("Par".to_owned())));

        let requests = provider.requests();
        assert_eq!(requests.len(), 4);
        assert_eq!(requests[3].messages.len(), 5);
    }

    #[tokio::test]
    async fn test_first_turn_failure_is_returned() {
        let mut provider = TestModelProvider::default();
        provider.add_response(PresetResponse::rejected(403));
        let mut conversation =
            ConversationBuilder::with_model_provider(provider).build();
        let mut frontend = ScriptedFrontend::with_inputs(&["never read"]);

        let err = conversation.run("Hi", &mut frontend).await.unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Status);
        assert_eq!(contents(conversation.transcript()), [(Role::User, "Hi")]);
        assert_eq!(frontend.inputs.len(), 1);
        assert_eq!(
            frontend.shown,
            [Shown::Started, Shown::Failed(ErrorKind::Status)]
        );
    }

    #[tokio::test]
    async fn test_session_log_failure_is_not_fatal() {
        let mut provider = TestModelProvider::default();
        provider.add_response(reply(&["Hello"]));
        let mut conversation =
            ConversationBuilder::with_model_provider(provider)
                .with_session_log(BrokenLog)
                .build();
        let mut frontend = ScriptedFrontend::with_inputs(&["exit"]);

        conversation.run("Hi", &mut frontend).await.unwrap();

        assert_eq!(conversation.transcript().len(), 2);
    }

    #[test]
    fn test_is_exit_input() {
        assert!(is_exit_input(""));
        assert!(is_exit_input("exit"));
        assert!(is_exit_input("quit"));
        assert!(!is_exit_input("Exit"));
        assert!(!is_exit_input("exit now"));
    }
}
