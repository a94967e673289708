//! Whole-program translation into the target language.

use tracing::debug;

use crate::execution::{Language, TierError};
use crate::gateway::{strip_code_fences, ChatMessage, ChatRequest, ModelGateway};

pub struct Translator<G> {
    gateway: G,
}

impl<G: ModelGateway> Translator<G> {
    pub fn new(gateway: G) -> Self {
        Self { gateway }
    }

    /// Translate `source`, written in `from`, into `to`. JSON mode is off;
    /// the reply is the program text, optionally fenced.
    pub async fn translate(&self, source: &str, from: &str, to: Language) -> Result<String, TierError> {
        let system = format!(
            "Translate the {from} program into an equivalent, idiomatic, complete {to} program \
a beginner can read. Keep the behaviour and the output identical. Reply with the code only."
        );
        let request = ChatRequest::new(vec![ChatMessage::system(system), ChatMessage::user(source)]);
        let reply = self.gateway.complete(request).await?;

        let code = strip_code_fences(&reply);
        if code.trim().is_empty() {
            return Err(TierError::malformed("translation reply is empty"));
        }
        debug!(from, to = %to, lines = code.lines().count(), "Translated source");
        Ok(code.to_string())
    }
}
