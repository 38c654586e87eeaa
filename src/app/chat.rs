//! Chat flow — log the user turn, get a reply, log the assistant turn.

use crate::store::Role;

use super::App;
use super::personas::system_prompt;
use super::ui::LogLevel;

impl App {
    /// Run one conversational turn for `message`.
    ///
    /// Store failures are reported and the turn carries on. A responder
    /// failure abandons the turn; the already-logged user turn stays in the
    /// store but not in the in-memory history.
    pub(crate) fn handle_chat_message(&mut self, message: &str) {
        let session_id = self.session.session_id().to_string();
        let persona = self.session.persona().to_string();

        if let Err(err) = self.runtime.block_on(self.session.record_turn(
            &session_id,
            Role::User,
            message,
            &persona,
        )) {
            self.warn_store_error("user message", &err);
        }

        let prompt = system_prompt(&persona, self.responder.tools_available());
        let reply = self.runtime.block_on(self.responder.reply(
            &prompt,
            self.session.history(),
            message,
        ));
        let reply = match reply {
            Ok(reply) => reply,
            Err(err) => {
                tracing::debug!(error = ?err, "responder failed");
                self.log(LogLevel::Error, format!("⚠️  Error: {err:#}"));
                return;
            }
        };

        if let Err(err) = self.runtime.block_on(self.session.record_turn(
            &session_id,
            Role::Assistant,
            &reply,
            &persona,
        )) {
            self.warn_store_error("assistant reply", &err);
        }

        self.session.append_exchange(message, &reply);
        self.log(LogLevel::Reply, format!("Assistant ({persona}): {reply}"));
    }

    fn warn_store_error(&mut self, what: &str, err: &crate::store::StoreError) {
        tracing::debug!(error = %err, "saving {what} failed");
        self.log(LogLevel::Warn, format!("⚠️  Error saving {what}: {err}"));
    }
}
