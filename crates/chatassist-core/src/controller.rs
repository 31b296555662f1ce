//! Conversation controller
//!
//! Owns the session and is the only code that mutates the transcript. A turn
//! runs in two phases so a UI loop can keep the network call off its own
//! task:
//!
//! 1. `begin_submit` / `begin_commit_edit` validate, mutate the transcript and
//!    move to `AwaitingCompletion`, handing back a [`PendingTurn`].
//! 2. `complete_turn` appends the reply (or the fixed error text) and always
//!    returns to `Idle`.
//!
//! `submit` and `commit_edit` run both phases back to back for callers that
//! can simply await.

use std::sync::Arc;

use crate::ai::CompletionClient;
use crate::error::ChatError;
use crate::persona::{greeting, Persona, PersonaRegistry};
use crate::state::{ControllerState, MessageId, Sender};
use crate::transcript::Transcript;

/// Assistant text shown for any failed completion
pub const ERROR_REPLY: &str = "Sorry, I encountered an error. Please try again later.";

/// Identifies one in-flight completion request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TurnId(u64);

/// Everything needed to issue the completion call for a started turn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTurn {
    pub id: TurnId,
    pub system_prompt: String,
    pub user_text: String,
}

#[derive(Debug, Clone)]
pub struct Session {
    active_persona: Persona,
    transcript: Transcript,
    pending: Option<TurnId>,
}

impl Session {
    fn start(persona: Persona) -> Self {
        let mut transcript = Transcript::new();
        transcript.reset(greeting(&persona));
        Self {
            active_persona: persona,
            transcript,
            pending: None,
        }
    }

    pub fn active_persona(&self) -> &Persona {
        &self.active_persona
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn state(&self) -> ControllerState {
        if self.pending.is_some() {
            ControllerState::AwaitingCompletion
        } else {
            ControllerState::Idle
        }
    }
}

pub struct ConversationController {
    client: Arc<dyn CompletionClient>,
    registry: PersonaRegistry,
    session: Session,
    editing: Option<MessageId>,
    next_turn: u64,
}

impl ConversationController {
    /// Start a session with `persona_id`, or the default persona if unknown
    pub fn new(
        client: Arc<dyn CompletionClient>,
        registry: PersonaRegistry,
        persona_id: &str,
    ) -> Self {
        let persona = *registry.get_or_default(persona_id);
        tracing::info!(persona = persona.id, client = client.name(), "Session started");

        Self {
            client,
            registry,
            session: Session::start(persona),
            editing: None,
            next_turn: 0,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn transcript(&self) -> &Transcript {
        &self.session.transcript
    }

    pub fn state(&self) -> ControllerState {
        self.session.state()
    }

    pub fn is_busy(&self) -> bool {
        self.state() == ControllerState::AwaitingCompletion
    }

    pub fn active_persona(&self) -> &Persona {
        &self.session.active_persona
    }

    pub fn personas(&self) -> &PersonaRegistry {
        &self.registry
    }

    pub fn editing(&self) -> Option<MessageId> {
        self.editing
    }

    pub fn client(&self) -> Arc<dyn CompletionClient> {
        Arc::clone(&self.client)
    }

    /// Swap the completion backend, e.g. after a new API key was entered
    pub fn set_client(&mut self, client: Arc<dyn CompletionClient>) -> Result<(), ChatError> {
        self.ensure_idle("replace client")?;
        self.client = client;
        Ok(())
    }

    fn ensure_idle(&self, action: &str) -> Result<(), ChatError> {
        if self.is_busy() {
            tracing::info!(action, "Rejected while a reply is pending");
            return Err(ChatError::Busy);
        }
        Ok(())
    }

    fn start_turn(&mut self, user_text: &str) -> PendingTurn {
        let id = TurnId(self.next_turn);
        self.next_turn += 1;
        self.session.pending = Some(id);

        PendingTurn {
            id,
            system_prompt: self.session.active_persona.system_prompt.to_string(),
            user_text: user_text.to_string(),
        }
    }

    pub fn begin_submit(&mut self, text: &str) -> Result<PendingTurn, ChatError> {
        self.ensure_idle("submit")?;
        if text.trim().is_empty() {
            return Err(ChatError::invalid_argument("message is empty"));
        }

        let id = self.session.transcript.append(Sender::User, text);
        tracing::debug!(message = %id, "User message appended, awaiting completion");
        Ok(self.start_turn(text))
    }

    /// Mark a user message as the one being edited and return its text
    pub fn begin_edit(&mut self, id: MessageId) -> Result<String, ChatError> {
        let message = self
            .session
            .transcript
            .get(id)
            .filter(|m| m.is_user())
            .ok_or_else(|| ChatError::not_found(format!("user message {}", id)))?;

        self.editing = Some(id);
        Ok(message.text.clone())
    }

    pub fn cancel_edit(&mut self) {
        self.editing = None;
    }

    pub fn begin_commit_edit(
        &mut self,
        id: MessageId,
        new_text: &str,
    ) -> Result<PendingTurn, ChatError> {
        self.ensure_idle("commit edit")?;

        let before = self.session.transcript.len();
        if let Err(err) = self.session.transcript.edit_user_message(id, new_text) {
            tracing::info!(message = %id, error = %err, "Edit rejected");
            return Err(err);
        }

        tracing::debug!(
            message = %id,
            dropped = before - self.session.transcript.len(),
            "User message edited, transcript truncated"
        );
        self.editing = None;
        Ok(self.start_turn(new_text))
    }

    /// Deliver the completion result for `turn`.
    ///
    /// Returns the id of the appended assistant message, or `None` when `turn`
    /// is not the pending request.
    pub fn complete_turn(
        &mut self,
        turn: TurnId,
        result: Result<String, ChatError>,
    ) -> Option<MessageId> {
        if self.session.pending != Some(turn) {
            tracing::warn!(?turn, "Ignoring completion for a turn that is not pending");
            return None;
        }
        Some(self.finish_turn(result))
    }

    fn finish_turn(&mut self, result: Result<String, ChatError>) -> MessageId {
        let text = match result {
            Ok(text) => text,
            Err(err) => {
                tracing::warn!(error = %err, "Completion failed, appending error reply");
                ERROR_REPLY.to_string()
            }
        };

        let id = self.session.transcript.append(Sender::Assistant, text);
        self.session.pending = None;
        tracing::debug!(message = %id, "Assistant reply appended, idle");
        id
    }

    /// Issue the completion call for a started turn and apply its result.
    /// Returns `None` if `turn` is no longer the pending one.
    async fn run_turn(&mut self, turn: PendingTurn) -> Option<MessageId> {
        let client = Arc::clone(&self.client);
        let result = client.complete(&turn.system_prompt, &turn.user_text).await;
        self.complete_turn(turn.id, result)
    }

    async fn run_started_turn(&mut self, turn: PendingTurn) -> Result<MessageId, ChatError> {
        let id = turn.id;
        self.run_turn(turn)
            .await
            .ok_or_else(|| ChatError::not_found(format!("pending turn {:?}", id)))
    }

    pub async fn submit(&mut self, text: &str) -> Result<MessageId, ChatError> {
        let turn = self.begin_submit(text)?;
        self.run_started_turn(turn).await
    }

    pub async fn commit_edit(
        &mut self,
        id: MessageId,
        new_text: &str,
    ) -> Result<MessageId, ChatError> {
        let turn = self.begin_commit_edit(id, new_text)?;
        self.run_started_turn(turn).await
    }

    /// Activate a persona and start a fresh transcript with its greeting.
    ///
    /// Rejected while a reply is pending so a late reply can't land in the new
    /// session. Unknown ids fall back to the default persona.
    pub fn switch_persona(&mut self, persona_id: &str) -> Result<&Persona, ChatError> {
        self.ensure_idle("switch persona")?;

        let persona = *self.registry.get_or_default(persona_id);
        self.session.active_persona = persona;
        self.session.transcript.reset(greeting(&persona));
        self.editing = None;

        tracing::info!(persona = persona.id, "Persona switched, transcript reset");
        Ok(&self.session.active_persona)
    }
}
