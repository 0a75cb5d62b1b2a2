use std::collections::HashMap;

use aiaa_core::domain::chat::ChatId;
use aiaa_core::flows::{
    FlowAction, FlowEvent, FlowTransitionError, FlowType, TransitionOutcome, WizardSession,
};
use thiserror::Error;
use tokio::sync::Mutex;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("a {} wizard is already active for this chat", .0.label())]
    AlreadyActive(FlowType),
    #[error("no wizard is active for this chat")]
    NotActive,
    #[error(transparent)]
    Transition(#[from] FlowTransitionError),
}

/// Active wizards keyed by chat. An entry exists only while a wizard is
/// mid-flight; reaching a terminal state removes it.
#[derive(Default)]
pub struct WizardSessions {
    active: Mutex<HashMap<ChatId, WizardSession>>,
}

impl WizardSessions {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn start(&self, chat: ChatId, flow: FlowType) -> Result<Vec<FlowAction>, SessionError> {
        let mut active = self.active.lock().await;
        if let Some(existing) = active.get(&chat) {
            return Err(SessionError::AlreadyActive(existing.flow));
        }

        let (session, actions) = WizardSession::start(flow);
        active.insert(chat, session);
        Ok(actions)
    }

    pub async fn current(&self, chat: ChatId) -> Option<WizardSession> {
        self.active.lock().await.get(&chat).cloned()
    }

    pub async fn is_active(&self, chat: ChatId) -> bool {
        self.active.lock().await.contains_key(&chat)
    }

    /// Applies `event` to the chat's wizard. A rejected event leaves the
    /// session as it was.
    pub async fn advance(
        &self,
        chat: ChatId,
        event: FlowEvent,
    ) -> Result<TransitionOutcome, SessionError> {
        let mut active = self.active.lock().await;
        let session = active.get_mut(&chat).ok_or(SessionError::NotActive)?;
        let outcome = session.advance(event)?;
        if session.is_finished() {
            active.remove(&chat);
        }
        Ok(outcome)
    }

    pub async fn cancel(&self, chat: ChatId) -> Result<TransitionOutcome, SessionError> {
        self.advance(chat, FlowEvent::CancelRequested).await
    }

    pub async fn len(&self) -> usize {
        self.active.lock().await.len()
    }
}
