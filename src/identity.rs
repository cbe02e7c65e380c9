use serde::{Deserialize, Serialize};

use crate::error::SessionError;

/// The active user. Local identities are a plain chosen handle; federated
/// identities arrive from the external sign-in widget's success callback.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Identity {
    Local {
        username: String,
    },
    Federated {
        handle: String,
        avatar_ref: String,
        provider_token: String,
    },
}

impl Identity {
    pub fn display_name(&self) -> &str {
        match self {
            Identity::Local { username } => username,
            Identity::Federated { handle, .. } => handle,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GateState {
    Loading,
    Unauthenticated,
    Authenticated,
}

/// Decides whether the sign-in prompt or the main feed is shown. Starts in
/// `Loading` until the persisted identity has been read.
#[derive(Debug)]
pub struct IdentityGate {
    state: GateState,
    identity: Option<Identity>,
}

impl Default for IdentityGate {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityGate {
    pub fn new() -> Self {
        Self {
            state: GateState::Loading,
            identity: None,
        }
    }

    /// Applies the persisted identity once the startup read completes.
    pub fn hydrate(&mut self, identity: Option<Identity>) {
        self.state = match identity {
            Some(_) => GateState::Authenticated,
            None => GateState::Unauthenticated,
        };
        self.identity = identity;
    }

    pub fn sign_in_local(&mut self, raw_username: &str) -> Result<&Identity, SessionError> {
        let username = raw_username.trim();
        if username.is_empty() {
            return Err(SessionError::EmptyName);
        }

        self.state = GateState::Authenticated;
        Ok(self.identity.insert(Identity::Local {
            username: username.to_string(),
        }))
    }

    pub fn sign_in_federated(
        &mut self,
        handle: &str,
        avatar_ref: &str,
        provider_token: &str,
    ) -> Result<&Identity, SessionError> {
        let handle = handle.trim();
        if handle.is_empty() {
            return Err(SessionError::EmptyName);
        }

        self.state = GateState::Authenticated;
        Ok(self.identity.insert(Identity::Federated {
            handle: handle.to_string(),
            avatar_ref: avatar_ref.to_string(),
            provider_token: provider_token.to_string(),
        }))
    }

    /// Returns the identity that was active, if any.
    pub fn sign_out(&mut self) -> Option<Identity> {
        self.state = GateState::Unauthenticated;
        self.identity.take()
    }

    pub fn state(&self) -> GateState {
        self.state
    }

    pub fn identity(&self) -> Option<&Identity> {
        self.identity.as_ref()
    }

    pub fn display_name(&self) -> Option<&str> {
        self.identity.as_ref().map(Identity::display_name)
    }

    pub fn is_authenticated(&self) -> bool {
        self.state == GateState::Authenticated
    }
}
