//! Guest Session
//!
//! Owns the backend client for the signed-in guest. A context is created when the session
//! starts, reconnected when the access token changes and disposed on logout.

use std::{fmt, sync::Arc};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Who the current session belongs to. Used to scope realtime topics and queries.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GuestIdentity {
    /// Hotel the guest is staying at.
    pub hotel_id: String,

    /// Guest record id.
    pub guest_id: String,

    /// Room the guest is staying in, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_number: Option<String>,
}

impl GuestIdentity {
    /// Create an identity without a room number.
    pub fn new(hotel_id: impl Into<String>, guest_id: impl Into<String>) -> Self {
        Self {
            hotel_id: hotel_id.into(),
            guest_id: guest_id.into(),
            room_number: None,
        }
    }

    /// Attach the guest's room number.
    #[must_use]
    pub fn with_room_number(mut self, room_number: impl Into<String>) -> Self {
        self.room_number = Some(room_number.into());
        self
    }

    /// Filter matching rows belonging to this hotel.
    pub fn hotel_filter(&self) -> String {
        format!("hotel_id=eq.{}", self.hotel_id)
    }

    /// Filter matching rows belonging to this guest only.
    pub fn guest_filter(&self) -> String {
        format!("guest_id=eq.{}", self.guest_id)
    }
}

/// Builds backend clients authenticated with a session token.
pub trait BackendConnector {
    /// Client type handed to queries and subscriptions.
    type Client;

    /// Connect with `token`.
    fn connect(&self, token: &str) -> Self::Client;
}

/// Backend client and identity for one signed-in guest.
///
/// There is no global client: callers pass the context (or its client) to whatever needs
/// backend access.
pub struct SessionContext<C: BackendConnector> {
    connector: C,
    token: String,
    identity: GuestIdentity,
    client: Arc<C::Client>,
}

impl<C: BackendConnector> SessionContext<C> {
    /// Start a session, connecting a client with `token`.
    pub fn start(connector: C, token: impl Into<String>, identity: GuestIdentity) -> Self {
        let token = token.into();
        let client = Arc::new(connector.connect(&token));

        info!(
            hotel_id = %identity.hotel_id,
            guest_id = %identity.guest_id,
            "guest session started"
        );

        Self {
            connector,
            token,
            identity,
            client,
        }
    }

    /// Swap in a refreshed access token.
    ///
    /// Reconnects and returns `true` only when the token actually changed. Clients
    /// handed out earlier keep working with the old token until dropped.
    pub fn replace_token(&mut self, token: impl Into<String>) -> bool {
        let token = token.into();

        if token == self.token {
            debug!(guest_id = %self.identity.guest_id, "session token unchanged");

            return false;
        }

        self.client = Arc::new(self.connector.connect(&token));
        self.token = token;

        info!(guest_id = %self.identity.guest_id, "session token replaced");

        true
    }

    /// Current access token.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Session owner.
    pub fn identity(&self) -> &GuestIdentity {
        &self.identity
    }

    /// Shared backend client.
    pub fn client(&self) -> Arc<C::Client> {
        Arc::clone(&self.client)
    }

    /// End the session, returning the identity it belonged to.
    pub fn dispose(self) -> GuestIdentity {
        info!(guest_id = %self.identity.guest_id, "guest session disposed");

        self.identity
    }
}

impl<C: BackendConnector> fmt::Debug for SessionContext<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionContext")
            .field("token", &"<redacted>")
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}
