/// Secret string types that redact values in debug output for security.
pub use secrecy::{ExposeSecret, SecretString};
use serde::Serializer;
/// UUID type used for player identifiers and API keys.
pub use uuid::Uuid;

use crate::Result;
use crate::error::Error;

/// Longest username the game accepts.
const MAX_USERNAME_LENGTH: usize = 16;

/// Identity presented to the server in every `Identify` request.
///
/// All three parts are checked in [`Identity::new`] so that a malformed identity fails before
/// any connection attempt is made.
#[derive(Clone, Debug)]
pub struct Identity {
    pub(crate) uuid: Uuid,
    pub(crate) username: String,
    pub(crate) api_key: SecretString,
}

impl Identity {
    /// Validates and builds an identity.
    ///
    /// The checks are stricter than the server's own: the username must be 1 to 16 ASCII
    /// letters, digits or underscores, and the API key must be a UUID. A malformed value is
    /// rejected here rather than by a 4002 close after connecting.
    ///
    /// # Errors
    ///
    /// Returns a [`crate::error::Kind::Validation`] error when the UUID does not parse, the
    /// username is not a valid player name, or the API key is not a UUID.
    pub fn new(uuid: &str, username: &str, api_key: &str) -> Result<Self> {
        let uuid = Uuid::parse_str(uuid.trim()).map_err(|_e| Error::validation("Malformed UUID"))?;

        let username = username.trim();
        if username.is_empty()
            || username.len() > MAX_USERNAME_LENGTH
            || !username
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            return Err(Error::validation("Malformed Username"));
        }

        let api_key = api_key.trim();
        if Uuid::parse_str(api_key).is_err() {
            return Err(Error::validation("Malformed Hypixel API Key"));
        }

        Ok(Self {
            uuid,
            username: username.to_owned(),
            api_key: SecretString::from(api_key.to_owned()),
        })
    }

    /// Returns the player UUID.
    #[must_use]
    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    /// Returns the player username.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Returns the API key.
    #[must_use]
    pub fn api_key(&self) -> &SecretString {
        &self.api_key
    }
}

/// Writes a secret in plaintext. Only used when encoding the `Identify` request.
pub(crate) fn serialize_secret<S: Serializer>(
    secret: &SecretString,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}
