//! Password check for the `ENTR` handshake.
//!
//! The server never stores passwords. Each player slot has a configured
//! SHA-256 hex digest; the password from `ENTR` is hashed and compared.
//! The [`Authenticator`] trait keeps the check swappable (tests use an
//! accept-everyone implementation).

use std::collections::HashMap;

use sector_protocol::PlayerId;
use sha2::{Digest, Sha256};

use crate::SessionError;

/// Validates the credential a client presented for a player slot.
///
/// `Send + Sync + 'static` because one instance is shared by every
/// connection task for the lifetime of the server.
///
/// # Example
///
/// ```rust
/// use sector_protocol::PlayerId;
/// use sector_session::{Authenticator, SessionError};
///
/// /// Lets anyone in. Development only.
/// struct OpenDoor;
///
/// impl Authenticator for OpenDoor {
///     async fn authenticate(
///         &self,
///         _player: PlayerId,
///         _password: &[u8],
///     ) -> Result<(), SessionError> {
///         Ok(())
///     }
/// }
/// ```
pub trait Authenticator: Send + Sync + 'static {
    /// Returns `Ok(())` if `password` unlocks `player`.
    fn authenticate(
        &self,
        player: PlayerId,
        password: &[u8],
    ) -> impl std::future::Future<Output = Result<(), SessionError>> + Send;
}

/// Lowercase hex SHA-256 of `bytes`.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut h = Sha256::new();
    h.update(bytes);
    let out = h.finalize();
    let mut s = String::with_capacity(out.len() * 2);
    for x in out {
        s.push_str(&format!("{x:02x}"));
    }
    s
}

/// Compares SHA-256 digests of the presented password against a table of
/// configured digests, one per player slot.
#[derive(Debug, Clone, Default)]
pub struct PasswordAuthenticator {
    digests: HashMap<PlayerId, String>,
}

impl PasswordAuthenticator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the table from configured `(player, hex digest)` pairs.
    ///
    /// # Errors
    /// [`SessionError::InvalidDigest`] if a digest is not 64 hex digits.
    pub fn from_digests<I, S>(digests: I) -> Result<Self, SessionError>
    where
        I: IntoIterator<Item = (PlayerId, S)>,
        S: AsRef<str>,
    {
        let mut auth = Self::new();
        for (player, digest) in digests {
            auth.insert_digest(player, digest.as_ref())?;
        }
        Ok(auth)
    }

    /// Sets the digest for `player`. Accepts either case.
    pub fn insert_digest(&mut self, player: PlayerId, digest: &str) -> Result<(), SessionError> {
        if digest.len() != 64 {
            return Err(SessionError::InvalidDigest {
                player,
                reason: format!("expected 64 hex digits, got {}", digest.len()),
            });
        }
        if let Some(c) = digest.chars().find(|c| !c.is_ascii_hexdigit()) {
            return Err(SessionError::InvalidDigest {
                player,
                reason: format!("unexpected character {c:?}"),
            });
        }
        self.digests.insert(player, digest.to_ascii_lowercase());
        Ok(())
    }

    /// Hashes `password` and stores it for `player`.
    pub fn with_password(mut self, player: PlayerId, password: &[u8]) -> Self {
        self.digests.insert(player, sha256_hex(password));
        self
    }

    pub fn len(&self) -> usize {
        self.digests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.digests.is_empty()
    }
}

impl Authenticator for PasswordAuthenticator {
    async fn authenticate(&self, player: PlayerId, password: &[u8]) -> Result<(), SessionError> {
        let expected = self
            .digests
            .get(&player)
            .ok_or(SessionError::UnknownPlayer(player))?;
        if sha256_hex(password) == *expected {
            Ok(())
        } else {
            Err(SessionError::AuthFailed(player))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_hex_known_vector() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[tokio::test]
    async fn test_password_accepted_and_rejected() {
        let auth = PasswordAuthenticator::new().with_password(PlayerId(3), b"hunter2");
        assert!(auth.authenticate(PlayerId(3), b"hunter2").await.is_ok());
        assert!(matches!(
            auth.authenticate(PlayerId(3), b"hunter3").await,
            Err(SessionError::AuthFailed(PlayerId(3)))
        ));
        assert!(matches!(
            auth.authenticate(PlayerId(4), b"hunter2").await,
            Err(SessionError::UnknownPlayer(PlayerId(4)))
        ));
    }

    #[tokio::test]
    async fn test_uppercase_digest_matches() {
        let digest = sha256_hex(b"pw").to_ascii_uppercase();
        let auth = PasswordAuthenticator::from_digests([(PlayerId(0), digest)]).unwrap();
        assert!(auth.authenticate(PlayerId(0), b"pw").await.is_ok());
    }

    #[test]
    fn test_malformed_digests_rejected() {
        assert!(matches!(
            PasswordAuthenticator::from_digests([(PlayerId(1), "abcd")]),
            Err(SessionError::InvalidDigest { .. })
        ));
        let bad = "z".repeat(64);
        assert!(PasswordAuthenticator::from_digests([(PlayerId(1), bad)]).is_err());
    }
}
