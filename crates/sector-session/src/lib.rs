//! Player sessions for the Arcane Sector server.
//!
//! This crate sits between the connection tasks and the world loop:
//!
//! 1. **Authentication**: checking the `ENTR` password ([`Authenticator`])
//! 2. **Ownership**: which connection currently owns each player slot
//!    ([`SessionBridge`]), with takeover on a second login
//! 3. **Character creation**: one character per slot, created once even
//!    under racing logins ([`CharacterRoster`])
//!
//! ```text
//! World loop (above)  ← told about ownership changes, posts outbound packets
//!     ↕
//! Session layer (this crate)
//!     ↕
//! Connection tasks (below)  ← authenticate, acquire, release
//! ```

#![allow(async_fn_in_trait)]

mod auth;
mod bridge;
mod connection;
mod error;
mod roster;

pub use auth::{Authenticator, PasswordAuthenticator, sha256_hex};
pub use bridge::{SessionBridge, SessionChange, SessionListener};
pub use connection::{ConnectionHandle, Outbox};
pub use error::SessionError;
pub use roster::{CharacterProfile, CharacterRoster, Creation};
