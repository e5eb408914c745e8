//! Which player slots already have a character.
//!
//! Character creation happens on connection tasks, before the world loop
//! has seen the player. Two connections for the same slot can both get
//! `NOPC` and both answer `MYPC`; the roster lets exactly one of them
//! create the character and tells the other it already exists.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use sector_protocol::PlayerId;
use tracing::{debug, info};

/// Name and portrait chosen in `MYPC`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacterProfile {
    pub player: PlayerId,
    pub name: String,
    pub portrait: u8,
}

/// Result of [`CharacterRoster::create`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Creation {
    /// The caller created the character.
    Created(CharacterProfile),
    /// Someone else got there first; this is the winner's profile.
    Existing(CharacterProfile),
}

impl Creation {
    pub fn profile(&self) -> &CharacterProfile {
        match self {
            Self::Created(p) | Self::Existing(p) => p,
        }
    }

    pub fn is_new(&self) -> bool {
        matches!(self, Self::Created(_))
    }
}

/// Thread-safe table of created characters.
#[derive(Debug, Default)]
pub struct CharacterRoster {
    characters: Mutex<HashMap<PlayerId, CharacterProfile>>,
}

impl CharacterRoster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn exists(&self, player: PlayerId) -> bool {
        self.lock().contains_key(&player)
    }

    pub fn get(&self, player: PlayerId) -> Option<CharacterProfile> {
        self.lock().get(&player).cloned()
    }

    /// Creates the character unless one exists. Idempotent.
    pub fn create(&self, player: PlayerId, name: impl Into<String>, portrait: u8) -> Creation {
        let mut characters = self.lock();
        if let Some(existing) = characters.get(&player) {
            debug!(%player, "character already created");
            return Creation::Existing(existing.clone());
        }
        let profile = CharacterProfile {
            player,
            name: name.into(),
            portrait,
        };
        characters.insert(player, profile.clone());
        info!(%player, name = %profile.name, "character created");
        Creation::Created(profile)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<PlayerId, CharacterProfile>> {
        self.characters.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;

    #[test]
    fn test_second_create_returns_first_profile() {
        let roster = CharacterRoster::new();
        assert!(!roster.exists(PlayerId(2)));
        let first = roster.create(PlayerId(2), "Vex", 1);
        let second = roster.create(PlayerId(2), "Imposter", 9);
        assert!(first.is_new());
        assert!(!second.is_new());
        assert_eq!(second.profile().name, "Vex");
        assert_eq!(roster.len(), 1);
    }

    #[test]
    fn test_concurrent_create_has_one_winner() {
        let roster = Arc::new(CharacterRoster::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let roster = Arc::clone(&roster);
                std::thread::spawn(move || roster.create(PlayerId(5), format!("pc{i}"), i).is_new())
            })
            .collect();
        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
        assert_eq!(roster.len(), 1);
    }
}
