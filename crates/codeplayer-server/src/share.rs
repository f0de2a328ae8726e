//! Snippet sharing.
//!
//! A snippet is a saved copy of the three buffers under a short share id.

use std::sync::{PoisonError, RwLock};

use chrono::{DateTime, Utc};
use codeplayer_core::SourceBuffers;
use rand::Rng;
use rand::distributions::Alphanumeric;
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::{ServerError, ServerResult};

/// Length of a freshly generated share id.
pub const SHARE_ID_LENGTH: usize = 7;

/// Collisions tolerated at one length before the id grows by a character.
const MAX_ATTEMPTS_PER_LENGTH: usize = 10;

/// A saved snippet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snippet {
    pub share_id: String,
    pub sources: SourceBuffers,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Storage for shared snippets.
pub trait SnippetStore: Send + Sync {
    /// Save `sources`.
    ///
    /// With `share_id` the existing snippet is overwritten; an unknown id is
    /// [`ServerError::SnippetNotFound`]. Without one, a new share id is
    /// generated.
    fn save(&self, sources: SourceBuffers, share_id: Option<&str>) -> ServerResult<Snippet>;

    /// Load the snippet stored under `share_id`.
    fn load(&self, share_id: &str) -> ServerResult<Snippet>;
}

/// In-process snippet store. Contents are lost on restart.
#[derive(Debug, Default)]
pub struct MemorySnippetStore {
    snippets: RwLock<FxHashMap<String, Snippet>>,
}

impl MemorySnippetStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.snippets.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SnippetStore for MemorySnippetStore {
    fn save(&self, sources: SourceBuffers, share_id: Option<&str>) -> ServerResult<Snippet> {
        let mut snippets = self.snippets.write().unwrap_or_else(PoisonError::into_inner);
        let now = Utc::now();

        if let Some(share_id) = share_id {
            let snippet = snippets
                .get_mut(share_id)
                .ok_or_else(|| ServerError::SnippetNotFound(share_id.to_string()))?;
            snippet.sources = sources;
            snippet.updated_at = now;
            tracing::debug!("Updated snippet {}", share_id);
            return Ok(snippet.clone());
        }

        let share_id = unique_share_id(&mut rand::thread_rng(), |id| snippets.contains_key(id));
        let snippet = Snippet {
            share_id: share_id.clone(),
            sources,
            created_at: now,
            updated_at: now,
        };
        snippets.insert(share_id, snippet.clone());
        tracing::debug!("Created snippet {}", snippet.share_id);
        Ok(snippet)
    }

    fn load(&self, share_id: &str) -> ServerResult<Snippet> {
        self.snippets
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(share_id)
            .cloned()
            .ok_or_else(|| ServerError::SnippetNotFound(share_id.to_string()))
    }
}

/// Random share id of `length` characters from `[a-zA-Z0-9]`.
pub fn generate_share_id(rng: &mut impl Rng, length: usize) -> String {
    rng.sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

/// Generate a share id for which `taken` is false.
///
/// Tries [`MAX_ATTEMPTS_PER_LENGTH`] ids at each length, starting from
/// [`SHARE_ID_LENGTH`], before growing the id by one character.
pub fn unique_share_id(rng: &mut impl Rng, taken: impl Fn(&str) -> bool) -> String {
    let mut length = SHARE_ID_LENGTH;
    loop {
        for _ in 0..MAX_ATTEMPTS_PER_LENGTH {
            let candidate = generate_share_id(rng, length);
            if !taken(&candidate) {
                return candidate;
            }
        }
        tracing::debug!("Share id space crowded at length {}, growing", length);
        length += 1;
    }
}
