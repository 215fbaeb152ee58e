//! SubagentManager - live helper agents keyed by a memorable id

use std::collections::BTreeMap;

use rand::seq::IndexedRandom;
use tracing::{debug, info};

pub const ADJECTIVES: [&str; 24] = [
    "swift", "bright", "calm", "bold", "keen", "warm", "cool", "quick", "sharp", "soft", "wild", "wise", "gold",
    "silver", "red", "blue", "green", "dark", "light", "fresh", "snap", "crisp", "prime", "grand",
];

pub const NOUNS: [&str; 24] = [
    "pony", "wolf", "hawk", "bear", "fox", "owl", "deer", "lion", "tiger", "eagle", "raven", "spark", "storm",
    "river", "flame", "frost", "stone", "cloud", "star", "moon", "wind", "wave", "peak", "brook",
];

/// Random draws before falling back to a numbered id
const MAX_DRAWS: usize = 64;

/// Registry of active subagents
///
/// Disposal only forgets an instance; work already running on it is not
/// cancelled.
pub struct SubagentManager<T> {
    active: BTreeMap<String, T>,
}

impl<T> Default for SubagentManager<T> {
    fn default() -> Self {
        Self { active: BTreeMap::new() }
    }
}

impl<T> SubagentManager<T> {
    pub fn new() -> Self {
        Self::default()
    }

    fn generate_id(&self) -> String {
        let mut rng = rand::rng();
        let mut last = String::new();
        for _ in 0..MAX_DRAWS {
            let adjective = ADJECTIVES.choose(&mut rng).copied().unwrap_or("swift");
            let noun = NOUNS.choose(&mut rng).copied().unwrap_or("pony");
            let id = format!("{}-{}", adjective, noun);
            if !self.active.contains_key(&id) {
                return id;
            }
            last = id;
        }

        // The word space is nearly exhausted
        (2..)
            .map(|n| format!("{}-{}", last, n))
            .find(|id| !self.active.contains_key(id))
            .unwrap_or(last)
    }

    /// Track `instance` under a fresh id
    pub fn register(&mut self, instance: T) -> String {
        let id = self.generate_id();
        info!(subagent_id = %id, "Registered subagent");
        self.active.insert(id.clone(), instance);
        id
    }

    pub fn get(&self, id: &str) -> Option<&T> {
        self.active.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut T> {
        self.active.get_mut(id)
    }

    /// Forget one subagent; false when the id is unknown
    pub fn dispose(&mut self, id: &str) -> bool {
        debug!(subagent_id = %id, "SubagentManager::dispose: called");
        let removed = self.active.remove(id).is_some();
        if removed {
            info!(subagent_id = %id, "Disposed subagent");
        }
        removed
    }

    /// Forget every subagent, returning how many there were
    pub fn dispose_all(&mut self) -> usize {
        let count = self.active.len();
        if count > 0 {
            info!(%count, "Disposing active subagents");
            self.active.clear();
        }
        count
    }

    /// Active ids in sorted order
    pub fn list_active_ids(&self) -> Vec<String> {
        self.active.keys().cloned().collect()
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }
}
