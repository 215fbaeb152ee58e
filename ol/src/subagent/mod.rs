//! Subagents
//!
//! Helper conversations dispatched by the optimiser to analyse one eval
//! attempt. They live only until the next eval run.

mod agent;
mod manager;

use std::sync::Arc;

use tokio::sync::Mutex;

pub use agent::{Reply, Subagent, SubagentSettings};
pub use manager::{ADJECTIVES, NOUNS, SubagentManager};

/// Manager shared by the optimiser and the subagent handlers
pub type SubagentPool = Arc<Mutex<SubagentManager<Subagent>>>;

pub fn new_pool() -> SubagentPool {
    Arc::new(Mutex::new(SubagentManager::new()))
}
