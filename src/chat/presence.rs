use std::collections::HashMap;

use tokio::sync::RwLock;

/// Users with at least one live connection. A user with two tabs open stays
/// online until both disconnect. Lives only in memory.
#[derive(Debug, Default)]
pub struct Presence {
    connections: RwLock<HashMap<String, usize>>,
}

impl Presence {
    /// Records a new connection for `user_id` and returns the online set.
    pub async fn connect(&self, user_id: &str) -> Vec<String> {
        let mut connections = self.connections.write().await;
        *connections.entry(user_id.to_owned()).or_default() += 1;
        sorted_ids(&connections)
    }

    /// Drops one connection of `user_id` and returns the online set.
    pub async fn disconnect(&self, user_id: &str) -> Vec<String> {
        let mut connections = self.connections.write().await;
        if let Some(count) = connections.get_mut(user_id) {
            *count -= 1;
            if *count == 0 {
                connections.remove(user_id);
            }
        }
        sorted_ids(&connections)
    }

    pub async fn is_online(&self, user_id: &str) -> bool {
        self.connections.read().await.contains_key(user_id)
    }
}

fn sorted_ids(connections: &HashMap<String, usize>) -> Vec<String> {
    let mut ids: Vec<String> = connections.keys().cloned().collect();
    ids.sort();
    ids
}
