//! Concurrent map from user id to [`UserState`].

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::state::UserState;

/// In-place edit of one user's state, applied under the store's write lock.
pub type Mutation<'a> = Box<dyn FnOnce(&mut UserState) + Send + 'a>;

/// Storage for conversation states.
///
/// Every operation is atomic with respect to the others; readers get a copy,
/// never a view into a state another task is changing.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn get(&self, user_id: i64) -> Option<UserState>;

    /// Replace the state and refresh its activity time.
    async fn set(&self, user_id: i64, state: UserState);

    /// Returns whether a state was removed.
    async fn delete(&self, user_id: i64) -> bool;

    /// Returns the state and whether it was created by this call.
    async fn get_or_create(&self, user_id: i64) -> (UserState, bool);

    /// Apply `mutation` to the user's state, creating it first if needed.
    /// Returns whether the state was created by this call.
    async fn update<'a>(&self, user_id: i64, mutation: Mutation<'a>) -> bool;

    /// Drop every state idle for longer than `timeout` as of `now`.
    async fn evict_idle(&self, now: DateTime<Utc>, timeout: TimeDelta) -> Vec<i64>;

    async fn len(&self) -> usize;
}

#[derive(Default)]
pub struct MemorySessionStore {
    states: RwLock<HashMap<i64, UserState>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn get(&self, user_id: i64) -> Option<UserState> {
        self.states.read().await.get(&user_id).cloned()
    }

    async fn set(&self, user_id: i64, mut state: UserState) {
        state.touch();
        self.states.write().await.insert(user_id, state);
    }

    async fn delete(&self, user_id: i64) -> bool {
        self.states.write().await.remove(&user_id).is_some()
    }

    async fn get_or_create(&self, user_id: i64) -> (UserState, bool) {
        if let Some(state) = self.states.read().await.get(&user_id) {
            return (state.clone(), false);
        }

        // Another task may have created it between the two locks
        let mut states = self.states.write().await;
        let mut created = false;
        let state = states.entry(user_id).or_insert_with(|| {
            created = true;
            UserState::new()
        });
        (state.clone(), created)
    }

    async fn update<'a>(&self, user_id: i64, mutation: Mutation<'a>) -> bool {
        let mut states = self.states.write().await;
        let mut created = false;
        let state = states.entry(user_id).or_insert_with(|| {
            created = true;
            UserState::new()
        });
        mutation(state);
        state.touch();
        created
    }

    async fn evict_idle(&self, now: DateTime<Utc>, timeout: TimeDelta) -> Vec<i64> {
        let cutoff = now - timeout;
        let mut states = self.states.write().await;

        let expired: Vec<i64> = states
            .iter()
            .filter(|(_, state)| state.is_idle_since(cutoff))
            .map(|(user_id, _)| *user_id)
            .collect();

        for user_id in &expired {
            states.remove(user_id);
        }

        expired
    }

    async fn len(&self) -> usize {
        self.states.read().await.len()
    }
}
