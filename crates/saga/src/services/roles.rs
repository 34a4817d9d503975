//! User role promotion and reversal.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::AggregateId;

use crate::services::ServiceError;

/// The role every user starts with.
pub const DEFAULT_ROLE: &str = "backer";

/// Trait for user role management.
#[async_trait]
pub trait RoleService: Send + Sync {
    /// Promotes a user to a role, returning the role they held before.
    async fn promote(&self, user_id: AggregateId, to_role: &str) -> Result<String, ServiceError>;

    /// Reverts a user to an earlier role.
    async fn revert(&self, user_id: AggregateId, to_role: &str) -> Result<(), ServiceError>;
}

#[derive(Debug, Default)]
struct InMemoryRoleState {
    roles: HashMap<AggregateId, String>,
    fail_on_promote: bool,
}

/// In-memory role service for testing.
#[derive(Debug, Clone, Default)]
pub struct InMemoryRoleService {
    state: Arc<RwLock<InMemoryRoleState>>,
}

impl InMemoryRoleService {
    /// Creates a new role service where every user is a backer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the service to fail on the next promote call.
    pub fn set_fail_on_promote(&self, fail: bool) {
        self.state.write().unwrap().fail_on_promote = fail;
    }

    /// Returns the role a user currently holds.
    pub fn role_of(&self, user_id: AggregateId) -> String {
        self.state
            .read()
            .unwrap()
            .roles
            .get(&user_id)
            .cloned()
            .unwrap_or_else(|| DEFAULT_ROLE.to_string())
    }
}

#[async_trait]
impl RoleService for InMemoryRoleService {
    async fn promote(&self, user_id: AggregateId, to_role: &str) -> Result<String, ServiceError> {
        let mut state = self.state.write().unwrap();

        if state.fail_on_promote {
            return Err(ServiceError::new("role service unavailable"));
        }

        let previous = state
            .roles
            .insert(user_id, to_role.to_string())
            .unwrap_or_else(|| DEFAULT_ROLE.to_string());
        Ok(previous)
    }

    async fn revert(&self, user_id: AggregateId, to_role: &str) -> Result<(), ServiceError> {
        let mut state = self.state.write().unwrap();
        state.roles.insert(user_id, to_role.to_string());
        Ok(())
    }
}
