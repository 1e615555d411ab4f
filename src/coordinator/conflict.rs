use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConflictKind {
    Resource,
    Decision,
    Dependency,
    Timeout,
}

/// Arbitrated outcome of a [`Conflict`] (spec §3/§4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Resolution {
    Agent1,
    Agent2,
    Both,
    Neither,
    Error,
}

/// A contested resource between two agents (spec §3), retained in the
/// coordinator's conflict log until the coordinator itself is dropped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conflict {
    pub id: Uuid,
    pub kind: ConflictKind,
    pub agent1_id: Uuid,
    pub agent1_name: String,
    pub agent2_id: Uuid,
    pub agent2_name: String,
    pub resource_id: String,
    pub resource_type: Option<String>,
    pub agent1_action: String,
    pub agent2_action: String,
    pub resolution: Option<Resolution>,
    pub created_at: DateTime<Utc>,
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Conflict {
    #[allow(clippy::too_many_arguments)]
    pub fn new_resource(
        agent1_id: Uuid,
        agent1_name: String,
        agent1_action: String,
        agent2_id: Uuid,
        agent2_name: String,
        resource_id: String,
        agent2_action: String,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: ConflictKind::Resource,
            agent1_id,
            agent1_name,
            agent2_id,
            agent2_name,
            resource_id,
            resource_type: None,
            agent1_action,
            agent2_action,
            resolution: None,
            created_at: Utc::now(),
            resolved_at: None,
        }
    }
}
