//! Live-state introspection.
//!
//! A [`LiveState`] is a snapshot of what the backend already contains, read
//! from the system catalogs. The planner only ever compares names against
//! it; it never inspects live column shapes.

use crate::error::Error;
use crate::plan::{Action, ActionKind};
use crate::traced::TracedClient;
use plat_schema::PolicyOp;
use std::collections::BTreeSet;
use std::time::Duration;

/// Snapshot of the backend's schema objects.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LiveState {
    /// Existing table names
    pub entities: BTreeSet<String>,
    /// Existing index names
    pub indexes: BTreeSet<String>,
    /// Existing policies, as (entity, operation)
    pub policies: BTreeSet<(String, PolicyOp)>,
    /// Entities with row-level enforcement already enabled
    pub enforcement: BTreeSet<String>,
}

impl LiveState {
    /// An empty snapshot: nothing exists yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold a successfully applied action into the snapshot.
    ///
    /// Replanning against the updated snapshot yields exactly the actions
    /// that have not been applied yet.
    pub fn record(&mut self, action: &Action) {
        match &action.kind {
            ActionKind::CreateEntity(entity) => {
                self.entities.insert(entity.name.clone());
            }
            ActionKind::CreateIndex(idx) => {
                self.indexes.insert(idx.name.clone());
            }
            ActionKind::EnableRowSecurity { entity } => {
                self.enforcement.insert(entity.clone());
            }
            ActionKind::CreatePolicy(policy) => {
                self.policies
                    .insert((policy.entity.clone(), policy.operation));
            }
        }
    }
}

/// Read a [`LiveState`] from the backend, bounded by `timeout`.
///
/// On timeout no snapshot is returned at all - a partial or guessed
/// snapshot would let the planner re-create objects that already exist
/// under non-idempotent statements, so this fails closed.
pub async fn introspect(client: &TracedClient, timeout: Duration) -> Result<LiveState, Error> {
    match tokio::time::timeout(timeout, snapshot(client)).await {
        Ok(state) => state,
        Err(_) => Err(Error::IntrospectionTimeout { timeout }),
    }
}

async fn snapshot(client: &TracedClient) -> Result<LiveState, Error> {
    let mut live = LiveState::new();

    let rows = client
        .query(
            "SELECT tablename FROM pg_catalog.pg_tables WHERE schemaname = 'public'",
            &[],
        )
        .await?;
    for row in rows {
        live.entities.insert(row.get(0));
    }

    let rows = client
        .query(
            "SELECT indexname FROM pg_catalog.pg_indexes WHERE schemaname = 'public'",
            &[],
        )
        .await?;
    for row in rows {
        live.indexes.insert(row.get(0));
    }

    let rows = client
        .query(
            "SELECT tablename, cmd FROM pg_catalog.pg_policies WHERE schemaname = 'public'",
            &[],
        )
        .await?;
    for row in rows {
        let entity: String = row.get(0);
        let cmd: String = row.get(1);
        match PolicyOp::from_pg_cmd(&cmd) {
            Some(op) => {
                live.policies.insert((entity, op));
            }
            None => {
                tracing::warn!(entity = %entity, cmd = %cmd, "ignoring policy with unknown command");
            }
        }
    }

    let rows = client
        .query(
            "SELECT c.relname FROM pg_catalog.pg_class c \
             JOIN pg_catalog.pg_namespace n ON n.oid = c.relnamespace \
             WHERE n.nspname = 'public' AND c.relkind = 'r' AND c.relrowsecurity",
            &[],
        )
        .await?;
    for row in rows {
        live.enforcement.insert(row.get(0));
    }

    Ok(live)
}
