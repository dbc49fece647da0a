//! Reconciliation planning - compare the declared catalog against live
//! backend state.
//!
//! [`Catalog::plan`] is a pure function of the catalog and a [`LiveState`]
//! snapshot: it mutates neither and never touches the backend. The result is
//! an ordered [`Plan`] whose actions satisfy two guarantees:
//!
//! - **category order**: every entity creation precedes every index
//!   creation, which precedes every policy action - an index can never be
//!   planned before the entity it targets;
//! - **declaration order within a category**: plans are deterministic and
//!   read like the catalog.
//!
//! Applying a prefix of a plan and replanning against the resulting state
//! yields exactly the unapplied remainder, so a failed apply is resumed by
//! simply running the tool again.

use crate::catalog::Catalog;
use crate::ddl;
use crate::introspect::LiveState;
use plat_schema::{AccessPolicy, EntityDef, IndexDef};
use std::fmt;

/// Caller-side switches for planning.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlanOptions {
    /// Include row-security enforcement and policy creation.
    pub enforce_policies: bool,
}

/// A single reconciliation step.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionKind {
    /// Create a missing entity.
    CreateEntity(EntityDef),
    /// Create a missing index.
    CreateIndex(IndexDef),
    /// Switch an entity to row-level enforcement.
    EnableRowSecurity { entity: String },
    /// Create a missing row-access policy.
    CreatePolicy(AccessPolicy),
}

/// An action plus whether re-applying it against a backend that already has
/// the object is harmless.
#[derive(Debug, Clone, PartialEq)]
pub struct Action {
    pub kind: ActionKind,
    pub idempotent: bool,
}

impl Action {
    /// The name of the object this action creates or alters.
    pub fn target(&self) -> &str {
        match &self.kind {
            ActionKind::CreateEntity(entity) => &entity.name,
            ActionKind::CreateIndex(idx) => &idx.name,
            ActionKind::EnableRowSecurity { entity } => entity,
            ActionKind::CreatePolicy(policy) => &policy.name,
        }
    }

    /// The entity this action belongs to.
    pub fn entity(&self) -> &str {
        match &self.kind {
            ActionKind::CreateEntity(entity) => &entity.name,
            ActionKind::CreateIndex(idx) => &idx.entity,
            ActionKind::EnableRowSecurity { entity } => entity,
            ActionKind::CreatePolicy(policy) => &policy.entity,
        }
    }

    /// Generate the single statement this action corresponds to.
    pub fn to_sql(&self) -> String {
        match &self.kind {
            ActionKind::CreateEntity(entity) => ddl::create_table_sql(entity),
            ActionKind::CreateIndex(idx) => ddl::create_index_sql(idx),
            ActionKind::EnableRowSecurity { entity } => ddl::enable_row_security_sql(entity),
            ActionKind::CreatePolicy(policy) => ddl::create_policy_sql(policy),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ActionKind::CreateEntity(entity) => {
                write!(f, "+ entity {} ({} columns)", entity.name, entity.columns.len())
            }
            ActionKind::CreateIndex(idx) => {
                write!(f, "+ index {} on {}", idx.name, idx.entity)
            }
            ActionKind::EnableRowSecurity { entity } => {
                write!(f, "~ row security on {}", entity)
            }
            ActionKind::CreatePolicy(policy) => {
                write!(
                    f,
                    "+ policy {} on {} ({})",
                    policy.name, policy.entity, policy.operation
                )
            }
        }
    }
}

/// An ordered reconciliation plan.
///
/// A value object owned by the caller that requested it; built fresh on
/// every planning request and never persisted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Plan {
    pub actions: Vec<Action>,
}

impl Plan {
    /// Returns true if the backend already matches the catalog.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Number of actions.
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Render the plan as SQL, one statement per action, in order.
    pub fn to_sql(&self) -> String {
        let mut sql = String::new();
        for (i, action) in self.actions.iter().enumerate() {
            if i > 0 {
                sql.push('\n');
            }
            sql.push_str(&action.to_sql());
            sql.push('\n');
        }
        sql
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            writeln!(f, "Nothing to apply.")?;
        } else {
            for action in &self.actions {
                writeln!(f, "  {}", action)?;
            }
        }
        Ok(())
    }
}

impl Catalog {
    /// Compute the actions needed to bring `live` up to this catalog.
    ///
    /// Pure: reads the catalog and the snapshot, touches nothing else, and
    /// cannot fail (everything that could go wrong was rejected at catalog
    /// load).
    pub fn plan(&self, live: &LiveState, opts: PlanOptions) -> Plan {
        let mut actions = Vec::new();

        for entity in self.entities() {
            if !live.entities.contains(&entity.name) {
                actions.push(Action {
                    kind: ActionKind::CreateEntity(entity.clone()),
                    idempotent: true,
                });
            }
        }

        for entity in self.entities() {
            for idx in self.indexes_for(&entity.name) {
                if !live.indexes.contains(&idx.name) {
                    actions.push(Action {
                        kind: ActionKind::CreateIndex(idx.clone()),
                        idempotent: true,
                    });
                }
            }
        }

        if opts.enforce_policies {
            for entity in self.entities() {
                let policies = self.policies_for(&entity.name);
                if policies.is_empty() {
                    continue;
                }
                if !live.enforcement.contains(&entity.name) {
                    actions.push(Action {
                        kind: ActionKind::EnableRowSecurity {
                            entity: entity.name.clone(),
                        },
                        idempotent: true,
                    });
                }
                for policy in policies {
                    let key = (policy.entity.clone(), policy.operation);
                    if !live.policies.contains(&key) {
                        // no IF NOT EXISTS form exists for policies; absence
                        // from the snapshot is what makes this safe
                        actions.push(Action {
                            kind: ActionKind::CreatePolicy(policy.clone()),
                            idempotent: false,
                        });
                    }
                }
            }
        }

        Plan { actions }
    }
}
