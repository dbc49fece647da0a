//! Schema reconciliation planner for Postgres-compatible backends.
//!
//! This crate provides:
//! - Validated, immutable catalogs of entities, indexes, and row-access
//!   policies ([`Catalog`])
//! - Live-state introspection with a hard timeout ([`introspect`])
//! - A pure planner that diffs catalog against live state ([`Catalog::plan`])
//! - DDL rendering, one idempotent statement per action
//!
//! The planner never executes anything. Whoever requested the [`Plan`] owns
//! it and decides whether to display it, export it, or hand it to an
//! executor - and because each action is guarded by the live-state check
//! (and `IF NOT EXISTS` where the backend supports it), a partially applied
//! plan is resumed by simply planning again.
//!
//! ```ignore
//! let catalog = Catalog::builder()
//!     .entity(
//!         EntityDef::new("users")
//!             .column(Column::new("id", ColumnType::BigSerial).primary_key())
//!             .column(Column::new("email", ColumnType::VarChar(255)).not_null().unique()),
//!     )
//!     .load()?;
//!
//! let client = TracedClient::connect(&database_url).await?;
//! let live = introspect(&client, Duration::from_secs(10)).await?;
//! let plan = catalog.plan(&live, PlanOptions::default());
//! println!("{}", plan.to_sql());
//! ```

mod catalog;
mod ddl;
mod error;
mod introspect;
mod plan;
mod traced;

pub use catalog::{Catalog, CatalogBuilder, LoadError};
pub use ddl::{create_index_sql, create_policy_sql, create_table_sql, enable_row_security_sql};
pub use error::Error;
pub use introspect::{LiveState, introspect};
pub use plan::{Action, ActionKind, Plan, PlanOptions};
pub use traced::TracedClient;

// Re-export the schema value types
pub use plat_schema::{
    AccessPolicy, Column, ColumnType, EntityDef, ForeignKey, IndexDef, IndexKind, IndexMethod,
    PolicyOp,
};

/// Result type for plat operations.
pub type Result<T> = std::result::Result<T, Error>;
