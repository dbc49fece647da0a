//! The built-in catalog: the real-estate data store.
//!
//! Nine entities keyed to a `users` root, with the derived indexes and
//! owner-column row-access policies the backend is expected to carry.
//! Everything here is declaration only; validation happens in
//! [`Catalog::builder`]'s load step.

use plat::{
    AccessPolicy, Catalog, Column, ColumnType, EntityDef, IndexDef, LoadError, PolicyOp,
};

/// Subscriber accounts; every other entity hangs off `users.id`.
fn users() -> EntityDef {
    EntityDef::new("users")
        .column(Column::new("id", ColumnType::BigSerial).primary_key())
        .column(Column::new("email", ColumnType::VarChar(255)).not_null().unique())
        .column(Column::new("full_name", ColumnType::VarChar(255)))
        .column(
            Column::new("role", ColumnType::VarChar(50))
                .default_expr("'subscriber'")
                .check("role IN ('subscriber', 'agent', 'admin')"),
        )
        .column(Column::new("created_at", ColumnType::Timestamptz).default_expr("NOW()"))
        .column(Column::new("updated_at", ColumnType::Timestamptz).default_expr("NOW()"))
}

/// One row per property-search API call, for quota and latency accounting.
fn api_usage() -> EntityDef {
    EntityDef::new("api_usage")
        .column(Column::new("id", ColumnType::BigSerial).primary_key())
        .column(Column::new("user_id", ColumnType::Integer).not_null())
        .column(Column::new("query", ColumnType::Text).not_null())
        .column(Column::new("query_type", ColumnType::VarChar(50)).default_expr("'property_search'"))
        .column(Column::new("created_at", ColumnType::Timestamptz).default_expr("NOW()"))
        .column(Column::new("metadata", ColumnType::Jsonb).default_expr("'{}'"))
        .column(
            Column::new("response_time_ms", ColumnType::Integer).check("response_time_ms >= 0"),
        )
        .column(Column::new("success", ColumnType::Boolean).default_expr("TRUE"))
        .column(Column::new("error_message", ColumnType::Text))
        .foreign_key("user_id", "users", "id")
}

/// Saved property listings. The listing payload itself is a document
/// (`data`), deduplicated by `property_hash`.
fn properties() -> EntityDef {
    EntityDef::new("properties")
        .column(Column::new("id", ColumnType::BigSerial).primary_key())
        .column(Column::new("user_id", ColumnType::Integer).not_null())
        .column(Column::new("property_hash", ColumnType::VarChar(32)).unique())
        .column(Column::new("data", ColumnType::Jsonb).not_null())
        .column(Column::new("search_params", ColumnType::Jsonb).default_expr("'{}'"))
        .column(Column::new("created_at", ColumnType::Timestamptz).default_expr("NOW()"))
        .column(Column::new("updated_at", ColumnType::Timestamptz).default_expr("NOW()"))
        .column(Column::new("is_favorite", ColumnType::Boolean).default_expr("FALSE"))
        .column(Column::new("notes", ColumnType::Text))
        .column(Column::new("tags", ColumnType::TextArray).default_expr("ARRAY[]::TEXT[]"))
        .foreign_key("user_id", "users", "id")
}

/// One session record per user, upserted on login.
fn user_sessions() -> EntityDef {
    EntityDef::new("user_sessions")
        .column(Column::new("id", ColumnType::BigSerial).primary_key())
        .column(Column::new("user_id", ColumnType::Integer).not_null().unique())
        .column(Column::new("user_data", ColumnType::Jsonb).not_null())
        .column(Column::new("last_login", ColumnType::Timestamptz).default_expr("NOW()"))
        .column(Column::new("session_count", ColumnType::Integer).default_expr("1"))
        .column(Column::new("preferences", ColumnType::Jsonb).default_expr("'{}'"))
        .column(Column::new("created_at", ColumnType::Timestamptz).default_expr("NOW()"))
        .column(Column::new("updated_at", ColumnType::Timestamptz).default_expr("NOW()"))
        .foreign_key("user_id", "users", "id")
}

/// Price/inventory alert subscriptions.
fn market_alerts() -> EntityDef {
    EntityDef::new("market_alerts")
        .column(Column::new("id", ColumnType::BigSerial).primary_key())
        .column(Column::new("user_id", ColumnType::Integer).not_null())
        .column(Column::new("alert_name", ColumnType::VarChar(255)).not_null())
        .column(Column::new("alert_type", ColumnType::VarChar(50)).not_null())
        .column(Column::new("location", ColumnType::VarChar(255)))
        .column(Column::new("criteria", ColumnType::Jsonb).not_null())
        .column(
            Column::new("threshold", ColumnType::Numeric { precision: 10, scale: 2 })
                .check("threshold >= 0"),
        )
        .column(
            Column::new("notification_method", ColumnType::VarChar(20)).default_expr("'email'"),
        )
        .column(Column::new("is_active", ColumnType::Boolean).default_expr("TRUE"))
        .column(Column::new("last_triggered", ColumnType::Timestamptz))
        .column(Column::new("created_at", ColumnType::Timestamptz).default_expr("NOW()"))
        .column(Column::new("updated_at", ColumnType::Timestamptz).default_expr("NOW()"))
        .foreign_key("user_id", "users", "id")
}

/// Side-by-side comparison sets over saved properties.
fn property_comparisons() -> EntityDef {
    EntityDef::new("property_comparisons")
        .column(Column::new("id", ColumnType::BigSerial).primary_key())
        .column(Column::new("user_id", ColumnType::Integer).not_null())
        .column(Column::new("comparison_name", ColumnType::VarChar(255)))
        .column(Column::new("property_ids", ColumnType::IntegerArray).not_null())
        .column(Column::new("comparison_data", ColumnType::Jsonb))
        .column(Column::new("created_at", ColumnType::Timestamptz).default_expr("NOW()"))
        .column(Column::new("updated_at", ColumnType::Timestamptz).default_expr("NOW()"))
        .foreign_key("user_id", "users", "id")
}

fn user_preferences() -> EntityDef {
    EntityDef::new("user_preferences")
        .column(Column::new("id", ColumnType::BigSerial).primary_key())
        .column(Column::new("user_id", ColumnType::Integer).not_null().unique())
        .column(Column::new("notifications", ColumnType::Jsonb).default_expr("'{}'"))
        .column(Column::new("display_settings", ColumnType::Jsonb).default_expr("'{}'"))
        .column(Column::new("api_settings", ColumnType::Jsonb).default_expr("'{}'"))
        .column(Column::new("created_at", ColumnType::Timestamptz).default_expr("NOW()"))
        .column(Column::new("updated_at", ColumnType::Timestamptz).default_expr("NOW()"))
        .foreign_key("user_id", "users", "id")
}

/// Daily rollup of portfolio value and cash flow per user.
fn portfolio_analytics() -> EntityDef {
    EntityDef::new("portfolio_analytics")
        .column(Column::new("id", ColumnType::BigSerial).primary_key())
        .column(Column::new("user_id", ColumnType::Integer).not_null())
        .column(Column::new("calculation_date", ColumnType::Date).default_expr("CURRENT_DATE"))
        .column(Column::new("total_properties", ColumnType::Integer).default_expr("0"))
        .column(
            Column::new("total_value", ColumnType::Numeric { precision: 15, scale: 2 })
                .default_expr("0"),
        )
        .column(
            Column::new("total_monthly_rent", ColumnType::Numeric { precision: 10, scale: 2 })
                .default_expr("0"),
        )
        .column(
            Column::new("average_cap_rate", ColumnType::Numeric { precision: 5, scale: 2 })
                .default_expr("0"),
        )
        .column(
            Column::new("total_cash_flow", ColumnType::Numeric { precision: 10, scale: 2 })
                .default_expr("0"),
        )
        .column(Column::new("metrics", ColumnType::Jsonb).default_expr("'{}'"))
        .column(Column::new("created_at", ColumnType::Timestamptz).default_expr("NOW()"))
        .foreign_key("user_id", "users", "id")
}

/// Saved search criteria, optionally re-run with notification.
fn saved_searches() -> EntityDef {
    EntityDef::new("saved_searches")
        .column(Column::new("id", ColumnType::BigSerial).primary_key())
        .column(Column::new("user_id", ColumnType::Integer).not_null())
        .column(Column::new("search_name", ColumnType::VarChar(255)).not_null())
        .column(Column::new("search_criteria", ColumnType::Jsonb).not_null())
        .column(Column::new("auto_notify", ColumnType::Boolean).default_expr("FALSE"))
        .column(Column::new("last_run", ColumnType::Timestamptz))
        .column(Column::new("results_count", ColumnType::Integer).default_expr("0"))
        .column(Column::new("created_at", ColumnType::Timestamptz).default_expr("NOW()"))
        .column(Column::new("updated_at", ColumnType::Timestamptz).default_expr("NOW()"))
        .foreign_key("user_id", "users", "id")
}

/// Build and validate the full catalog.
pub fn estate() -> Result<Catalog, LoadError> {
    Catalog::builder()
        .entity(users())
        .entity(api_usage())
        .entity(properties())
        .entity(user_sessions())
        .entity(market_alerts())
        .entity(property_comparisons())
        .entity(user_preferences())
        .entity(portfolio_analytics())
        .entity(saved_searches())
        // api_usage: per-user and time-window scans, plus a failure drill-down
        .index(IndexDef::plain("api_usage", "user_id"))
        .index(IndexDef::plain("api_usage", "created_at"))
        .index(
            IndexDef::partial("api_usage", "created_at", "NOT success")
                .with_name("idx_api_usage_failures"),
        )
        // properties: listing lookups, whole-document and tag containment,
        // decoded price range scans, favorites
        .index(IndexDef::plain("properties", "user_id"))
        .index(IndexDef::plain("properties", "data"))
        .index(IndexDef::array("properties", "tags"))
        .index(IndexDef::expression(
            "idx_properties_price",
            "properties",
            "(data->>'price')::numeric",
        ))
        .index(
            IndexDef::partial("properties", "user_id", "is_favorite")
                .with_name("idx_properties_favorites"),
        )
        .index(IndexDef::composite("properties", ["user_id", "created_at"]))
        // market_alerts: the notifier only ever walks active alerts
        .index(IndexDef::plain("market_alerts", "user_id"))
        .index(
            IndexDef::partial("market_alerts", "user_id", "is_active")
                .with_name("idx_market_alerts_active"),
        )
        // property_comparisons: membership lookups over the compared set
        .index(IndexDef::plain("property_comparisons", "user_id"))
        .index(IndexDef::array("property_comparisons", "property_ids"))
        // portfolio_analytics: one rollup per user per day
        .index(IndexDef::composite("portfolio_analytics", ["user_id", "calculation_date"]))
        // saved_searches: per-user listing, criteria containment, and one
        // name per user
        .index(IndexDef::plain("saved_searches", "user_id"))
        .index(IndexDef::plain("saved_searches", "search_criteria"))
        .index(IndexDef::unique_composite("saved_searches", ["user_id", "search_name"]))
        // row visibility: per-operation on properties, blanket elsewhere
        .policy(AccessPolicy::owner("properties", PolicyOp::Read, "user_id"))
        .policy(AccessPolicy::owner("properties", PolicyOp::Insert, "user_id"))
        .policy(AccessPolicy::owner("properties", PolicyOp::Update, "user_id"))
        .policy(AccessPolicy::owner("properties", PolicyOp::Delete, "user_id"))
        .policy(AccessPolicy::owner("api_usage", PolicyOp::All, "user_id"))
        .policy(AccessPolicy::owner("user_sessions", PolicyOp::All, "user_id"))
        .policy(AccessPolicy::owner("market_alerts", PolicyOp::All, "user_id"))
        .policy(AccessPolicy::owner("property_comparisons", PolicyOp::All, "user_id"))
        .policy(AccessPolicy::owner("user_preferences", PolicyOp::All, "user_id"))
        .policy(AccessPolicy::owner("portfolio_analytics", PolicyOp::All, "user_id"))
        .policy(AccessPolicy::owner("saved_searches", PolicyOp::All, "user_id"))
        .load()
}
