//! DDL rendering.
//!
//! Every generator here emits exactly one statement, in the idempotent
//! `IF NOT EXISTS` form where the backend supports it, so a plan can be
//! re-applied after a partial failure without tripping over what already
//! succeeded.

use plat_schema::{AccessPolicy, Column, EntityDef, IndexDef, IndexKind, IndexMethod, PolicyOp};
use plat_sql::{check_constraint_name, quote_ident};

/// Generate a CREATE TABLE statement.
///
/// Foreign keys are inlined as table constraints: the planner orders entity
/// creation by declaration, and validation guarantees declaration order
/// satisfies every reference.
pub fn create_table_sql(entity: &EntityDef) -> String {
    let mut sql = format!("CREATE TABLE IF NOT EXISTS {} (\n", quote_ident(&entity.name));

    let mut parts: Vec<String> = entity.columns.iter().map(column_def).collect();

    for col in &entity.columns {
        if let Some(check) = &col.check {
            parts.push(format!(
                "    CONSTRAINT {} CHECK ({})",
                quote_ident(&check_constraint_name(&entity.name, check)),
                check
            ));
        }
    }

    for fk in &entity.foreign_keys {
        parts.push(format!(
            "    CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({})",
            quote_ident(&format!("{}_{}_fkey", entity.name, fk.column)),
            quote_ident(&fk.column),
            quote_ident(&fk.references_entity),
            quote_ident(&fk.references_column)
        ));
    }

    sql.push_str(&parts.join(",\n"));
    sql.push_str("\n);");
    sql
}

fn column_def(col: &Column) -> String {
    let mut def = format!("    {} {}", quote_ident(&col.name), col.col_type);

    if col.primary_key {
        def.push_str(" PRIMARY KEY");
    }

    // PRIMARY KEY already implies NOT NULL
    if !col.nullable && !col.primary_key {
        def.push_str(" NOT NULL");
    }

    if col.unique && !col.primary_key {
        def.push_str(" UNIQUE");
    }

    if let Some(default) = &col.default {
        def.push_str(&format!(" DEFAULT {}", default));
    }

    def
}

/// Generate a CREATE INDEX statement.
pub fn create_index_sql(idx: &IndexDef) -> String {
    let unique = if idx.unique { "UNIQUE " } else { "" };

    let using = match idx.method {
        IndexMethod::BTree => "",
        IndexMethod::Gin => " USING GIN",
    };

    let (target, filter) = match &idx.kind {
        IndexKind::Plain { column } | IndexKind::Array { column } => {
            (quote_ident(column), None)
        }
        IndexKind::Partial { column, filter } => (quote_ident(column), Some(filter.as_str())),
        IndexKind::Expression { expr } => (format!("({})", expr), None),
        IndexKind::Composite { columns } => (
            columns
                .iter()
                .map(|c| quote_ident(c))
                .collect::<Vec<_>>()
                .join(", "),
            None,
        ),
    };

    let where_clause = filter
        .map(|f| format!(" WHERE {}", f))
        .unwrap_or_default();

    format!(
        "CREATE {}INDEX IF NOT EXISTS {} ON {}{} ({}){};",
        unique,
        quote_ident(&idx.name),
        quote_ident(&idx.entity),
        using,
        target,
        where_clause
    )
}

/// Generate the statement that switches an entity to row-level enforcement.
///
/// Re-running this on an already-enforcing entity is a no-op.
pub fn enable_row_security_sql(entity: &str) -> String {
    format!(
        "ALTER TABLE {} ENABLE ROW LEVEL SECURITY;",
        quote_ident(entity)
    )
}

/// Generate a CREATE POLICY statement.
///
/// Read-side operations render `USING`, insert renders `WITH CHECK`, and
/// update/all need both.
pub fn create_policy_sql(policy: &AccessPolicy) -> String {
    let clauses = match policy.operation {
        PolicyOp::Read | PolicyOp::Delete => format!("USING ({})", policy.predicate),
        PolicyOp::Insert => format!("WITH CHECK ({})", policy.predicate),
        PolicyOp::Update | PolicyOp::All => {
            format!("USING ({0}) WITH CHECK ({0})", policy.predicate)
        }
    };

    format!(
        "CREATE POLICY {} ON {} FOR {} {};",
        quote_ident(&policy.name),
        quote_ident(&policy.entity),
        policy.operation.as_sql(),
        clauses
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use plat_schema::ColumnType;

    #[test]
    fn test_create_table_sql() {
        let entity = EntityDef::new("users")
            .column(Column::new("id", ColumnType::BigSerial).primary_key())
            .column(Column::new("email", ColumnType::VarChar(255)).not_null().unique())
            .column(Column::new("created_at", ColumnType::Timestamptz).default_expr("now()"));

        assert_eq!(
            create_table_sql(&entity),
            "CREATE TABLE IF NOT EXISTS \"users\" (\n\
             \x20   \"id\" BIGSERIAL PRIMARY KEY,\n\
             \x20   \"email\" VARCHAR(255) NOT NULL UNIQUE,\n\
             \x20   \"created_at\" TIMESTAMPTZ DEFAULT now()\n\
             );"
        );
    }

    #[test]
    fn test_create_table_sql_with_foreign_key() {
        let entity = EntityDef::new("saved_searches")
            .column(Column::new("id", ColumnType::BigSerial).primary_key())
            .column(Column::new("user_id", ColumnType::Integer).not_null())
            .foreign_key("user_id", "users", "id");

        let sql = create_table_sql(&entity);
        assert!(sql.contains(
            "CONSTRAINT \"saved_searches_user_id_fkey\" FOREIGN KEY (\"user_id\") REFERENCES \"users\" (\"id\")"
        ));
    }

    #[test]
    fn test_create_table_sql_names_check_constraints() {
        let entity = EntityDef::new("market_alerts")
            .column(Column::new("id", ColumnType::BigSerial).primary_key())
            .column(
                Column::new("threshold", ColumnType::Numeric { precision: 10, scale: 2 })
                    .check("threshold >= 0"),
            );

        let sql = create_table_sql(&entity);
        assert!(sql.contains("CONSTRAINT \"ck_market_alerts_"));
        assert!(sql.contains("CHECK (threshold >= 0)"));
    }

    #[test]
    fn test_create_index_sql_plain() {
        let idx = IndexDef::plain("properties", "user_id");
        assert_eq!(
            create_index_sql(&idx),
            "CREATE INDEX IF NOT EXISTS \"idx_properties_user_id\" ON \"properties\" (\"user_id\");"
        );
    }

    #[test]
    fn test_create_index_sql_unique() {
        let idx = IndexDef::plain("users", "email").with_name("uq_users_email").unique();
        assert_eq!(
            create_index_sql(&idx),
            "CREATE UNIQUE INDEX IF NOT EXISTS \"uq_users_email\" ON \"users\" (\"email\");"
        );
    }

    #[test]
    fn test_create_index_sql_partial() {
        let idx = IndexDef::partial("market_alerts", "user_id", "is_active")
            .with_name("idx_market_alerts_active");
        assert_eq!(
            create_index_sql(&idx),
            "CREATE INDEX IF NOT EXISTS \"idx_market_alerts_active\" ON \"market_alerts\" (\"user_id\") WHERE is_active;"
        );
    }

    #[test]
    fn test_create_index_sql_gin() {
        let mut idx = IndexDef::plain("properties", "data");
        idx.method = IndexMethod::Gin;
        assert_eq!(
            create_index_sql(&idx),
            "CREATE INDEX IF NOT EXISTS \"idx_properties_data\" ON \"properties\" USING GIN (\"data\");"
        );
    }

    #[test]
    fn test_create_index_sql_expression() {
        let idx = IndexDef::expression(
            "idx_properties_price",
            "properties",
            "(data->>'price')::numeric",
        );
        assert_eq!(
            create_index_sql(&idx),
            "CREATE INDEX IF NOT EXISTS \"idx_properties_price\" ON \"properties\" (((data->>'price')::numeric));"
        );
    }

    #[test]
    fn test_create_index_sql_composite() {
        let idx = IndexDef::composite("portfolio_analytics", ["user_id", "calculation_date"]);
        assert_eq!(
            create_index_sql(&idx),
            "CREATE INDEX IF NOT EXISTS \"idx_portfolio_analytics_user_id_calculation_date\" \
             ON \"portfolio_analytics\" (\"user_id\", \"calculation_date\");"
        );
    }

    #[test]
    fn test_enable_row_security_sql() {
        assert_eq!(
            enable_row_security_sql("properties"),
            "ALTER TABLE \"properties\" ENABLE ROW LEVEL SECURITY;"
        );
    }

    #[test]
    fn test_create_policy_sql_per_operation() {
        let read = AccessPolicy::owner("properties", PolicyOp::Read, "user_id");
        assert_eq!(
            create_policy_sql(&read),
            "CREATE POLICY \"pol_properties_select\" ON \"properties\" FOR SELECT \
             USING (user_id = current_setting('app.user_id')::bigint);"
        );

        let insert = AccessPolicy::owner("properties", PolicyOp::Insert, "user_id");
        assert_eq!(
            create_policy_sql(&insert),
            "CREATE POLICY \"pol_properties_insert\" ON \"properties\" FOR INSERT \
             WITH CHECK (user_id = current_setting('app.user_id')::bigint);"
        );

        let all = AccessPolicy::owner("saved_searches", PolicyOp::All, "user_id");
        assert_eq!(
            create_policy_sql(&all),
            "CREATE POLICY \"pol_saved_searches_all\" ON \"saved_searches\" FOR ALL \
             USING (user_id = current_setting('app.user_id')::bigint) \
             WITH CHECK (user_id = current_setting('app.user_id')::bigint);"
        );
    }
}
