//! SQL text utilities: identifier/literal quoting and deterministic
//! object-name conventions shared by the catalog and the DDL renderer.

use std::fmt;

/// A PostgreSQL string literal wrapper.
///
/// Display writes the value escaped and quoted with single quotes.
///
/// # Example
/// ```
/// use plat_sql::Lit;
/// assert_eq!(format!("{}", Lit("email")), "'email'");
/// assert_eq!(format!("{}", Lit("it's")), "'it''s'");
/// ```
pub struct Lit<T: AsRef<str>>(pub T);

impl<T: AsRef<str>> fmt::Display for Lit<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'")?;
        for c in self.0.as_ref().chars() {
            if c == '\'' {
                write!(f, "''")?;
            } else {
                write!(f, "{}", c)?;
            }
        }
        write!(f, "'")
    }
}

/// A PostgreSQL identifier wrapper.
///
/// Display writes the value escaped and quoted with double quotes.
///
/// # Example
/// ```
/// use plat_sql::Ident;
/// assert_eq!(format!("{}", Ident("user")), "\"user\"");
/// assert_eq!(format!("{}", Ident("bla\"h")), "\"bla\"\"h\"");
/// ```
pub struct Ident<T: AsRef<str>>(pub T);

impl<T: AsRef<str>> fmt::Display for Ident<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"")?;
        for c in self.0.as_ref().chars() {
            if c == '"' {
                write!(f, "\"\"")?;
            } else {
                write!(f, "{}", c)?;
            }
        }
        write!(f, "\"")
    }
}

/// Escape a string literal for SQL.
pub fn escape_string(s: &str) -> String {
    format!("{}", Lit(s))
}

/// Quote a PostgreSQL identifier.
///
/// Always quotes to avoid issues with reserved keywords like `user`,
/// `order`, `group`, etc. Doubles any embedded quotes.
pub fn quote_ident(name: &str) -> String {
    format!("{}", Ident(name))
}

/// Postgres truncates identifiers beyond this many bytes.
pub const PG_IDENT_MAX: usize = 63;

/// Generate a standard index name for an entity and columns.
///
/// Uses the convention `idx_{entity}_{columns}` with columns joined by
/// underscore.
///
/// # Examples
///
/// ```
/// assert_eq!(plat_sql::index_name("properties", &["user_id"]), "idx_properties_user_id");
/// assert_eq!(
///     plat_sql::index_name("api_usage", &["user_id", "created_at"]),
///     "idx_api_usage_user_id_created_at",
/// );
/// ```
pub fn index_name(entity: &str, columns: &[impl AsRef<str>]) -> String {
    let cols: Vec<&str> = columns.iter().map(|c| c.as_ref()).collect();
    format!("idx_{}_{}", entity, cols.join("_"))
}

/// Generate a standard unique index name for an entity and columns.
///
/// Uses the convention `uq_{entity}_{columns}`.
///
/// # Examples
///
/// ```
/// assert_eq!(plat_sql::unique_index_name("users", &["email"]), "uq_users_email");
/// ```
pub fn unique_index_name(entity: &str, columns: &[impl AsRef<str>]) -> String {
    let cols: Vec<&str> = columns.iter().map(|c| c.as_ref()).collect();
    format!("uq_{}_{}", entity, cols.join("_"))
}

/// Generate a standard row-access policy name for an entity and operation.
///
/// Uses the convention `pol_{entity}_{operation}` with the operation in
/// lowercase.
///
/// # Examples
///
/// ```
/// assert_eq!(plat_sql::policy_name("properties", "select"), "pol_properties_select");
/// assert_eq!(plat_sql::policy_name("saved_searches", "all"), "pol_saved_searches_all");
/// ```
pub fn policy_name(entity: &str, operation: &str) -> String {
    format!("pol_{}_{}", entity, operation.to_lowercase())
}

/// Generate a deterministic CHECK constraint name for an entity and expression.
///
/// Constraint names must be unique within a schema, so the name combines the
/// entity with a stable hash of the expression (whitespace-normalized first,
/// so reformatting the predicate does not rename the constraint). The entity
/// part is clamped so the result never exceeds Postgres' identifier limit.
pub fn check_constraint_name(entity: &str, expr: &str) -> String {
    let normalized = normalize_expr(expr);
    let hex = blake3::hash(normalized.as_bytes()).to_hex().to_string();
    let suffix = &hex[..16];

    let overhead = "ck__".len() + suffix.len();
    let max_entity_len = PG_IDENT_MAX.saturating_sub(overhead);

    let entity_part = if entity.len() <= max_entity_len {
        entity
    } else {
        // Entity names are expected to be ASCII snake_case; still, avoid
        // splitting UTF-8.
        let mut len = max_entity_len.min(entity.len());
        while len > 0 && !entity.is_char_boundary(len) {
            len -= 1;
        }
        &entity[..len]
    };

    format!("ck_{}_{}", entity_part, suffix)
}

/// Collapse runs of whitespace to single spaces and trim the ends.
///
/// Good enough for hashing: predicates that differ only in formatting hash
/// to the same constraint name. String literals containing runs of spaces
/// would collide, which is harmless for naming purposes.
fn normalize_expr(expr: &str) -> String {
    let mut out = String::with_capacity(expr.len());
    let mut pending_space = false;
    for c in expr.chars() {
        if c.is_whitespace() {
            pending_space = true;
        } else {
            if pending_space && !out.is_empty() {
                out.push(' ');
            }
            pending_space = false;
            out.push(c);
        }
    }
    out
}
