//! Schema value types for plat.
//!
//! This crate contains the plain-data definitions a catalog is built from:
//! entities (tables), their columns, derived indexes, and row-access
//! policies. Everything here is inert data - validation lives in the
//! catalog loader, SQL rendering in the DDL module.

use plat_sql::{index_name, policy_name, unique_index_name};
use std::fmt;

/// Column types understood by the reconciler.
///
/// A closed set: anything the catalog declares must be one of these, which
/// lets validation and rendering match exhaustively instead of dispatching
/// on type strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    /// INTEGER (4 bytes)
    Integer,
    /// BIGINT (8 bytes)
    BigInt,
    /// BIGSERIAL (8 bytes, auto-incrementing)
    BigSerial,
    /// BOOLEAN
    Boolean,
    /// TEXT
    Text,
    /// VARCHAR(n)
    VarChar(u32),
    /// NUMERIC(precision, scale)
    Numeric { precision: u8, scale: u8 },
    /// TIMESTAMPTZ
    Timestamptz,
    /// DATE
    Date,
    /// JSONB
    Jsonb,
    /// TEXT[]
    TextArray,
    /// INTEGER[]
    IntegerArray,
}

impl ColumnType {
    /// Whether this is an array type.
    pub fn is_array(&self) -> bool {
        matches!(self, ColumnType::TextArray | ColumnType::IntegerArray)
    }

    /// Whether this is a semi-structured document type.
    pub fn is_json(&self) -> bool {
        matches!(self, ColumnType::Jsonb)
    }
}

impl fmt::Display for ColumnType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnType::Integer => write!(f, "INTEGER"),
            ColumnType::BigInt => write!(f, "BIGINT"),
            ColumnType::BigSerial => write!(f, "BIGSERIAL"),
            ColumnType::Boolean => write!(f, "BOOLEAN"),
            ColumnType::Text => write!(f, "TEXT"),
            ColumnType::VarChar(n) => write!(f, "VARCHAR({})", n),
            ColumnType::Numeric { precision, scale } => {
                write!(f, "NUMERIC({},{})", precision, scale)
            }
            ColumnType::Timestamptz => write!(f, "TIMESTAMPTZ"),
            ColumnType::Date => write!(f, "DATE"),
            ColumnType::Jsonb => write!(f, "JSONB"),
            ColumnType::TextArray => write!(f, "TEXT[]"),
            ColumnType::IntegerArray => write!(f, "INTEGER[]"),
        }
    }
}

/// A column definition.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    /// Column name
    pub name: String,
    /// Column type
    pub col_type: ColumnType,
    /// Whether the column allows NULL
    pub nullable: bool,
    /// Default value expression (if any)
    pub default: Option<String>,
    /// Whether this is the primary identity column
    pub primary_key: bool,
    /// Whether this has a unique constraint
    pub unique: bool,
    /// CHECK constraint predicate (if any)
    pub check: Option<String>,
}

impl Column {
    /// Create a nullable column with no constraints.
    pub fn new(name: impl Into<String>, col_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            col_type,
            nullable: true,
            default: None,
            primary_key: false,
            unique: false,
            check: None,
        }
    }

    /// Mark this column as the primary identity (implies NOT NULL).
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }

    /// Mark this column NOT NULL.
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// Add a unique constraint.
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Set the default value expression.
    pub fn default_expr(mut self, expr: impl Into<String>) -> Self {
        self.default = Some(expr.into());
        self
    }

    /// Set a CHECK constraint predicate.
    pub fn check(mut self, predicate: impl Into<String>) -> Self {
        self.check = Some(predicate.into());
        self
    }
}

/// A single-column foreign key reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKey {
    /// Column on this entity
    pub column: String,
    /// Referenced entity
    pub references_entity: String,
    /// Referenced column
    pub references_column: String,
}

/// An entity (table) definition.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityDef {
    /// Entity name
    pub name: String,
    /// Columns, in declaration order
    pub columns: Vec<Column>,
    /// Foreign keys
    pub foreign_keys: Vec<ForeignKey>,
}

impl EntityDef {
    /// Create an entity with no columns.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            foreign_keys: Vec::new(),
        }
    }

    /// Append a column.
    pub fn column(mut self, column: Column) -> Self {
        self.columns.push(column);
        self
    }

    /// Append a foreign key from `column` to `entity.referenced`.
    pub fn foreign_key(
        mut self,
        column: impl Into<String>,
        entity: impl Into<String>,
        referenced: impl Into<String>,
    ) -> Self {
        self.foreign_keys.push(ForeignKey {
            column: column.into(),
            references_entity: entity.into(),
            references_column: referenced.into(),
        });
        self
    }

    /// Look up a column by name.
    pub fn get_column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }
}

/// How an index is stored by the backend.
///
/// Derived during catalog load, never declared: array and whole-document
/// containment targets get an inverted index, everything else a btree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IndexMethod {
    /// Ordinary btree index
    #[default]
    BTree,
    /// Generalized inverted index (arrays, whole-document containment)
    Gin,
}

/// What an index covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexKind {
    /// A single column.
    Plain { column: String },
    /// A single column, restricted to rows matching a filter predicate.
    Partial { column: String, filter: String },
    /// A single decoded path into a document column, e.g.
    /// `(data->>'price')::numeric`.
    Expression { expr: String },
    /// An array column, for element-membership queries.
    Array { column: String },
    /// Several columns.
    Composite { columns: Vec<String> },
}

/// An index definition.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexDef {
    /// Index name, unique across the catalog
    pub name: String,
    /// Owning entity name
    pub entity: String,
    /// What the index covers
    pub kind: IndexKind,
    /// Whether this is a unique index
    pub unique: bool,
    /// Storage method; resolved against the owning entity during catalog
    /// load (constructors only pre-fill the unambiguous cases)
    pub method: IndexMethod,
}

impl IndexDef {
    /// Single-column index, auto-named `idx_{entity}_{column}`.
    pub fn plain(entity: impl Into<String>, column: impl Into<String>) -> Self {
        let entity = entity.into();
        let column = column.into();
        Self {
            name: index_name(&entity, &[column.as_str()]),
            entity,
            kind: IndexKind::Plain { column },
            unique: false,
            method: IndexMethod::BTree,
        }
    }

    /// Single-column partial index with a row filter predicate.
    pub fn partial(
        entity: impl Into<String>,
        column: impl Into<String>,
        filter: impl Into<String>,
    ) -> Self {
        let entity = entity.into();
        let column = column.into();
        Self {
            name: index_name(&entity, &[column.as_str()]),
            entity,
            kind: IndexKind::Partial {
                column,
                filter: filter.into(),
            },
            unique: false,
            method: IndexMethod::BTree,
        }
    }

    /// Expression index over a single decoded document path.
    ///
    /// Must be named explicitly: there is no useful name to derive from an
    /// expression.
    pub fn expression(
        name: impl Into<String>,
        entity: impl Into<String>,
        expr: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            entity: entity.into(),
            kind: IndexKind::Expression { expr: expr.into() },
            unique: false,
            method: IndexMethod::BTree,
        }
    }

    /// Inverted index over an array column.
    pub fn array(entity: impl Into<String>, column: impl Into<String>) -> Self {
        let entity = entity.into();
        let column = column.into();
        Self {
            name: index_name(&entity, &[column.as_str()]),
            entity,
            kind: IndexKind::Array { column },
            unique: false,
            method: IndexMethod::Gin,
        }
    }

    /// Multi-column index, auto-named from the column list.
    pub fn composite<I, S>(entity: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let entity = entity.into();
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        Self {
            name: index_name(&entity, &columns),
            entity,
            kind: IndexKind::Composite { columns },
            unique: false,
            method: IndexMethod::BTree,
        }
    }

    /// Multi-column unique index, auto-named with the `uq_` convention.
    pub fn unique_composite<I, S>(entity: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let entity = entity.into();
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        Self {
            name: unique_index_name(&entity, &columns),
            entity,
            kind: IndexKind::Composite { columns },
            unique: true,
            method: IndexMethod::BTree,
        }
    }

    /// Override the derived name.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Make this a unique index.
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// The columns this index references by name (empty for expression
    /// indexes, whose references are validated separately).
    pub fn referenced_columns(&self) -> Vec<&str> {
        match &self.kind {
            IndexKind::Plain { column }
            | IndexKind::Partial { column, .. }
            | IndexKind::Array { column } => vec![column.as_str()],
            IndexKind::Expression { .. } => Vec::new(),
            IndexKind::Composite { columns } => columns.iter().map(String::as_str).collect(),
        }
    }
}

/// The operation a row-access policy applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PolicyOp {
    Read,
    Insert,
    Update,
    Delete,
    All,
}

impl PolicyOp {
    /// The `FOR ...` keyword this operation renders to.
    pub fn as_sql(&self) -> &'static str {
        match self {
            PolicyOp::Read => "SELECT",
            PolicyOp::Insert => "INSERT",
            PolicyOp::Update => "UPDATE",
            PolicyOp::Delete => "DELETE",
            PolicyOp::All => "ALL",
        }
    }

    /// Parse the `cmd` column of `pg_policies`.
    pub fn from_pg_cmd(cmd: &str) -> Option<Self> {
        match cmd {
            "SELECT" => Some(PolicyOp::Read),
            "INSERT" => Some(PolicyOp::Insert),
            "UPDATE" => Some(PolicyOp::Update),
            "DELETE" => Some(PolicyOp::Delete),
            "ALL" => Some(PolicyOp::All),
            _ => None,
        }
    }
}

impl fmt::Display for PolicyOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_sql())
    }
}

/// A row-visibility rule keyed to an owner column.
#[derive(Debug, Clone, PartialEq)]
pub struct AccessPolicy {
    /// Policy name, unique per entity
    pub name: String,
    /// Owning entity name
    pub entity: String,
    /// Operation this policy applies to
    pub operation: PolicyOp,
    /// Predicate comparing the caller identity to an owner column
    pub predicate: String,
}

impl AccessPolicy {
    /// Build an owner-column policy with the conventional predicate: the
    /// caller identity (set per session as `app.user_id`) must match the
    /// given column.
    pub fn owner(
        entity: impl Into<String>,
        operation: PolicyOp,
        owner_column: impl Into<String>,
    ) -> Self {
        let entity = entity.into();
        let owner_column = owner_column.into();
        Self {
            name: policy_name(&entity, operation.as_sql()),
            entity,
            operation,
            predicate: format!(
                "{} = current_setting('app.user_id')::bigint",
                owner_column
            ),
        }
    }

    /// Build a policy with an explicit predicate.
    pub fn with_predicate(
        entity: impl Into<String>,
        operation: PolicyOp,
        predicate: impl Into<String>,
    ) -> Self {
        let entity = entity.into();
        Self {
            name: policy_name(&entity, operation.as_sql()),
            entity,
            operation,
            predicate: predicate.into(),
        }
    }
}
