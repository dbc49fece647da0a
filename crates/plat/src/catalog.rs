//! Catalog loading and validation.
//!
//! A [`Catalog`] is the process-wide, read-only description of what the
//! backend should contain: entities, their derived indexes, and row-access
//! policies. It is built once through [`CatalogBuilder`], which validates
//! everything eagerly - a catalog that loads is a catalog the planner can
//! trust, so planning itself never fails.

use indexmap::IndexMap;
use plat_schema::{
    AccessPolicy, ColumnType, EntityDef, IndexDef, IndexKind, IndexMethod, PolicyOp,
};
use std::collections::HashSet;
use thiserror::Error;

/// Errors detected while loading a catalog.
///
/// All of these are fatal: there is no partially-loaded catalog.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LoadError {
    #[error("entity '{entity}' declared more than once")]
    DuplicateEntity { entity: String },

    #[error("duplicate column '{column}' on entity '{entity}'")]
    DuplicateColumn { entity: String, column: String },

    #[error("entity '{entity}' must declare exactly one primary key column, found {count}")]
    InvalidPrimaryKey { entity: String, count: usize },

    #[error("entity '{entity}' references '{referenced}' before it is declared")]
    DependencyOrder { entity: String, referenced: String },

    #[error("'{name}' is not a declared entity (referenced by {referenced_by})")]
    UnknownEntity { name: String, referenced_by: String },

    #[error("'{column}' is not a column of entity '{entity}'")]
    UnknownColumn { entity: String, column: String },

    #[error("index '{index}': {reason}")]
    InvalidIndexExpression { index: String, reason: String },

    #[error("index '{index}': '{entity}.{column}' is {found}, expected an array type")]
    TypeMismatch {
        index: String,
        entity: String,
        column: String,
        found: ColumnType,
    },

    #[error("duplicate index name '{index}'")]
    DuplicateIndex { index: String },

    #[error("duplicate policy '{policy}' on entity '{entity}'")]
    DuplicatePolicy { entity: String, policy: String },

    #[error("entity '{entity}' mixes an ALL policy with a {operation} policy")]
    PolicyConflict { entity: String, operation: PolicyOp },
}

/// A validated, immutable catalog of entities, indexes, and policies.
#[derive(Debug, Clone)]
pub struct Catalog {
    entities: IndexMap<String, EntityDef>,
    indexes: IndexMap<String, Vec<IndexDef>>,
    policies: IndexMap<String, Vec<AccessPolicy>>,
}

impl Catalog {
    /// Start building a catalog.
    pub fn builder() -> CatalogBuilder {
        CatalogBuilder::default()
    }

    /// Iterate over entities in declaration order.
    ///
    /// Declaration order is also creation order: validation guarantees no
    /// entity references one declared after it.
    pub fn entities(&self) -> impl Iterator<Item = &EntityDef> {
        self.entities.values()
    }

    /// Look up an entity by name.
    pub fn get_entity(&self, name: &str) -> Option<&EntityDef> {
        self.entities.get(name)
    }

    /// Number of declared entities.
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Indexes owned by an entity, in declaration order.
    pub fn indexes_for(&self, entity: &str) -> &[IndexDef] {
        self.indexes.get(entity).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Policies owned by an entity, in declaration order.
    pub fn policies_for(&self, entity: &str) -> &[AccessPolicy] {
        self.policies.get(entity).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All indexes, grouped by entity declaration order.
    pub fn iter_indexes(&self) -> impl Iterator<Item = &IndexDef> {
        self.entities
            .keys()
            .flat_map(|name| self.indexes_for(name).iter())
    }

    /// All policies, grouped by entity declaration order.
    pub fn iter_policies(&self) -> impl Iterator<Item = &AccessPolicy> {
        self.entities
            .keys()
            .flat_map(|name| self.policies_for(name).iter())
    }
}

/// Accumulates declarations, then validates them all at once in [`load`].
///
/// [`load`]: CatalogBuilder::load
#[derive(Debug, Default)]
pub struct CatalogBuilder {
    entities: Vec<EntityDef>,
    indexes: Vec<IndexDef>,
    policies: Vec<AccessPolicy>,
}

impl CatalogBuilder {
    /// Declare an entity. Declaration order is creation order.
    pub fn entity(mut self, entity: EntityDef) -> Self {
        self.entities.push(entity);
        self
    }

    /// Declare an index.
    pub fn index(mut self, index: IndexDef) -> Self {
        self.indexes.push(index);
        self
    }

    /// Declare a row-access policy.
    pub fn policy(mut self, policy: AccessPolicy) -> Self {
        self.policies.push(policy);
        self
    }

    /// Validate every declaration and freeze the catalog.
    pub fn load(self) -> Result<Catalog, LoadError> {
        let mut entities: IndexMap<String, EntityDef> = IndexMap::new();
        for entity in self.entities {
            validate_entity(&entity)?;
            if entities.contains_key(&entity.name) {
                return Err(LoadError::DuplicateEntity {
                    entity: entity.name,
                });
            }
            entities.insert(entity.name.clone(), entity);
        }

        validate_references(&entities)?;

        let mut indexes: IndexMap<String, Vec<IndexDef>> = IndexMap::new();
        let mut index_names: HashSet<String> = HashSet::new();
        for mut index in self.indexes {
            let owner = entities.get(&index.entity).ok_or_else(|| {
                LoadError::UnknownEntity {
                    name: index.entity.clone(),
                    referenced_by: format!("index '{}'", index.name),
                }
            })?;
            validate_index(&index, owner)?;
            if !index_names.insert(index.name.clone()) {
                return Err(LoadError::DuplicateIndex { index: index.name });
            }
            index.method = resolve_method(&index, owner);
            indexes.entry(index.entity.clone()).or_default().push(index);
        }

        let mut policies: IndexMap<String, Vec<AccessPolicy>> = IndexMap::new();
        for policy in self.policies {
            if !entities.contains_key(&policy.entity) {
                return Err(LoadError::UnknownEntity {
                    name: policy.entity.clone(),
                    referenced_by: format!("policy '{}'", policy.name),
                });
            }
            let group = policies.entry(policy.entity.clone()).or_default();
            if group.iter().any(|p| p.name == policy.name) {
                return Err(LoadError::DuplicatePolicy {
                    entity: policy.entity,
                    policy: policy.name,
                });
            }
            group.push(policy);
        }
        for (entity, group) in &policies {
            validate_policy_group(entity, group)?;
        }

        Ok(Catalog {
            entities,
            indexes,
            policies,
        })
    }
}

/// Per-entity invariants: unique column names, exactly one primary key.
fn validate_entity(entity: &EntityDef) -> Result<(), LoadError> {
    let mut seen: HashSet<&str> = HashSet::new();
    for column in &entity.columns {
        if !seen.insert(&column.name) {
            return Err(LoadError::DuplicateColumn {
                entity: entity.name.clone(),
                column: column.name.clone(),
            });
        }
    }

    let pk_count = entity.columns.iter().filter(|c| c.primary_key).count();
    if pk_count != 1 {
        return Err(LoadError::InvalidPrimaryKey {
            entity: entity.name.clone(),
            count: pk_count,
        });
    }

    Ok(())
}

/// One forward scan over the declaration order: every foreign key must point
/// at an entity declared no later than its owner (self-references allowed),
/// and at columns that exist on both sides.
fn validate_references(entities: &IndexMap<String, EntityDef>) -> Result<(), LoadError> {
    let mut seen: HashSet<&str> = HashSet::new();
    for entity in entities.values() {
        seen.insert(&entity.name);
        for fk in &entity.foreign_keys {
            if entity.get_column(&fk.column).is_none() {
                return Err(LoadError::UnknownColumn {
                    entity: entity.name.clone(),
                    column: fk.column.clone(),
                });
            }
            let target = match entities.get(&fk.references_entity) {
                Some(target) => target,
                None => {
                    return Err(LoadError::UnknownEntity {
                        name: fk.references_entity.clone(),
                        referenced_by: format!("entity '{}'", entity.name),
                    });
                }
            };
            if !seen.contains(target.name.as_str()) {
                return Err(LoadError::DependencyOrder {
                    entity: entity.name.clone(),
                    referenced: target.name.clone(),
                });
            }
            if target.get_column(&fk.references_column).is_none() {
                return Err(LoadError::UnknownColumn {
                    entity: target.name.clone(),
                    column: fk.references_column.clone(),
                });
            }
        }
    }
    Ok(())
}

fn validate_index(index: &IndexDef, owner: &EntityDef) -> Result<(), LoadError> {
    for column in index.referenced_columns() {
        if owner.get_column(column).is_none() {
            return Err(LoadError::UnknownColumn {
                entity: owner.name.clone(),
                column: column.to_string(),
            });
        }
    }

    match &index.kind {
        IndexKind::Array { column } => {
            // referenced_columns() already proved the column exists
            let col = owner.get_column(column).expect("column checked above");
            if !col.col_type.is_array() {
                return Err(LoadError::TypeMismatch {
                    index: index.name.clone(),
                    entity: owner.name.clone(),
                    column: column.clone(),
                    found: col.col_type,
                });
            }
        }
        IndexKind::Expression { expr } => {
            validate_index_expression(&index.name, owner, expr)?;
        }
        IndexKind::Plain { .. } | IndexKind::Partial { .. } | IndexKind::Composite { .. } => {}
    }

    Ok(())
}

/// Validate an expression index: exactly one decoded document path, every
/// identifier a declared column, and the path's base column must be a
/// document column.
///
/// A prior generation of this tooling shipped expression indexes the engine
/// rejected outright; this keeps that class of definition from loading at
/// all.
fn validate_index_expression(
    index: &str,
    owner: &EntityDef,
    expr: &str,
) -> Result<(), LoadError> {
    let invalid = |reason: String| LoadError::InvalidIndexExpression {
        index: index.to_string(),
        reason,
    };

    let mut arrows = 0usize;
    let mut idents: Vec<&str> = Vec::new();
    let mut base: Option<&str> = None;

    let bytes = expr.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            // string literal: skip to the closing quote, honoring '' escapes
            b'\'' => {
                i += 1;
                while i < bytes.len() {
                    if bytes[i] == b'\'' {
                        if bytes.get(i + 1) == Some(&b'\'') {
                            i += 2;
                            continue;
                        }
                        break;
                    }
                    i += 1;
                }
                i += 1;
            }
            // cast: the type name after :: is not a column reference
            b':' if bytes.get(i + 1) == Some(&b':') => {
                i += 2;
                while i < bytes.len()
                    && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_')
                {
                    i += 1;
                }
            }
            b'-' if bytes.get(i + 1) == Some(&b'>') => {
                arrows += 1;
                if base.is_none() {
                    base = idents.last().copied();
                }
                i += if bytes.get(i + 2) == Some(&b'>') { 3 } else { 2 };
            }
            b if b.is_ascii_alphabetic() || b == b'_' => {
                let start = i;
                while i < bytes.len()
                    && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_')
                {
                    i += 1;
                }
                idents.push(&expr[start..i]);
            }
            _ => i += 1,
        }
    }

    match arrows {
        0 => return Err(invalid("expression does not decode a document path".into())),
        1 => {}
        n => {
            return Err(invalid(format!(
                "expression decodes {} document paths, expected exactly one",
                n
            )));
        }
    }

    for ident in &idents {
        if owner.get_column(ident).is_none() {
            return Err(invalid(format!(
                "'{}' is not a column of '{}'",
                ident, owner.name
            )));
        }
    }

    let base = base.ok_or_else(|| invalid("document path has no base column".into()))?;
    let col = owner
        .get_column(base)
        .ok_or_else(|| invalid(format!("'{}' is not a column of '{}'", base, owner.name)))?;
    if !col.col_type.is_json() {
        return Err(invalid(format!(
            "'{}' is {}, not a document column",
            base, col.col_type
        )));
    }

    Ok(())
}

/// Whole-document and array-membership targets get an inverted index;
/// everything else stays on a btree.
fn resolve_method(index: &IndexDef, owner: &EntityDef) -> IndexMethod {
    match &index.kind {
        IndexKind::Array { .. } => IndexMethod::Gin,
        IndexKind::Plain { column } | IndexKind::Partial { column, .. } => {
            let col = owner.get_column(column).expect("column validated");
            if col.col_type.is_json() || col.col_type.is_array() {
                IndexMethod::Gin
            } else {
                IndexMethod::BTree
            }
        }
        IndexKind::Expression { .. } | IndexKind::Composite { .. } => IndexMethod::BTree,
    }
}

/// An ALL policy subsumes every operation, so it may not coexist with an
/// operation-specific policy: precedence between them would be ambiguous.
fn validate_policy_group(entity: &str, group: &[AccessPolicy]) -> Result<(), LoadError> {
    if group.len() > 1 && group.iter().any(|p| p.operation == PolicyOp::All) {
        let operation = group
            .iter()
            .map(|p| p.operation)
            .find(|op| *op != PolicyOp::All)
            .unwrap_or(PolicyOp::All);
        return Err(LoadError::PolicyConflict {
            entity: entity.to_string(),
            operation,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use plat_schema::Column;

    fn users() -> EntityDef {
        EntityDef::new("users")
            .column(Column::new("id", ColumnType::BigSerial).primary_key())
            .column(Column::new("email", ColumnType::VarChar(255)).not_null().unique())
    }

    fn properties() -> EntityDef {
        EntityDef::new("properties")
            .column(Column::new("id", ColumnType::BigSerial).primary_key())
            .column(Column::new("user_id", ColumnType::Integer).not_null())
            .column(Column::new("data", ColumnType::Jsonb).not_null())
            .column(Column::new("tags", ColumnType::TextArray))
            .foreign_key("user_id", "users", "id")
    }

    #[test]
    fn test_load_preserves_declaration_order() {
        let catalog = Catalog::builder()
            .entity(users())
            .entity(properties())
            .load()
            .unwrap();

        let names: Vec<&str> = catalog.entities().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["users", "properties"]);
        assert_eq!(catalog.entity_count(), 2);
    }

    #[test]
    fn test_duplicate_entity_rejected() {
        let err = Catalog::builder()
            .entity(users())
            .entity(users())
            .load()
            .unwrap_err();
        assert!(matches!(err, LoadError::DuplicateEntity { entity } if entity == "users"));
    }

    #[test]
    fn test_duplicate_column_rejected() {
        let entity = EntityDef::new("users")
            .column(Column::new("id", ColumnType::BigSerial).primary_key())
            .column(Column::new("email", ColumnType::Text))
            .column(Column::new("email", ColumnType::Text));
        let err = Catalog::builder().entity(entity).load().unwrap_err();
        assert!(matches!(err, LoadError::DuplicateColumn { column, .. } if column == "email"));
    }

    #[test]
    fn test_entity_without_primary_key_rejected() {
        let entity = EntityDef::new("floating").column(Column::new("name", ColumnType::Text));
        let err = Catalog::builder().entity(entity).load().unwrap_err();
        assert!(matches!(
            err,
            LoadError::InvalidPrimaryKey { count: 0, .. }
        ));
    }

    #[test]
    fn test_entity_with_two_primary_keys_rejected() {
        let entity = EntityDef::new("twice")
            .column(Column::new("a", ColumnType::BigInt).primary_key())
            .column(Column::new("b", ColumnType::BigInt).primary_key());
        let err = Catalog::builder().entity(entity).load().unwrap_err();
        assert!(matches!(
            err,
            LoadError::InvalidPrimaryKey { count: 2, .. }
        ));
    }

    #[test]
    fn test_forward_reference_rejected() {
        // properties declared before users, but references users
        let err = Catalog::builder()
            .entity(properties())
            .entity(users())
            .load()
            .unwrap_err();
        assert!(matches!(
            err,
            LoadError::DependencyOrder { entity, referenced }
                if entity == "properties" && referenced == "users"
        ));
    }

    #[test]
    fn test_self_reference_allowed() {
        let entity = EntityDef::new("regions")
            .column(Column::new("id", ColumnType::BigSerial).primary_key())
            .column(Column::new("parent_id", ColumnType::BigInt))
            .foreign_key("parent_id", "regions", "id");
        assert!(Catalog::builder().entity(entity).load().is_ok());
    }

    #[test]
    fn test_reference_to_undeclared_entity_rejected() {
        let err = Catalog::builder()
            .entity(properties())
            .load()
            .unwrap_err();
        assert!(matches!(err, LoadError::UnknownEntity { name, .. } if name == "users"));
    }

    #[test]
    fn test_reference_to_missing_column_rejected() {
        let entity = EntityDef::new("properties")
            .column(Column::new("id", ColumnType::BigSerial).primary_key())
            .foreign_key("user_id", "properties", "id");
        let err = Catalog::builder().entity(entity).load().unwrap_err();
        assert!(matches!(err, LoadError::UnknownColumn { column, .. } if column == "user_id"));
    }

    #[test]
    fn test_index_on_unknown_entity_rejected() {
        let err = Catalog::builder()
            .entity(users())
            .index(IndexDef::plain("listings", "user_id"))
            .load()
            .unwrap_err();
        assert!(matches!(err, LoadError::UnknownEntity { name, .. } if name == "listings"));
    }

    #[test]
    fn test_index_on_unknown_column_rejected() {
        let err = Catalog::builder()
            .entity(users())
            .index(IndexDef::plain("users", "missing"))
            .load()
            .unwrap_err();
        assert!(matches!(err, LoadError::UnknownColumn { column, .. } if column == "missing"));
    }

    #[test]
    fn test_duplicate_index_name_rejected() {
        let err = Catalog::builder()
            .entity(users())
            .entity(properties())
            .index(IndexDef::plain("properties", "user_id"))
            .index(IndexDef::partial("properties", "user_id", "data IS NOT NULL"))
            .load()
            .unwrap_err();
        assert!(matches!(
            err,
            LoadError::DuplicateIndex { index } if index == "idx_properties_user_id"
        ));
    }

    #[test]
    fn test_array_index_on_non_array_column_rejected() {
        let err = Catalog::builder()
            .entity(users())
            .entity(properties())
            .index(IndexDef::array("properties", "data"))
            .load()
            .unwrap_err();
        assert!(matches!(
            err,
            LoadError::TypeMismatch { column, found: ColumnType::Jsonb, .. } if column == "data"
        ));
    }

    #[test]
    fn test_expression_index_accepts_single_decoded_path() {
        let catalog = Catalog::builder()
            .entity(users())
            .entity(properties())
            .index(IndexDef::expression(
                "idx_properties_price",
                "properties",
                "(data->>'price')::numeric",
            ))
            .load()
            .unwrap();
        let idx = &catalog.indexes_for("properties")[0];
        assert_eq!(idx.method, IndexMethod::BTree);
    }

    #[test]
    fn test_expression_index_on_undeclared_column_rejected() {
        let err = Catalog::builder()
            .entity(users())
            .entity(properties())
            .index(IndexDef::expression(
                "idx_properties_price",
                "properties",
                "(payload->>'price')::numeric",
            ))
            .load()
            .unwrap_err();
        assert!(matches!(err, LoadError::InvalidIndexExpression { .. }));
    }

    #[test]
    fn test_expression_index_without_path_rejected() {
        let err = Catalog::builder()
            .entity(users())
            .entity(properties())
            .index(IndexDef::expression(
                "idx_properties_data",
                "properties",
                "(data)",
            ))
            .load()
            .unwrap_err();
        assert!(matches!(
            err,
            LoadError::InvalidIndexExpression { ref reason, .. }
                if reason.contains("does not decode")
        ));
    }

    #[test]
    fn test_expression_index_with_two_paths_rejected() {
        let err = Catalog::builder()
            .entity(users())
            .entity(properties())
            .index(IndexDef::expression(
                "idx_properties_addr",
                "properties",
                "(data->'address'->>'city')",
            ))
            .load()
            .unwrap_err();
        assert!(matches!(
            err,
            LoadError::InvalidIndexExpression { ref reason, .. }
                if reason.contains("expected exactly one")
        ));
    }

    #[test]
    fn test_expression_index_on_scalar_base_rejected() {
        let err = Catalog::builder()
            .entity(users())
            .entity(properties())
            .index(IndexDef::expression(
                "idx_properties_user",
                "properties",
                "(user_id->>'x')",
            ))
            .load()
            .unwrap_err();
        assert!(matches!(
            err,
            LoadError::InvalidIndexExpression { ref reason, .. }
                if reason.contains("not a document column")
        ));
    }

    #[test]
    fn test_expression_scanner_ignores_literals_and_casts() {
        // 'price' is a literal, numeric a cast target; neither is a column
        let catalog = Catalog::builder()
            .entity(users())
            .entity(properties())
            .index(IndexDef::expression(
                "idx_properties_price",
                "properties",
                "((data ->> 'price')::numeric)",
            ))
            .load();
        assert!(catalog.is_ok());
    }

    #[test]
    fn test_containment_indexes_resolve_to_gin() {
        let catalog = Catalog::builder()
            .entity(users())
            .entity(properties())
            .index(IndexDef::plain("properties", "data"))
            .index(IndexDef::array("properties", "tags"))
            .index(IndexDef::plain("properties", "user_id"))
            .load()
            .unwrap();

        let indexes = catalog.indexes_for("properties");
        assert_eq!(indexes[0].method, IndexMethod::Gin);
        assert_eq!(indexes[1].method, IndexMethod::Gin);
        assert_eq!(indexes[2].method, IndexMethod::BTree);
    }

    #[test]
    fn test_policy_on_unknown_entity_rejected() {
        let err = Catalog::builder()
            .entity(users())
            .policy(AccessPolicy::owner("listings", PolicyOp::Read, "user_id"))
            .load()
            .unwrap_err();
        assert!(matches!(err, LoadError::UnknownEntity { name, .. } if name == "listings"));
    }

    #[test]
    fn test_all_policy_conflicts_with_specific_policy() {
        let err = Catalog::builder()
            .entity(users())
            .entity(properties())
            .policy(AccessPolicy::owner("properties", PolicyOp::All, "user_id"))
            .policy(AccessPolicy::owner("properties", PolicyOp::Read, "user_id"))
            .load()
            .unwrap_err();
        assert!(matches!(
            err,
            LoadError::PolicyConflict { entity, operation: PolicyOp::Read } if entity == "properties"
        ));
    }

    #[test]
    fn test_duplicate_policy_rejected() {
        let err = Catalog::builder()
            .entity(users())
            .entity(properties())
            .policy(AccessPolicy::owner("properties", PolicyOp::Read, "user_id"))
            .policy(AccessPolicy::owner("properties", PolicyOp::Read, "user_id"))
            .load()
            .unwrap_err();
        assert!(matches!(err, LoadError::DuplicatePolicy { .. }));
    }

    #[test]
    fn test_specific_policies_coexist() {
        let catalog = Catalog::builder()
            .entity(users())
            .entity(properties())
            .policy(AccessPolicy::owner("properties", PolicyOp::Read, "user_id"))
            .policy(AccessPolicy::owner("properties", PolicyOp::Insert, "user_id"))
            .load()
            .unwrap();
        assert_eq!(catalog.policies_for("properties").len(), 2);
    }
}
