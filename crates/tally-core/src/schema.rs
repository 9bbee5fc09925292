// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Table schemas: which fields of which tables participate in the digest.
//!
//! The catalog is the single source of truth for field selection. Records
//! never decide what gets digested; they are just bags of values that a
//! schema reads in its declared order.

use serde::{Deserialize, Serialize};

use crate::digest::{DigestModulus, InvalidModulus};
use crate::ident::TableName;

/// Digest contract for one tracked table.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct TableSchema {
    name: TableName,
    digest_fields: Vec<String>,
    modulus: DigestModulus,
}

impl TableSchema {
    /// Declare a schema over `fields`, in digest order, with the default
    /// modulus.
    ///
    /// # Errors
    ///
    /// Rejects an empty field list (such a schema could never detect
    /// anything) and duplicate field names (they would double-count).
    pub fn new<I, S>(name: impl Into<TableName>, fields: I) -> Result<Self, SchemaError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let name = name.into();
        let digest_fields: Vec<String> = fields.into_iter().map(Into::into).collect();
        if digest_fields.is_empty() {
            return Err(SchemaError::EmptyDigestFieldList { table: name });
        }
        for (i, field) in digest_fields.iter().enumerate() {
            if digest_fields[..i].contains(field) {
                return Err(SchemaError::DuplicateField {
                    table: name,
                    field: field.clone(),
                });
            }
        }
        Ok(Self {
            name,
            digest_fields,
            modulus: DigestModulus::DEFAULT,
        })
    }

    /// Replace the digest modulus.
    #[must_use]
    pub fn with_modulus(mut self, modulus: DigestModulus) -> Self {
        self.modulus = modulus;
        self
    }

    /// Table this schema describes.
    #[must_use]
    pub fn name(&self) -> &TableName {
        &self.name
    }

    /// Digest fields in declared (canonical) order.
    pub fn digest_fields(&self) -> impl Iterator<Item = &str> {
        self.digest_fields.iter().map(String::as_str)
    }

    /// Divisor for this table's checksums.
    #[must_use]
    pub fn modulus(&self) -> DigestModulus {
        self.modulus
    }
}

/// All tracked tables, in declaration order.
///
/// Declaration order is observable: bulk repair walks tables in exactly this
/// order, so reports stay stable run over run.
#[derive(Clone, PartialEq, Eq, Debug, Default)]
pub struct SchemaCatalog {
    tables: Vec<TableSchema>,
}

impl SchemaCatalog {
    /// Empty catalog.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a catalog from its declarative config form.
    ///
    /// # Errors
    ///
    /// Propagates per-table validation failures and rejects duplicate table
    /// names.
    pub fn from_config(config: CatalogConfig) -> Result<Self, SchemaError> {
        let mut catalog = Self::new();
        for table in config.tables {
            let modulus = table.modulus.unwrap_or(config.default_modulus);
            catalog.insert(TableSchema::new(table.name, table.fields)?.with_modulus(modulus))?;
        }
        Ok(catalog)
    }

    /// Add `schema` to the catalog.
    ///
    /// # Errors
    ///
    /// Rejects a table name that is already declared.
    pub fn insert(&mut self, schema: TableSchema) -> Result<(), SchemaError> {
        if self.get(schema.name()).is_some() {
            return Err(SchemaError::DuplicateTable {
                table: schema.name().clone(),
            });
        }
        self.tables.push(schema);
        Ok(())
    }

    /// Schema for `table`, if tracked.
    #[must_use]
    pub fn get(&self, table: &TableName) -> Option<&TableSchema> {
        self.tables.iter().find(|schema| schema.name() == table)
    }

    /// Whether `table` is tracked.
    #[must_use]
    pub fn contains(&self, table: &TableName) -> bool {
        self.get(table).is_some()
    }

    /// Schemas in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &TableSchema> {
        self.tables.iter()
    }

    /// Number of tracked tables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Whether no tables are tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }
}

impl<'a> IntoIterator for &'a SchemaCatalog {
    type Item = &'a TableSchema;
    type IntoIter = std::slice::Iter<'a, TableSchema>;

    fn into_iter(self) -> Self::IntoIter {
        self.tables.iter()
    }
}

/// Declarative catalog shape, loadable from JSON or TOML.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Modulus for tables that do not override it.
    #[serde(default)]
    pub default_modulus: DigestModulus,
    /// Tracked tables, in declaration order.
    pub tables: Vec<TableConfig>,
}

/// One table entry of [`CatalogConfig`].
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct TableConfig {
    /// Table name.
    pub name: String,
    /// Digest fields, in digest order.
    pub fields: Vec<String>,
    /// Per-table modulus override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modulus: Option<DigestModulus>,
}

/// Catalog declaration rejected.
#[derive(Clone, PartialEq, Eq, Debug, thiserror::Error)]
pub enum SchemaError {
    /// Two schemas claim the same table name.
    #[error("table `{table}` is declared twice")]
    DuplicateTable {
        /// Offending table.
        table: TableName,
    },
    /// A schema lists the same digest field twice.
    #[error("table `{table}` declares digest field `{field}` twice")]
    DuplicateField {
        /// Offending table.
        table: TableName,
        /// Repeated field name.
        field: String,
    },
    /// A schema lists no digest fields at all.
    #[error("table `{table}` declares no digest fields")]
    EmptyDigestFieldList {
        /// Offending table.
        table: TableName,
    },
    /// A config carried a modulus below 2.
    #[error(transparent)]
    InvalidModulus(#[from] InvalidModulus),
}
