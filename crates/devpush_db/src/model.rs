//! Declared schema model.
//!
//! Applications declare tables, relations and enums independently; the
//! assembler merges them into one [`SchemaModel`] that both the ORM layer and
//! the diff engine consume. The three namespaces must stay disjoint.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::pool::Dialect;

/// Column types understood by the diff engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Integer,
    BigInt,
    Real,
    Numeric,
    Text,
    Varchar(Option<u32>),
    Boolean,
    Timestamp,
    Json,
    /// Column backed by a declared enum (plain TEXT on SQLite)
    Enum(String),
}

impl ColumnType {
    /// Type as written in DDL for the given dialect.
    pub fn ddl(&self, dialect: Dialect) -> String {
        match (self, dialect) {
            (ColumnType::Integer, Dialect::Sqlite) => "INTEGER".to_string(),
            (ColumnType::Integer, Dialect::Postgres) => "integer".to_string(),
            (ColumnType::BigInt, Dialect::Sqlite) => "BIGINT".to_string(),
            (ColumnType::BigInt, Dialect::Postgres) => "bigint".to_string(),
            (ColumnType::Real, Dialect::Sqlite) => "REAL".to_string(),
            (ColumnType::Real, Dialect::Postgres) => "double precision".to_string(),
            (ColumnType::Numeric, Dialect::Sqlite) => "NUMERIC".to_string(),
            (ColumnType::Numeric, Dialect::Postgres) => "numeric".to_string(),
            (ColumnType::Text, Dialect::Sqlite) => "TEXT".to_string(),
            (ColumnType::Text, Dialect::Postgres) => "text".to_string(),
            (ColumnType::Varchar(Some(len)), Dialect::Sqlite) => format!("VARCHAR({})", len),
            (ColumnType::Varchar(None), Dialect::Sqlite) => "VARCHAR".to_string(),
            (ColumnType::Varchar(Some(len)), Dialect::Postgres) => format!("varchar({})", len),
            (ColumnType::Varchar(None), Dialect::Postgres) => "varchar".to_string(),
            (ColumnType::Boolean, Dialect::Sqlite) => "BOOLEAN".to_string(),
            (ColumnType::Boolean, Dialect::Postgres) => "boolean".to_string(),
            (ColumnType::Timestamp, Dialect::Sqlite) => "TIMESTAMP".to_string(),
            (ColumnType::Timestamp, Dialect::Postgres) => "timestamp".to_string(),
            (ColumnType::Json, Dialect::Sqlite) => "JSON".to_string(),
            (ColumnType::Json, Dialect::Postgres) => "jsonb".to_string(),
            (ColumnType::Enum(_), Dialect::Sqlite) => "TEXT".to_string(),
            (ColumnType::Enum(name), Dialect::Postgres) => quote_ident(name),
        }
    }

    /// Type name as reported by the live catalog, lowercased.
    ///
    /// SQLite reports the declared type verbatim; Postgres reports
    /// `information_schema` names (enum columns report the enum's name).
    pub fn catalog_name(&self, dialect: Dialect) -> String {
        match dialect {
            Dialect::Sqlite => self.ddl(dialect).to_ascii_lowercase(),
            Dialect::Postgres => match self {
                ColumnType::Varchar(_) => "character varying".to_string(),
                ColumnType::Timestamp => "timestamp without time zone".to_string(),
                ColumnType::Enum(name) => name.to_ascii_lowercase(),
                other => other.ddl(dialect),
            },
        }
    }

    /// Declared character length, compared against Postgres'
    /// `character_maximum_length`.
    pub fn max_length(&self) -> Option<i64> {
        match self {
            ColumnType::Varchar(len) => len.map(i64::from),
            _ => None,
        }
    }
}

/// A declared column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    #[serde(rename = "type")]
    pub column_type: ColumnType,
    #[serde(default = "default_nullable")]
    pub nullable: bool,
    #[serde(default)]
    pub primary_key: bool,
    /// Raw SQL default expression
    #[serde(default)]
    pub default: Option<String>,
}

fn default_nullable() -> bool {
    true
}

impl ColumnDef {
    /// A nullable column without default.
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            nullable: true,
            primary_key: false,
            default: None,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }

    pub fn default_sql(mut self, expr: impl Into<String>) -> Self {
        self.default = Some(expr.into());
        self
    }

    /// Column definition fragment used by CREATE TABLE and ADD COLUMN.
    pub fn ddl(&self, dialect: Dialect) -> String {
        let mut sql = format!("{} {}", quote_ident(&self.name), self.column_type.ddl(dialect));
        if self.primary_key {
            sql.push_str(" PRIMARY KEY");
        } else if !self.nullable {
            sql.push_str(" NOT NULL");
        }
        if let Some(ref default) = self.default {
            sql.push_str(" DEFAULT ");
            sql.push_str(default);
        }
        sql
    }
}

/// A declared table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableDef {
    pub name: String,
    pub columns: Vec<ColumnDef>,
}

impl TableDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
        }
    }

    pub fn column(mut self, column: ColumnDef) -> Self {
        self.columns.push(column);
        self
    }

    pub fn get_column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// `CREATE TABLE` statement for this table.
    pub fn create_statement(&self, dialect: Dialect) -> String {
        let columns: Vec<String> = self.columns.iter().map(|c| c.ddl(dialect)).collect();
        format!(
            "CREATE TABLE {} (\n\t{}\n)",
            quote_ident(&self.name),
            columns.join(",\n\t")
        )
    }
}

/// Cardinality of a relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationKind {
    One,
    Many,
}

/// ORM-level relation between two declared tables. Produces no DDL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationDef {
    pub name: String,
    pub from_table: String,
    pub to_table: String,
    pub kind: RelationKind,
}

/// A declared enum type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumDef {
    pub name: String,
    pub values: Vec<String>,
}

impl EnumDef {
    pub fn new(name: impl Into<String>, values: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            name: name.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }
}

/// Serialized form of a model, as loaded from a TOML or JSON file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelDeclaration {
    #[serde(default)]
    pub tables: Vec<TableDef>,
    #[serde(default)]
    pub relations: Vec<RelationDef>,
    #[serde(default)]
    pub enums: Vec<EnumDef>,
}

impl ModelDeclaration {
    /// Assemble the declared namespaces into a model.
    pub fn assemble(self) -> Result<SchemaModel, ModelError> {
        SchemaModel::assemble(self.tables, self.relations, self.enums)
    }
}

/// Combined model of tables, relations and enums, keyed by name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaModel {
    tables: BTreeMap<String, TableDef>,
    relations: BTreeMap<String, RelationDef>,
    enums: BTreeMap<String, EnumDef>,
}

impl SchemaModel {
    /// Merge the three namespaces into one model.
    ///
    /// Rejects names declared twice (within or across namespaces), tables
    /// without columns, duplicated columns, enum columns pointing at undeclared
    /// enums, and relations pointing at undeclared tables.
    pub fn assemble(
        tables: impl IntoIterator<Item = TableDef>,
        relations: impl IntoIterator<Item = RelationDef>,
        enums: impl IntoIterator<Item = EnumDef>,
    ) -> Result<Self, ModelError> {
        let mut owners: BTreeMap<String, &'static str> = BTreeMap::new();
        let mut claim = |name: &str, namespace: &'static str| -> Result<(), ModelError> {
            if let Some(first) = owners.insert(name.to_string(), namespace) {
                return Err(ModelError::NameCollision {
                    name: name.to_string(),
                    first,
                    second: namespace,
                });
            }
            Ok(())
        };

        let mut model = SchemaModel::default();

        for def in enums {
            claim(&def.name, "enum")?;
            model.enums.insert(def.name.clone(), def);
        }
        for def in tables {
            claim(&def.name, "table")?;
            model.tables.insert(def.name.clone(), def);
        }
        for def in relations {
            claim(&def.name, "relation")?;
            model.relations.insert(def.name.clone(), def);
        }

        model.validate()?;
        Ok(model)
    }

    fn validate(&self) -> Result<(), ModelError> {
        for table in self.tables.values() {
            if table.columns.is_empty() {
                return Err(ModelError::EmptyTable(table.name.clone()));
            }
            for (idx, column) in table.columns.iter().enumerate() {
                if table.columns[..idx].iter().any(|c| c.name == column.name) {
                    return Err(ModelError::DuplicateColumn {
                        table: table.name.clone(),
                        column: column.name.clone(),
                    });
                }
                if let ColumnType::Enum(ref enum_name) = column.column_type {
                    if !self.enums.contains_key(enum_name) {
                        return Err(ModelError::UnknownEnum {
                            table: table.name.clone(),
                            column: column.name.clone(),
                            enum_name: enum_name.clone(),
                        });
                    }
                }
            }
        }

        for relation in self.relations.values() {
            for table in [&relation.from_table, &relation.to_table] {
                if !self.tables.contains_key(table) {
                    return Err(ModelError::UnknownTable {
                        relation: relation.name.clone(),
                        table: table.clone(),
                    });
                }
            }
        }

        Ok(())
    }

    /// Copy of this model that also declares `table`, unless a table of that
    /// name is already declared.
    pub fn with_ledger_table(&self, table: TableDef) -> Result<Self, ModelError> {
        if self.tables.contains_key(&table.name) {
            return Ok(self.clone());
        }
        if self.enums.contains_key(&table.name) {
            return Err(ModelError::NameCollision {
                name: table.name,
                first: "enum",
                second: "table",
            });
        }
        if self.relations.contains_key(&table.name) {
            return Err(ModelError::NameCollision {
                name: table.name,
                first: "relation",
                second: "table",
            });
        }
        let mut model = self.clone();
        model.tables.insert(table.name.clone(), table);
        Ok(model)
    }

    /// Tables in name order.
    pub fn tables(&self) -> impl Iterator<Item = &TableDef> {
        self.tables.values()
    }

    pub fn table(&self, name: &str) -> Option<&TableDef> {
        self.tables.get(name)
    }

    pub fn relations(&self) -> impl Iterator<Item = &RelationDef> {
        self.relations.values()
    }

    /// Enums in name order.
    pub fn enums(&self) -> impl Iterator<Item = &EnumDef> {
        self.enums.values()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty() && self.relations.is_empty() && self.enums.is_empty()
    }
}

/// Double-quote an identifier for DDL.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}
