//! Index definitions.

use qlio_core::{Error, Result, SchemaErrorKind};

use crate::column::ColumnId;
use crate::table::TableId;

/// One column reference inside an index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexColumn {
    /// A column of the owning table, resolved at attach time.
    Bound { id: ColumnId, name: String },
    /// A bare column name. Reflected indexes may name columns that were
    /// never materialized as [`Column`](crate::Column)s.
    Named(String),
}

impl IndexColumn {
    pub fn name(&self) -> &str {
        match self {
            IndexColumn::Bound { name, .. } | IndexColumn::Named(name) => name,
        }
    }

    /// Spelling inside a schema dump: bound columns by bare name, strings quoted.
    fn schema_ref(&self) -> String {
        match self {
            IndexColumn::Bound { name, .. } => name.clone(),
            IndexColumn::Named(name) => format!("\"{name}\""),
        }
    }
}

/// A table index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Index {
    name: String,
    unique: bool,
    columns: Vec<IndexColumn>,
    table_name: Option<String>,
    table: Option<TableId>,
    /// Declared indexes get the table name prefixed at attach time.
    declared: bool,
}

impl Index {
    /// Declare an index over the named columns.
    ///
    /// When attached to a table `t`, the index is renamed `t_<name>` unless
    /// `name` already starts with the table name.
    pub fn new<I, S>(name: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            unique: false,
            columns: columns
                .into_iter()
                .map(|c| IndexColumn::Named(c.into()))
                .collect(),
            table_name: None,
            table: None,
            declared: true,
        }
    }

    /// An index as a catalog reports it: named verbatim, detached from any table.
    pub fn reflected<I, S>(
        name: impl Into<String>,
        table_name: impl Into<String>,
        columns: I,
        unique: bool,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            unique,
            table_name: Some(table_name.into()),
            declared: false,
            ..Self::new(name, columns)
        }
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_unique(&self) -> bool {
        self.unique
    }

    pub fn columns(&self) -> &[IndexColumn] {
        &self.columns
    }

    /// Column names in index order.
    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(IndexColumn::name)
    }

    pub fn table_name(&self) -> Option<&str> {
        self.table_name.as_deref()
    }

    /// Id of the owning table, once attached.
    pub fn table(&self) -> Option<TableId> {
        self.table
    }

    pub(crate) fn bind(
        &mut self,
        table: Option<TableId>,
        table_name: &str,
        resolve: impl Fn(&str) -> Option<ColumnId>,
    ) {
        if self.declared && !self.name.starts_with(table_name) {
            self.name = format!("{}_{}", table_name, self.name);
        }
        self.table = table;
        self.table_name = Some(table_name.to_string());
        for column in &mut self.columns {
            if let IndexColumn::Named(name) = column {
                if let Some(id) = resolve(name) {
                    *column = IndexColumn::Bound {
                        id,
                        name: std::mem::take(name),
                    };
                }
            }
        }
    }

    /// `CREATE [UNIQUE ]INDEX <name> ON <table> (<cols>)`.
    ///
    /// Fails only when the index has no table name yet.
    pub fn get_ddl_sql(&self) -> Result<String> {
        let table_name = self.table_name.as_deref().ok_or_else(|| {
            Error::schema(
                SchemaErrorKind::Invalid,
                format!("index '{}' is not bound to a table", self.name),
            )
        })?;
        let columns: Vec<&str> = self.column_names().collect();
        Ok(format!(
            "CREATE {}INDEX {} ON {} ({})",
            if self.unique { "UNIQUE " } else { "" },
            self.name,
            table_name,
            columns.join(", ")
        ))
    }

    /// Declarative source for this index: `<name> = Index(<refs>[, unique=True])`.
    pub fn generate_schema(&self) -> String {
        let refs: Vec<String> = self.columns.iter().map(IndexColumn::schema_ref).collect();
        let mut schema = format!("{} = Index({}", self.name, refs.join(", "));
        if self.unique {
            schema.push_str(", unique=True");
        }
        schema.push(')');
        schema
    }
}
