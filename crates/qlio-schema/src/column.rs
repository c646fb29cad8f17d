//! Column definitions.

use qlio_core::{SqlType, Value};

use crate::table::TableId;

/// Position of a column within its owning table, in declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ColumnId(pub(crate) usize);

impl ColumnId {
    /// The zero-based declaration index.
    pub fn index(self) -> usize {
        self.0
    }
}

/// A column's schema default.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum ColumnDefault {
    /// No default is defined.
    #[default]
    None,
    /// A literal default, which can be applied on the client.
    Value(Value),
    /// A backend-evaluated expression such as `CURRENT_TIMESTAMP`.
    Expression(String),
}

impl ColumnDefault {
    pub fn is_none(&self) -> bool {
        matches!(self, ColumnDefault::None)
    }

    /// The literal value, if this default is one.
    pub fn value(&self) -> Option<&Value> {
        match self {
            ColumnDefault::Value(v) => Some(v),
            _ => None,
        }
    }

    /// SQL text for a `DEFAULT` clause.
    pub fn to_sql(&self) -> Option<String> {
        match self {
            ColumnDefault::None => None,
            ColumnDefault::Value(v) => Some(v.to_sql_literal()),
            ColumnDefault::Expression(e) => Some(e.clone()),
        }
    }
}

/// A single column of a table.
///
/// Columns are built unattached. [`Table::attach`](crate::Table::attach)
/// stamps the owning table's id and name onto them; reflected columns that
/// were never registered keep `table = None` and carry the table name the
/// catalog reported.
#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    name: String,
    sql_type: SqlType,
    nullable: bool,
    default: ColumnDefault,
    primary_key: bool,
    auto_increment: bool,
    unique: bool,
    table: Option<TableId>,
    table_name: Option<String>,
}

impl Column {
    /// A nullable column with no default.
    pub fn new(name: impl Into<String>, sql_type: SqlType) -> Self {
        Self {
            name: name.into(),
            sql_type,
            nullable: true,
            default: ColumnDefault::None,
            primary_key: false,
            auto_increment: false,
            unique: false,
            table: None,
            table_name: None,
        }
    }

    /// Mark as (part of) the primary key. Primary key columns are never nullable.
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self.nullable = false;
        self
    }

    /// Values are generated by the backend when not supplied.
    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Set a literal default.
    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = ColumnDefault::Value(value.into());
        self
    }

    /// Set any default, including none.
    pub fn with_default(mut self, default: ColumnDefault) -> Self {
        self.default = default;
        self
    }

    /// Record the owning table's name without attaching, as reflection does.
    pub fn with_table_name(mut self, table_name: impl Into<String>) -> Self {
        self.table_name = Some(table_name.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sql_type(&self) -> SqlType {
        self.sql_type
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub fn default(&self) -> &ColumnDefault {
        &self.default
    }

    pub fn is_primary_key(&self) -> bool {
        self.primary_key
    }

    pub fn is_auto_increment(&self) -> bool {
        self.auto_increment
    }

    pub fn is_unique(&self) -> bool {
        self.unique
    }

    /// Id of the owning table, once attached.
    pub fn table(&self) -> Option<TableId> {
        self.table
    }

    pub fn table_name(&self) -> Option<&str> {
        self.table_name.as_deref()
    }

    pub(crate) fn set_unique(&mut self, unique: bool) {
        self.unique = unique;
    }

    pub(crate) fn bind(&mut self, table: Option<TableId>, table_name: &str) {
        self.table = table;
        self.table_name = Some(table_name.to_string());
    }

    /// Declarative source for this column, e.g.
    /// `name = Column(String(64), nullable=False, unique=True)`.
    pub fn generate_schema(&self) -> String {
        let mut args = vec![self.sql_type.schema_name()];
        if self.primary_key {
            args.push("primary_key=True".to_string());
        }
        if self.auto_increment {
            args.push("autoincrement=True".to_string());
        }
        if !self.nullable && !self.primary_key {
            args.push("nullable=False".to_string());
        }
        if self.unique {
            args.push("unique=True".to_string());
        }
        match &self.default {
            ColumnDefault::None => {}
            ColumnDefault::Value(v) => args.push(format!("default={}", v.to_sql_literal())),
            ColumnDefault::Expression(e) => args.push(format!("server_default=\"{e}\"")),
        }
        format!("{} = Column({})", self.name, args.join(", "))
    }
}
