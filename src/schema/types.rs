use std::fmt;

/// Declared value type of a column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Integer,
    Real,
    Text,
    /// Stored as INTEGER 0/1
    Boolean,
    Blob,
    /// No declared affinity; any value is accepted as-is
    Any,
}

impl ValueType {
    /// Map a SQLite declared column type to a value type using SQLite's affinity rules
    pub fn from_declared(decl: &str) -> Self {
        let decl = decl.to_ascii_uppercase();

        if decl.contains("BOOL") {
            ValueType::Boolean
        } else if decl.contains("INT") {
            ValueType::Integer
        } else if decl.contains("CHAR") || decl.contains("CLOB") || decl.contains("TEXT") {
            ValueType::Text
        } else if decl.contains("BLOB") {
            ValueType::Blob
        } else if decl.contains("REAL") || decl.contains("FLOA") || decl.contains("DOUB") {
            ValueType::Real
        } else {
            ValueType::Any
        }
    }
}

/// Identity of a table: optional schema plus name.
///
/// Also serves as the dataset handle (`DatasetInfo`) used for ordering and as
/// the current-table token of a seeding session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TableId {
    pub schema: Option<String>,
    pub name: String,
}

/// One seedable table.
pub type DatasetInfo = TableId;

impl TableId {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            schema: None,
            name: name.into(),
        }
    }

    pub fn with_schema(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: Some(schema.into()),
            name: name.into(),
        }
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.schema {
            Some(schema) => write!(f, "{}.{}", schema, self.name),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Column definition
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDescriptor {
    pub name: String,
    pub value_type: ValueType,
    /// Identity-like key the database assigns unless a value is supplied (rowid alias)
    pub is_generated: bool,
    /// Computed by the database from other columns; never written
    pub is_computed: bool,
}

impl ColumnDescriptor {
    pub fn new(name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            value_type,
            is_generated: false,
            is_computed: false,
        }
    }

    /// Create a database-generated column
    pub fn generated(name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            is_generated: true,
            ..Self::new(name, value_type)
        }
    }

    /// Create a computed (`GENERATED ALWAYS AS`) column
    pub fn computed(name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            is_computed: true,
            ..Self::new(name, value_type)
        }
    }
}

/// Directed foreign key relationship: `dependent` holds columns referencing `principal`
#[derive(Debug, Clone, PartialEq)]
pub struct ForeignKeyEdge {
    pub dependent: TableId,
    pub principal: TableId,
    /// (dependent column, principal column) pairs; empty when unknown
    pub columns: Vec<(String, String)>,
}

impl ForeignKeyEdge {
    pub fn new(dependent: TableId, principal: TableId) -> Self {
        Self {
            dependent,
            principal,
            columns: Vec::new(),
        }
    }

    pub fn column(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.columns.push((from.into(), to.into()));
        self
    }

    pub fn is_self_reference(&self) -> bool {
        self.dependent == self.principal
    }
}

/// Table schema definition
#[derive(Debug, Clone, PartialEq)]
pub struct TableDescriptor {
    pub id: TableId,
    pub columns: Vec<ColumnDescriptor>,
    /// Outgoing edges; every edge has `dependent == id`
    pub foreign_keys: Vec<ForeignKeyEdge>,
}

impl TableDescriptor {
    pub fn new(id: TableId) -> Self {
        Self {
            id,
            columns: Vec::new(),
            foreign_keys: Vec::new(),
        }
    }

    pub fn column(mut self, column: ColumnDescriptor) -> Self {
        self.columns.push(column);
        self
    }

    /// Add a foreign key to `principal`
    pub fn references(mut self, principal: TableId) -> Self {
        let edge = ForeignKeyEdge::new(self.id.clone(), principal);
        self.foreign_keys.push(edge);
        self
    }

    pub fn get_column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_generated_columns(&self) -> bool {
        self.columns.iter().any(|c| c.is_generated)
    }
}
