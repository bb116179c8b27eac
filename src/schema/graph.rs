use std::collections::HashMap;

use super::types::{TableDescriptor, TableId};
use crate::error::SchemaError;

/// Supplies table, column and foreign key descriptors. Read once per engine.
pub trait MetadataProvider {
    fn tables(&self) -> Result<Vec<TableDescriptor>, SchemaError>;
}

impl MetadataProvider for Vec<TableDescriptor> {
    fn tables(&self) -> Result<Vec<TableDescriptor>, SchemaError> {
        Ok(self.clone())
    }
}

impl MetadataProvider for [TableDescriptor] {
    fn tables(&self) -> Result<Vec<TableDescriptor>, SchemaError> {
        Ok(self.to_vec())
    }
}

/// In-memory graph of tables and foreign key edges
#[derive(Debug, Clone)]
pub struct SchemaGraph {
    tables: Vec<TableDescriptor>,
    index: HashMap<TableId, usize>,
    /// table index -> indices of tables it references
    principals: Vec<Vec<usize>>,
    /// table index -> indices of tables referencing it
    dependents: Vec<Vec<usize>>,
}

impl SchemaGraph {
    pub fn build(provider: &(impl MetadataProvider + ?Sized)) -> Result<Self, SchemaError> {
        Self::from_tables(provider.tables()?)
    }

    pub fn from_tables(tables: Vec<TableDescriptor>) -> Result<Self, SchemaError> {
        let mut index = HashMap::with_capacity(tables.len());
        for (i, table) in tables.iter().enumerate() {
            if index.insert(table.id.clone(), i).is_some() {
                return Err(SchemaError::DuplicateTable(table.id.clone()));
            }
        }

        let mut principals: Vec<Vec<usize>> = vec![Vec::new(); tables.len()];
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); tables.len()];

        for (dep_idx, table) in tables.iter().enumerate() {
            for fk in &table.foreign_keys {
                let principal_idx =
                    *index
                        .get(&fk.principal)
                        .ok_or_else(|| SchemaError::TableNotFound {
                            table: fk.principal.clone(),
                            referenced_by: Some(table.id.clone()),
                        })?;

                // Composite or repeated keys between the same pair collapse to one edge
                if !principals[dep_idx].contains(&principal_idx) {
                    principals[dep_idx].push(principal_idx);
                }
                if !dependents[principal_idx].contains(&dep_idx) {
                    dependents[principal_idx].push(dep_idx);
                }
            }
        }

        Ok(Self {
            tables,
            index,
            principals,
            dependents,
        })
    }

    /// All tables in metadata enumeration order
    pub fn tables(&self) -> &[TableDescriptor] {
        &self.tables
    }

    pub fn table(&self, id: &TableId) -> Option<&TableDescriptor> {
        self.index.get(id).map(|&i| &self.tables[i])
    }

    pub fn contains(&self, id: &TableId) -> bool {
        self.index.contains_key(id)
    }

    /// Tables that `id` depends on
    pub fn principals(&self, id: &TableId) -> Vec<&TableId> {
        self.neighbours(id, &self.principals)
    }

    /// Tables that depend on `id`
    pub fn dependents(&self, id: &TableId) -> Vec<&TableId> {
        self.neighbours(id, &self.dependents)
    }

    fn neighbours<'a>(&'a self, id: &TableId, edges: &'a [Vec<usize>]) -> Vec<&'a TableId> {
        match self.index.get(id) {
            Some(&i) => edges[i].iter().map(|&j| &self.tables[j].id).collect(),
            None => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shop() -> Vec<TableDescriptor> {
        let customers = TableId::new("customers");
        let orders = TableId::new("orders");
        vec![
            TableDescriptor::new(customers.clone()),
            TableDescriptor::new(orders.clone()).references(customers.clone()),
            TableDescriptor::new(TableId::new("order_lines")).references(orders),
            // billing and shipping addresses both reference customers
            TableDescriptor::new(TableId::new("addresses"))
                .references(customers.clone())
                .references(customers),
        ]
    }

    #[test]
    fn test_principals_and_dependents() {
        let graph = SchemaGraph::build(&shop()).unwrap();
        let customers = TableId::new("customers");
        let orders = TableId::new("orders");

        let deps: Vec<_> = graph.dependents(&customers).into_iter().cloned().collect();
        assert_eq!(deps, vec![orders.clone(), TableId::new("addresses")]);

        let parents: Vec<_> = graph.principals(&orders).into_iter().cloned().collect();
        assert_eq!(parents, vec![customers.clone()]);

        assert!(graph.principals(&customers).is_empty());
    }

    #[test]
    fn test_missing_principal_is_schema_error() {
        let tables = vec![TableDescriptor::new(TableId::new("orders"))
            .references(TableId::new("customers"))];

        match SchemaGraph::build(&tables) {
            Err(SchemaError::TableNotFound {
                table,
                referenced_by,
            }) => {
                assert_eq!(table, TableId::new("customers"));
                assert_eq!(referenced_by, Some(TableId::new("orders")));
            }
            other => panic!("expected TableNotFound, got {:?}", other),
        }
    }

    #[test]
    fn test_duplicate_table_rejected() {
        let tables = vec![
            TableDescriptor::new(TableId::new("a")),
            TableDescriptor::new(TableId::new("a")),
        ];
        assert!(matches!(
            SchemaGraph::build(&tables),
            Err(SchemaError::DuplicateTable(_))
        ));
    }

    #[test]
    fn test_same_name_in_different_schemas() {
        let tables = vec![
            TableDescriptor::new(TableId::with_schema("sales", "items")),
            TableDescriptor::new(TableId::with_schema("stock", "items")),
        ];
        let graph = SchemaGraph::build(&tables).unwrap();
        assert_eq!(graph.tables().len(), 2);
        assert!(graph.contains(&TableId::with_schema("stock", "items")));
        assert!(!graph.contains(&TableId::new("items")));
    }
}
