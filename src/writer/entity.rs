//! Entity mappings used by the ORM write path.
//!
//! An [`EntityRegistry`] maps each table to a descriptor and a factory
//! producing an empty [`Entity`]. The writer fills entities field by field, so
//! no runtime reflection is needed.

use std::collections::HashMap;
use std::fmt;

use crate::error::{SchemaError, WriteError};
use crate::parser::SqlValue;
use crate::schema::{MetadataProvider, TableDescriptor, TableId};

/// A mapped row object
pub trait Entity {
    /// Set one mapped column. Called only for columns declared in the mapping.
    fn set_value(&mut self, column: &str, value: SqlValue) -> Result<(), WriteError>;

    /// Values currently held, keyed by column name
    fn values(&self) -> Vec<(String, SqlValue)>;
}

/// Column-to-value map usable for any table
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DynamicEntity {
    values: Vec<(String, SqlValue)>,
}

impl DynamicEntity {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.values.iter().find(|(c, _)| c == column).map(|(_, v)| v)
    }
}

impl Entity for DynamicEntity {
    fn set_value(&mut self, column: &str, value: SqlValue) -> Result<(), WriteError> {
        match self.values.iter_mut().find(|(c, _)| c == column) {
            Some((_, existing)) => *existing = value,
            None => self.values.push((column.to_string(), value)),
        }
        Ok(())
    }

    fn values(&self) -> Vec<(String, SqlValue)> {
        self.values.clone()
    }
}

type EntityFactory = Box<dyn Fn() -> Box<dyn Entity>>;

/// Table descriptor plus a constructor for its entity type
pub struct EntityMapping {
    pub descriptor: TableDescriptor,
    factory: EntityFactory,
}

impl EntityMapping {
    pub fn create(&self) -> Box<dyn Entity> {
        (self.factory)()
    }
}

impl fmt::Debug for EntityMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityMapping")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}

/// Registry of entity mappings keyed by table identity (schema and name)
#[derive(Debug, Default)]
pub struct EntityRegistry {
    mappings: Vec<EntityMapping>,
    by_table: HashMap<TableId, usize>,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a table with an entity type built through `Default`
    pub fn register<E: Entity + Default + 'static>(&mut self, descriptor: TableDescriptor) {
        self.register_with(descriptor, || Box::new(E::default()));
    }

    /// Register a table with an explicit entity constructor
    ///
    /// Registering the same table again replaces the earlier mapping.
    pub fn register_with<F>(&mut self, descriptor: TableDescriptor, factory: F)
    where
        F: Fn() -> Box<dyn Entity> + 'static,
    {
        let id = descriptor.id.clone();
        let mapping = EntityMapping {
            descriptor,
            factory: Box::new(factory),
        };

        match self.by_table.get(&id) {
            Some(&i) => self.mappings[i] = mapping,
            None => {
                self.by_table.insert(id, self.mappings.len());
                self.mappings.push(mapping);
            }
        }
    }

    /// Map every table to a [`DynamicEntity`]
    pub fn from_tables(tables: impl IntoIterator<Item = TableDescriptor>) -> Self {
        let mut registry = Self::new();
        for table in tables {
            registry.register::<DynamicEntity>(table);
        }
        registry
    }

    pub fn get(&self, table: &TableId) -> Option<&EntityMapping> {
        self.by_table.get(table).map(|&i| &self.mappings[i])
    }

    pub fn len(&self) -> usize {
        self.mappings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }
}

impl MetadataProvider for EntityRegistry {
    fn tables(&self) -> Result<Vec<TableDescriptor>, SchemaError> {
        Ok(self.mappings.iter().map(|m| m.descriptor.clone()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ColumnDescriptor, ValueType};

    #[derive(Default)]
    struct Tag {
        id: Option<i64>,
        label: Option<String>,
    }

    impl Entity for Tag {
        fn set_value(&mut self, column: &str, value: SqlValue) -> Result<(), WriteError> {
            match column {
                "id" => self.id = value.as_i64(),
                "label" => self.label = value.as_str().map(str::to_string),
                _ => {}
            }
            Ok(())
        }

        fn values(&self) -> Vec<(String, SqlValue)> {
            vec![
                ("id".to_string(), self.id.into()),
                ("label".to_string(), self.label.clone().into()),
            ]
        }
    }

    fn tags() -> TableDescriptor {
        TableDescriptor::new(TableId::new("tags"))
            .column(ColumnDescriptor::generated("id", ValueType::Integer))
            .column(ColumnDescriptor::new("label", ValueType::Text))
    }

    #[test]
    fn test_register_and_create() {
        let mut registry = EntityRegistry::new();
        registry.register::<Tag>(tags());

        let mapping = registry.get(&TableId::new("tags")).unwrap();
        let mut entity = mapping.create();
        entity.set_value("label", "rust".into()).unwrap();

        assert_eq!(
            entity.values(),
            vec![
                ("id".to_string(), SqlValue::Null),
                ("label".to_string(), SqlValue::Text("rust".into())),
            ]
        );
        assert!(registry.get(&TableId::new("posts")).is_none());
    }

    #[test]
    fn test_registry_is_metadata_provider() {
        let mut registry = EntityRegistry::new();
        registry.register::<Tag>(tags());
        registry.register::<DynamicEntity>(TableDescriptor::new(TableId::new("posts")));
        registry.register::<Tag>(tags());

        let tables = registry.tables().unwrap();
        let names: Vec<_> = tables.iter().map(|t| t.id.name.as_str()).collect();
        assert_eq!(names, vec!["tags", "posts"]);
    }

    #[test]
    fn test_same_name_in_different_schemas_is_kept_apart() {
        let sales = TableId::with_schema("sales", "items");
        let stock = TableId::with_schema("stock", "items");
        let registry = EntityRegistry::from_tables([
            TableDescriptor::new(sales.clone()),
            TableDescriptor::new(stock.clone()),
        ]);

        assert_eq!(registry.len(), 2);
        let ids: Vec<_> = registry.tables().unwrap().into_iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![sales.clone(), stock.clone()]);
        assert_eq!(registry.get(&stock).unwrap().descriptor.id, stock);
        assert!(registry.get(&TableId::new("items")).is_none());
    }

    #[test]
    fn test_dynamic_entity_overwrites() {
        let mut entity = DynamicEntity::new();
        entity.set_value("a", 1i64.into()).unwrap();
        entity.set_value("a", 2i64.into()).unwrap();
        assert_eq!(entity.get("a"), Some(&SqlValue::Integer(2)));
        assert_eq!(entity.values().len(), 1);
    }
}
