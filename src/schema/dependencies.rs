use std::collections::HashSet;

use super::graph::SchemaGraph;
use super::types::{DatasetInfo, TableId};
use crate::error::SchemaError;

/// Computes the order in which tables can be seeded
///
/// Principals always come before the tables that reference them. The walk is a
/// depth-first post-order over "referenced by" edges: each table is emitted
/// after all of its dependents, and the list is reversed at the end.
pub struct TableOrderResolver<'a> {
    graph: &'a SchemaGraph,
}

impl<'a> TableOrderResolver<'a> {
    pub fn new(graph: &'a SchemaGraph) -> Self {
        Self { graph }
    }

    /// Return every table in dependency order (parents before children)
    pub fn resolve(&self) -> Result<Vec<DatasetInfo>, SchemaError> {
        let mut result: Vec<&TableId> = Vec::with_capacity(self.graph.tables().len());
        let mut visited: HashSet<&TableId> = HashSet::new();
        let mut stack: Vec<&TableId> = Vec::new();

        for table in self.graph.tables() {
            if !visited.contains(&table.id) {
                self.visit(&table.id, &mut visited, &mut stack, &mut result)?;
            }
        }

        result.reverse();
        Ok(result.into_iter().cloned().collect())
    }

    fn visit(
        &self,
        id: &'a TableId,
        visited: &mut HashSet<&'a TableId>,
        stack: &mut Vec<&'a TableId>,
        result: &mut Vec<&'a TableId>,
    ) -> Result<(), SchemaError> {
        if let Some(pos) = stack.iter().position(|t| *t == id) {
            let mut chain: Vec<TableId> = stack[pos..].iter().map(|t| (*t).clone()).collect();
            chain.push(id.clone());
            return Err(SchemaError::Cycle {
                table: id.clone(),
                chain,
            });
        }
        if visited.contains(id) {
            return Ok(());
        }

        stack.push(id);

        for dependent in self.graph.dependents(id) {
            // Self-references (e.g. employees.manager_id -> employees) never block ordering
            if dependent != id {
                self.visit(dependent, visited, stack, result)?;
            }
        }

        stack.pop();
        visited.insert(id);
        result.push(id);

        Ok(())
    }
}
