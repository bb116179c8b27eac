use std::collections::HashSet;

use crate::error::{SchemaError, SeedError, SeedResult};
use crate::schema::DatasetInfo;

/// Apply include/exclude filters to an ordered table list, keeping the order
///
/// Names match either the bare table name or `schema.name`.
pub fn filter_tables(
    ordered: Vec<DatasetInfo>,
    include: Option<&[String]>,
    exclude: Option<&[String]>,
) -> SeedResult<Vec<DatasetInfo>> {
    match (include, exclude) {
        (Some(_), Some(_)) => Err(SeedError::Config(
            "cannot use both include and exclude at the same time".to_string(),
        )),
        (Some(include_list), None) => {
            let wanted = validate(&ordered, include_list)?;
            Ok(ordered
                .into_iter()
                .filter(|t| wanted.iter().any(|w| matches_name(t, w)))
                .collect())
        }
        (None, Some(exclude_list)) => {
            let unwanted = validate(&ordered, exclude_list)?;
            Ok(ordered
                .into_iter()
                .filter(|t| !unwanted.iter().any(|w| matches_name(t, w)))
                .collect())
        }
        (None, None) => Ok(ordered),
    }
}

fn validate<'a>(tables: &[DatasetInfo], names: &'a [String]) -> SeedResult<HashSet<&'a str>> {
    for name in names {
        if !tables.iter().any(|t| matches_name(t, name)) {
            return Err(SchemaError::TableNotFound {
                table: DatasetInfo::new(name.clone()),
                referenced_by: None,
            }
            .into());
        }
    }
    Ok(names.iter().map(String::as_str).collect())
}

fn matches_name(table: &DatasetInfo, name: &str) -> bool {
    table.name == name || table.to_string() == name
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ordered() -> Vec<DatasetInfo> {
        vec![
            DatasetInfo::new("customers"),
            DatasetInfo::new("orders"),
            DatasetInfo::with_schema("audit", "log"),
        ]
    }

    fn names(tables: &[DatasetInfo]) -> Vec<String> {
        tables.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn test_include_keeps_order() {
        let include = vec!["orders".to_string(), "customers".to_string()];
        let tables = filter_tables(ordered(), Some(&include), None).unwrap();
        assert_eq!(names(&tables), vec!["customers", "orders"]);
    }

    #[test]
    fn test_exclude_by_qualified_name() {
        let exclude = vec!["audit.log".to_string()];
        let tables = filter_tables(ordered(), None, Some(&exclude)).unwrap();
        assert_eq!(names(&tables), vec!["customers", "orders"]);
    }

    #[test]
    fn test_unknown_table_error() {
        let include = vec!["nonexistent".to_string()];
        assert!(matches!(
            filter_tables(ordered(), Some(&include), None),
            Err(SeedError::Schema(SchemaError::TableNotFound { .. }))
        ));
    }

    #[test]
    fn test_both_filters_rejected() {
        let list = vec!["orders".to_string()];
        assert!(matches!(
            filter_tables(ordered(), Some(&list), Some(&list)),
            Err(SeedError::Config(_))
        ));
    }
}
