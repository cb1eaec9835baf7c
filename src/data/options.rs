use std::collections::BTreeSet;

use serde::Serialize;

use super::filter::{FilterColumn, ALL};
use super::model::Dataset;
use crate::error::{DashError, Result};

/// Selectable values for one filter widget: `"Todos"` followed by the
/// column's distinct values in ascending order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OptionList {
    pub column: String,
    pub values: Vec<String>,
}

impl OptionList {
    /// An option list offering only the wildcard.
    pub fn wildcard_only(column: &str) -> Self {
        OptionList {
            column: column.to_string(),
            values: vec![ALL.to_string()],
        }
    }

    pub fn contains(&self, value: &str) -> bool {
        self.values.iter().any(|v| v == value)
    }

    /// Values without the leading wildcard.
    pub fn choices(&self) -> &[String] {
        &self.values[1..]
    }
}

/// Build the option list of `column` from the unfiltered base dataset.
///
/// Nulls are excluded. Free-text columns are accent-stripped before
/// deduplication so `"São Paulo"` and `"Sao Paulo"` yield one option.
/// An absent optional column yields the wildcard alone; an absent required
/// column is a schema error.
pub fn option_list(base: &Dataset, column: &FilterColumn) -> Result<OptionList> {
    if !base.has_column(&column.name) {
        if column.optional {
            return Ok(OptionList::wildcard_only(&column.name));
        }
        return Err(DashError::missing_column(&column.name));
    }

    let distinct: BTreeSet<String> = base
        .column(&column.name)?
        .filter_map(|v| column.key_of(v))
        .collect();

    let mut values = Vec::with_capacity(distinct.len() + 1);
    values.push(ALL.to_string());
    values.extend(distinct);
    Ok(OptionList {
        column: column.name.clone(),
        values,
    })
}

/// Option lists for every filter of a page, in declaration order.
pub fn option_lists(base: &Dataset, columns: &[FilterColumn]) -> Result<Vec<OptionList>> {
    columns.iter().map(|c| option_list(base, c)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::model::tests::table;

    #[test]
    fn wildcard_heads_sorted_distinct_values() {
        let ds = table(
            &["Tipo"],
            &[&["Ofício"], &["Ata"], &["Ofício"], &[""], &["Memorando"]],
        );
        let list = option_list(&ds, &FilterColumn::new("Tipo")).unwrap();
        assert_eq!(list.values, ["Todos", "Ata", "Memorando", "Ofício"]);
        assert_eq!(list.choices(), ["Ata", "Memorando", "Ofício"]);
    }

    #[test]
    fn values_after_wildcard_are_ascending_and_unique() {
        let ds = table(
            &["Nome"],
            &[&["b"], &["a"], &["c"], &["a"], &["B"], &["b"]],
        );
        let list = option_list(&ds, &FilterColumn::new("Nome")).unwrap();
        let tail = list.choices();
        assert!(tail.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(list.values[0], ALL);
    }

    #[test]
    fn free_text_values_collapse_accents() {
        let ds = table(
            &["Município"],
            &[&["São Paulo"], &["Sao Paulo"], &["Belém"]],
        );
        let list = option_list(&ds, &FilterColumn::new("Município").free_text()).unwrap();
        assert_eq!(list.values, ["Todos", "Belem", "Sao Paulo"]);
    }

    #[test]
    fn absent_optional_column_yields_wildcard_only() {
        let ds = table(&["Tipo"], &[&["Ata"]]);
        let list = option_list(&ds, &FilterColumn::new("Objetivo").optional()).unwrap();
        assert_eq!(list, OptionList::wildcard_only("Objetivo"));
    }

    #[test]
    fn absent_required_column_is_schema_error() {
        let ds = table(&["Tipo"], &[&["Ata"]]);
        assert!(matches!(
            option_list(&ds, &FilterColumn::new("Objetivo")),
            Err(DashError::Schema(_))
        ));
    }

    #[test]
    fn empty_dataset_yields_wildcard_only() {
        let ds = table(&["Tipo"], &[]);
        let list = option_list(&ds, &FilterColumn::new("Tipo")).unwrap();
        assert_eq!(list.values, [ALL]);
    }
}
