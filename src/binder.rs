use std::sync::Arc;

use serde::de::DeserializeOwned;

use crate::deserializer::DeRecord;
use crate::error::BindErrorKind;
use crate::mapping::{FieldMapping, FieldRule, Span, Value};
use crate::source::RawLine;

/// Binds the cells of a data line to a record using a field mapping.
///
/// The binder converts every rule's cells into a `Value` and then lets the
/// record's `Deserialize` impl pick them up. Converted values are kept in a
/// buffer that is reused from line to line and cleared before each bind.
#[derive(Debug)]
pub struct Binder {
    mapping: Arc<FieldMapping>,
    values: Vec<Value>,
}

impl Binder {
    /// Create a binder for the given mapping.
    pub fn new(mapping: Arc<FieldMapping>) -> Binder {
        let values = Vec::with_capacity(mapping.len());
        Binder { mapping, values }
    }

    /// The mapping this binder applies.
    pub fn mapping(&self) -> &Arc<FieldMapping> {
        &self.mapping
    }

    /// Discard the values converted for the previous line.
    pub fn reset(&mut self) {
        self.values.clear();
    }

    /// Bind one preprocessed line to a record.
    ///
    /// `align_index` is handed to the record if its mapping names an align
    /// index field.
    pub fn bind<T: DeserializeOwned>(
        &mut self,
        cells: &RawLine,
        align_index: usize,
    ) -> Result<T, BindErrorKind> {
        self.reset();
        if cells.len() < self.mapping.min_len() {
            return Err(BindErrorKind::TooFewCells {
                expected: self.mapping.min_len(),
                found: cells.len(),
            });
        }
        for rule in self.mapping.rules() {
            let value = bind_rule(rule, cells)?;
            self.values.push(value);
        }
        let mut de = DeRecord::new(&self.mapping, &self.values, align_index);
        T::deserialize(&mut de).map_err(BindErrorKind::Deserialize)
    }
}

fn bind_rule(rule: &FieldRule, cells: &RawLine) -> Result<Value, BindErrorKind> {
    let start = rule.index();
    let end = match rule.span() {
        Span::One => return bind_cell(rule, start, cells),
        Span::Count(n) => start + n,
        Span::Rest => {
            let last = cells.iter().rposition(|c| !cell_text(c).trim().is_empty());
            match last {
                Some(last) if last >= start => last + 1,
                _ => start,
            }
        }
    };
    let mut items = Vec::with_capacity(end - start);
    for column in start..end {
        items.push(bind_cell(rule, column, cells)?);
    }
    Ok(Value::List(items))
}

fn bind_cell(
    rule: &FieldRule,
    column: usize,
    cells: &RawLine,
) -> Result<Value, BindErrorKind> {
    let text = match cells.get(column) {
        Some(&Some(ref text)) => text.as_str(),
        _ if rule.is_empty_as_absent() => "",
        _ => {
            return Err(BindErrorKind::MissingCell {
                field: rule.name().to_string(),
                column,
            })
        }
    };
    rule.convert(text).map_err(|err| BindErrorKind::Convert {
        field: rule.name().to_string(),
        column,
        err,
    })
}

fn cell_text(cell: &Option<String>) -> &str {
    cell.as_ref().map_or("", |s| s.as_str())
}
