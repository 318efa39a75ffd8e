use std::collections::HashSet;
use std::fmt;
use std::result;
use std::sync::Arc;

use serde::de::{self, Deserialize, Deserializer, Visitor};
use serde::forward_to_deserialize_any;

use crate::error::{ConversionError, Error, Result};

/// The type a field's cell text is converted to.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FieldType {
    /// The cell text, verbatim.
    Str,
    /// `true` or `false`, ignoring ASCII case.
    Bool,
    /// Exactly one character.
    Char,
    /// A signed 64-bit integer.
    Int,
    /// An unsigned 64-bit integer.
    UInt,
    /// A 64-bit float.
    Float,
}

impl FieldType {
    /// Convert the text of a cell to a value of this type.
    ///
    /// Every type except `Str` ignores surrounding whitespace.
    pub fn parse(&self, cell: &str) -> result::Result<Value, ConversionError> {
        match *self {
            FieldType::Str => Ok(Value::Str(cell.to_string())),
            FieldType::Bool => {
                let cell = cell.trim();
                if cell.eq_ignore_ascii_case("true") {
                    Ok(Value::Bool(true))
                } else if cell.eq_ignore_ascii_case("false") {
                    Ok(Value::Bool(false))
                } else {
                    Err(ConversionError::ParseBool(cell.to_string()))
                }
            }
            FieldType::Char => {
                let cell = cell.trim();
                let mut chars = cell.chars();
                match (chars.next(), chars.next()) {
                    (Some(c), None) => Ok(Value::Char(c)),
                    _ => Err(ConversionError::Char(cell.chars().count())),
                }
            }
            FieldType::Int => Ok(Value::Int(cell.trim().parse()?)),
            FieldType::UInt => Ok(Value::UInt(cell.trim().parse()?)),
            FieldType::Float => Ok(Value::Float(cell.trim().parse()?)),
        }
    }
}

/// A converted field value, ready to be deserialized into a record.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    /// An empty cell of a field that treats empty as absent.
    Absent,
    Str(String),
    Bool(bool),
    Char(char),
    Int(i64),
    UInt(u64),
    Float(f64),
    /// The cells of a field spanning several columns.
    List(Vec<Value>),
}

/// A custom conversion from cell text to a value.
///
/// This is implemented for every `Fn(&str) -> Result<Value, ConversionError>`
/// closure that is `Send + Sync`, so mappings stay shareable across threads.
pub trait Converter: Send + Sync {
    /// Convert the text of one cell.
    fn convert(
        &self,
        cell: &str,
    ) -> result::Result<Value, ConversionError>;
}

impl<F> Converter for F
where
    F: Fn(&str) -> result::Result<Value, ConversionError> + Send + Sync,
{
    fn convert(
        &self,
        cell: &str,
    ) -> result::Result<Value, ConversionError> {
        (self)(cell)
    }
}

/// How many consecutive cells a field covers.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Span {
    /// A single cell.
    One,
    /// Exactly this many cells, bound as a list.
    Count(usize),
    /// Every cell up to the last non-empty one, bound as a list.
    Rest,
}

/// The binding rule for one field of a record.
#[derive(Clone)]
pub struct FieldRule {
    name: String,
    column: Option<usize>,
    span: Span,
    ty: FieldType,
    empty_as_absent: bool,
    converter: Option<Arc<dyn Converter>>,
}

impl FieldRule {
    /// A rule for a single-cell field.
    ///
    /// Unless `column` is called, the field reads the column following the
    /// previous rule of its mapping.
    pub fn new<S: Into<String>>(name: S, ty: FieldType) -> FieldRule {
        FieldRule {
            name: name.into(),
            column: None,
            span: Span::One,
            ty,
            empty_as_absent: false,
            converter: None,
        }
    }

    /// Read the field from the given column (starting at 0).
    pub fn column(mut self, column: usize) -> FieldRule {
        self.column = Some(column);
        self
    }

    /// Bind `n` consecutive cells to this field as a list.
    pub fn columns(mut self, n: usize) -> FieldRule {
        self.span = Span::Count(n);
        self
    }

    /// Bind the remainder of the line to this field as a list.
    pub fn rest(mut self) -> FieldRule {
        self.span = Span::Rest;
        self
    }

    /// Whether an empty or whitespace-only cell binds as absent (`None`)
    /// instead of being converted.
    ///
    /// A field that treats empty as absent is optional: the line may also
    /// end before its column.
    pub fn empty_as_absent(mut self, yes: bool) -> FieldRule {
        self.empty_as_absent = yes;
        self
    }

    /// Use a custom converter instead of parsing by field type.
    pub fn converter<C: Converter + 'static>(mut self, converter: C) -> FieldRule {
        self.converter = Some(Arc::new(converter));
        self
    }

    /// The field name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The first column this field reads.
    ///
    /// This is only meaningful for rules taken from a built mapping.
    pub fn index(&self) -> usize {
        self.column.unwrap_or(0)
    }

    pub fn span(&self) -> Span {
        self.span
    }

    pub fn field_type(&self) -> FieldType {
        self.ty
    }

    pub fn is_empty_as_absent(&self) -> bool {
        self.empty_as_absent
    }

    /// Convert the text of one of this field's cells.
    ///
    /// Empty-as-absent takes precedence over both the converter and the
    /// field type.
    pub fn convert(
        &self,
        cell: &str,
    ) -> result::Result<Value, ConversionError> {
        if self.empty_as_absent && cell.trim().is_empty() {
            return Ok(Value::Absent);
        }
        match self.converter {
            Some(ref converter) => converter.convert(cell),
            None => self.ty.parse(cell),
        }
    }

    /// The number of cells a line needs for this field to be complete.
    fn required_len(&self) -> usize {
        if self.empty_as_absent {
            return 0;
        }
        match self.span {
            Span::One => self.index() + 1,
            Span::Count(n) => self.index() + n,
            Span::Rest => self.index(),
        }
    }
}

impl fmt::Debug for FieldRule {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("FieldRule")
            .field("name", &self.name)
            .field("column", &self.column)
            .field("span", &self.span)
            .field("ty", &self.ty)
            .field("empty_as_absent", &self.empty_as_absent)
            .field("converter", &self.converter.is_some())
            .finish()
    }
}

/// The immutable table of field rules for one record type.
///
/// A mapping is built once and may be shared by any number of readers.
#[derive(Clone, Debug)]
pub struct FieldMapping {
    rules: Vec<FieldRule>,
    align_index: Option<String>,
    min_len: usize,
}

impl FieldMapping {
    /// Start building a mapping.
    pub fn builder() -> FieldMappingBuilder {
        FieldMappingBuilder::new()
    }

    /// All rules, in declaration order.
    pub fn rules(&self) -> &[FieldRule] {
        &self.rules
    }

    /// Look up a rule by field name.
    pub fn get(&self, name: &str) -> Option<&FieldRule> {
        self.rules.iter().find(|r| r.name == name)
    }

    /// The number of rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Always false for a built mapping.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// The minimum number of cells a line needs to satisfy every mandatory
    /// field.
    pub fn min_len(&self) -> usize {
        self.min_len
    }

    /// The record field that receives the align index, if any.
    pub fn align_index_field(&self) -> Option<&str> {
        self.align_index.as_ref().map(|s| &**s)
    }

    /// Verify that this mapping covers exactly the fields of struct `T`.
    ///
    /// Every field `T` declares must have a rule (or be the align index
    /// field), and every rule must name a field of `T`. Types that do not
    /// deserialize as a struct are not checked.
    pub fn check<T>(&self) -> Result<()>
    where
        T: for<'de> Deserialize<'de>,
    {
        let fields = match struct_fields::<T>() {
            None => return Ok(()),
            Some(fields) => fields,
        };
        for &field in fields {
            if self.align_index_field() == Some(field) {
                continue;
            }
            if self.get(field).is_none() {
                return Err(Error::config(format!(
                    "record field '{}' has no field rule",
                    field
                )));
            }
        }
        for rule in &self.rules {
            if !fields.iter().any(|&f| f == rule.name()) {
                return Err(Error::config(format!(
                    "field rule '{}' does not name a record field",
                    rule.name()
                )));
            }
        }
        if let Some(name) = self.align_index_field() {
            if !fields.iter().any(|&f| f == name) {
                return Err(Error::config(format!(
                    "align index field '{}' does not name a record field",
                    name
                )));
            }
        }
        Ok(())
    }
}

/// Builds a `FieldMapping`.
#[derive(Clone, Debug, Default)]
pub struct FieldMappingBuilder {
    rules: Vec<FieldRule>,
    align_index: Option<String>,
}

impl FieldMappingBuilder {
    /// Create a builder with no rules.
    pub fn new() -> FieldMappingBuilder {
        FieldMappingBuilder::default()
    }

    /// Add a single-cell field reading the next column.
    pub fn field<S: Into<String>>(
        &mut self,
        name: S,
        ty: FieldType,
    ) -> &mut FieldMappingBuilder {
        self.rule(FieldRule::new(name, ty))
    }

    /// Add a rule.
    pub fn rule(&mut self, rule: FieldRule) -> &mut FieldMappingBuilder {
        self.rules.push(rule);
        self
    }

    /// Name the record field that receives the align index of each line.
    pub fn align_index<S: Into<String>>(
        &mut self,
        name: S,
    ) -> &mut FieldMappingBuilder {
        self.align_index = Some(name.into());
        self
    }

    /// Build the mapping.
    ///
    /// This fails when there are no rules, when two rules share a name, when
    /// a list spans zero columns, when a rule without an explicit column
    /// follows a rest-of-line rule, or when the align index field is also a
    /// rule.
    pub fn build(&self) -> Result<FieldMapping> {
        if self.rules.is_empty() {
            return Err(Error::config("field mapping has no field rules"));
        }
        let mut names = HashSet::new();
        let mut rules = Vec::with_capacity(self.rules.len());
        let mut next = Some(0);
        for rule in &self.rules {
            if !names.insert(rule.name.as_str()) {
                return Err(Error::config(format!(
                    "duplicate field rule '{}'",
                    rule.name
                )));
            }
            let mut rule = rule.clone();
            let column = match rule.column.or(next) {
                Some(column) => column,
                None => {
                    return Err(Error::config(format!(
                        "field rule '{}' follows a rest-of-line field and \
                         needs an explicit column",
                        rule.name
                    )))
                }
            };
            rule.column = Some(column);
            next = match rule.span {
                Span::One => Some(column + 1),
                Span::Count(0) => {
                    return Err(Error::config(format!(
                        "field rule '{}' spans zero columns",
                        rule.name
                    )))
                }
                Span::Count(n) => Some(column + n),
                Span::Rest => None,
            };
            rules.push(rule);
        }
        if let Some(ref name) = self.align_index {
            if names.contains(name.as_str()) {
                return Err(Error::config(format!(
                    "align index field '{}' is also a field rule",
                    name
                )));
            }
        }
        let min_len = rules.iter().map(|r| r.required_len()).max().unwrap_or(0);
        Ok(FieldMapping { rules, align_index: self.align_index.clone(), min_len })
    }
}

/// Discover the field names of a struct through its `Deserialize` impl.
fn struct_fields<T>() -> Option<&'static [&'static str]>
where
    T: for<'de> Deserialize<'de>,
{
    let mut fields = None;
    let _ = T::deserialize(FieldProbe { fields: &mut fields });
    fields
}

/// A deserializer that records the fields a struct asks for and then fails.
struct FieldProbe<'a> {
    fields: &'a mut Option<&'static [&'static str]>,
}

impl<'a, 'de> Deserializer<'de> for FieldProbe<'a> {
    type Error = de::value::Error;

    fn deserialize_any<V: Visitor<'de>>(
        self,
        _visitor: V,
    ) -> result::Result<V::Value, Self::Error> {
        Err(de::Error::custom("not a struct"))
    }

    fn deserialize_struct<V: Visitor<'de>>(
        self,
        _name: &'static str,
        fields: &'static [&'static str],
        _visitor: V,
    ) -> result::Result<V::Value, Self::Error> {
        *self.fields = Some(fields);
        Err(de::Error::custom("probed"))
    }

    forward_to_deserialize_any! {
        bool i8 i16 i32 i64 u8 u16 u32 u64 f32 f64 char str string
        bytes byte_buf option unit unit_struct newtype_struct seq tuple
        tuple_struct map enum identifier ignored_any
    }
}
