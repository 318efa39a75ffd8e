/*!
The `csv-bind` crate binds lines of delimited text to typed records.

Each line of input is split into cells, cleaned of comments, optionally
left-aligned and then bound to a record by a `FieldMapping`, which says which
columns feed which fields of the record and how their text is converted. The
record type itself only needs to implement Serde's `Deserialize` trait.

Records are produced lazily by a `Reader`. It reads at most one record ahead,
skips comment and blank lines, and reports a line that fails to bind as an
error in its place without stopping.

# Example

```
use csv_bind::{FieldMapping, FieldType, ReaderBuilder};
use serde::Deserialize;

#[derive(Debug, Deserialize, PartialEq)]
struct Setting {
    key: String,
    value: i64,
}

# fn main() -> csv_bind::Result<()> {
let mapping = FieldMapping::builder()
    .field("key", FieldType::Str)
    .field("value", FieldType::Int)
    .build()?;

let data = "\
## limits
width=80

height=24
";
let mut rdr = ReaderBuilder::new()
    .delimiter(b'=')
    .from_reader(data.as_bytes(), mapping)?;
let mut settings = vec![];
while rdr.has_next()? {
    let setting: Setting = rdr.next_record()?;
    settings.push(setting);
}
assert_eq!(settings, vec![
    Setting { key: "width".to_string(), value: 80 },
    Setting { key: "height".to_string(), value: 24 },
]);
# Ok(())
# }
```

See the [`tutorial`](tutorial/index.html) for field rules, alignment and
error handling.
*/

pub use crate::binder::Binder;
pub use crate::deserializer::{DeserializeError, DeserializeErrorKind};
pub use crate::error::{
    BindError, BindErrorKind, ConversionError, Error, Result,
};
pub use crate::mapping::{
    Converter, FieldMapping, FieldMappingBuilder, FieldRule, FieldType, Span,
    Value,
};
pub use crate::preprocess::{Align, LineKind, Preprocessor};
pub use crate::reader::{
    read_line, Reader, ReaderBuilder, RecordsIntoIter, RecordsIter,
};
pub use crate::source::{CsvSource, IterSource, LineSource, RawLine};

mod binder;
mod deserializer;
mod error;
mod mapping;
mod preprocess;
mod reader;
mod source;
pub mod tutorial;
