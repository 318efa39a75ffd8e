/*!
A tutorial for binding delimited text with `csv-bind`.

# Outline

1. [Mappings](#mappings)
2. [Wide fields](#wide-fields)
3. [Optional and custom fields](#optional-and-custom-fields)
4. [Comments and alignment](#comments-and-alignment)
5. [Handling errors](#handling-errors)
6. [Single lines](#single-lines)

# Mappings

A `FieldMapping` lists one rule per record field. Without an explicit column,
a rule reads the column after the previous rule, so the common case of
fields laid out left to right needs nothing more than a name and a type:

```
use csv_bind::{FieldMapping, FieldType, Reader};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct City {
    name: String,
    population: u64,
    coastal: bool,
}

# fn main() -> csv_bind::Result<()> {
let mapping = FieldMapping::builder()
    .field("name", FieldType::Str)
    .field("population", FieldType::UInt)
    .field("coastal", FieldType::Bool)
    .build()?;

let data = "Boston,694583,TRUE\nDenver, 715522 ,false\n";
let rdr = Reader::from_reader(data.as_bytes(), mapping)?;
for result in rdr {
    let city: City = result?;
    println!("{:?}", city);
}
# Ok(())
# }
```

Building a reader checks the mapping against the record type. Every field of
`City` must have a rule and every rule must name a field, otherwise the reader
is never built and a `Configuration` error is returned.

A mapping can be shared between readers by wrapping it in an `Arc`; readers
only ever read it.

# Wide fields

A rule can cover more than one column. `columns(n)` reads exactly `n`
cells and `rest()` reads every cell up to the last non-empty one. Such
fields deserialize as sequences:

```
use csv_bind::{FieldMapping, FieldRule, FieldType, Reader};
use serde::Deserialize;

#[derive(Debug, Deserialize, PartialEq)]
struct Sample {
    sensor: String,
    xyz: (f64, f64, f64),
    tags: Vec<String>,
}

# fn main() -> csv_bind::Result<()> {
let mapping = FieldMapping::builder()
    .field("sensor", FieldType::Str)
    .rule(FieldRule::new("xyz", FieldType::Float).columns(3))
    .rule(FieldRule::new("tags", FieldType::Str).rest())
    .build()?;

let data = "s1,0.5,1,2,hot,dry,,\n";
let mut rdr = Reader::from_reader(data.as_bytes(), mapping)?;
let sample: Sample = rdr.next_record()?;
assert_eq!(sample, Sample {
    sensor: "s1".to_string(),
    xyz: (0.5, 1.0, 2.0),
    tags: vec!["hot".to_string(), "dry".to_string()],
});
# Ok(())
# }
```

# Optional and custom fields

With `empty_as_absent(true)`, an empty or whitespace-only cell skips
conversion and binds as `None`. A converter replaces the conversion of the
rule's type entirely:

```
use csv_bind::{ConversionError, FieldMapping, FieldRule, FieldType, Reader, Value};
use serde::Deserialize;

#[derive(Debug, Deserialize, PartialEq)]
struct Item {
    sku: String,
    price: Option<f64>,
}

# fn main() -> csv_bind::Result<()> {
let mapping = FieldMapping::builder()
    .rule(FieldRule::new("sku", FieldType::Str).converter(
        |s: &str| -> Result<Value, ConversionError> {
            Ok(Value::Str(s.trim().to_uppercase()))
        },
    ))
    .rule(FieldRule::new("price", FieldType::Float).empty_as_absent(true))
    .build()?;

let mut rdr = Reader::from_reader("ab-1, \ncd-2,9.5\n".as_bytes(), mapping)?;
let items: Vec<Item> = rdr.records().collect::<csv_bind::Result<_>>()?;
assert_eq!(items, vec![
    Item { sku: "AB-1".to_string(), price: None },
    Item { sku: "CD-2".to_string(), price: Some(9.5) },
]);
# Ok(())
# }
```

# Comments and alignment

A line with a cell that starts with the comment character (`#` by default,
ignoring leading whitespace) is a comment and is skipped, even when data
comes before that cell. Blank lines are skipped too.

With `Align::Left`, leading empty cells are dropped before binding. The
number of dropped cells can be bound to a field of its own, which is handy
for indented, tree-like data:

```
use csv_bind::{Align, FieldMapping, FieldType, ReaderBuilder};
use serde::Deserialize;

#[derive(Debug, Deserialize, PartialEq)]
struct Node {
    name: String,
    depth: usize,
}

# fn main() -> csv_bind::Result<()> {
let mapping = FieldMapping::builder()
    .field("name", FieldType::Str)
    .align_index("depth")
    .build()?;

let data = "\
root
,child
,,# the first leaf
,,leaf
";
let mut rdr = ReaderBuilder::new()
    .align(Align::Left)
    .from_reader(data.as_bytes(), mapping)?;
let nodes: Vec<Node> = rdr.records().collect::<csv_bind::Result<_>>()?;
assert_eq!(nodes[1], Node { name: "child".to_string(), depth: 1 });
assert_eq!(nodes[2], Node { name: "leaf".to_string(), depth: 2 });
# Ok(())
# }
```

A comment character in the middle of a cell, as in `a#b`, is data.

# Handling errors

A line that cannot be bound is reported as an `Error::Bind` in place of its
record. The error carries the line number, the raw text of the line and
what went wrong. Reading carries on with the next line. An I/O error ends
the reader instead.

```
use csv_bind::{FieldMapping, FieldType, Reader};

# fn main() -> csv_bind::Result<()> {
let mapping = FieldMapping::builder()
    .field("id", FieldType::Int)
    .build()?;

let mut rdr = Reader::from_reader("1\ntwo\n3\n".as_bytes(), mapping)?;
let mut ids: Vec<i64> = vec![];
let mut bad = vec![];
for result in rdr.records() {
    match result {
        Ok(id) => ids.push(id),
        Err(err) if err.is_recoverable() => {
            bad.push(err.as_bind_error().unwrap().line());
        }
        Err(err) => return Err(err),
    }
}
assert_eq!(ids, vec![1, 3]);
assert_eq!(bad, vec![Some(2)]);
# Ok(())
# }
```

# Single lines

`read_line` binds one line of text without managing a reader:

```
use csv_bind::{read_line, FieldMapping, FieldType};

# fn main() -> csv_bind::Result<()> {
let mapping = FieldMapping::builder()
    .field("x", FieldType::Int)
    .field("y", FieldType::Int)
    .build()?;

let point: Option<(i64, i64)> = read_line("3,4", mapping)?;
assert_eq!(point, Some((3, 4)));
# Ok(())
# }
```

An empty line, or one holding only a comment, gives `None`.
*/
