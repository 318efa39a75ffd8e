use std::fs::File;
use std::io;
use std::mem;
use std::path::Path;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use tracing::{debug, trace, warn};

use crate::binder::Binder;
use crate::error::{BindError, Error, Result};
use crate::mapping::FieldMapping;
use crate::preprocess::{Align, LineKind, Preprocessor};
use crate::source::{CsvSource, LineSource, RawLine};

/// Builds a CSV reader with various configuration knobs.
///
/// This builder can be used to tweak the delimiter, quote and comment
/// characters as well as the alignment of cells. Once a reader is built, its
/// configuration cannot be changed.
#[derive(Clone, Debug)]
pub struct ReaderBuilder {
    delimiter: u8,
    quote: u8,
    comment: Option<u8>,
    align: Align,
    capacity: usize,
}

impl Default for ReaderBuilder {
    fn default() -> ReaderBuilder {
        ReaderBuilder {
            delimiter: b',',
            quote: b'"',
            comment: Some(b'#'),
            align: Align::None,
            capacity: 8 * (1 << 10),
        }
    }
}

impl ReaderBuilder {
    /// Create a new builder for configuring CSV parsing.
    ///
    /// To convert a builder into a reader, call one of the methods starting
    /// with `from_`.
    pub fn new() -> ReaderBuilder {
        ReaderBuilder::default()
    }

    /// Build a reader that tokenizes the given `io::Read`.
    ///
    /// This fails with a configuration error if `mapping` does not cover
    /// the fields of `T`.
    pub fn from_reader<R, T, M>(
        &self,
        rdr: R,
        mapping: M,
    ) -> Result<Reader<CsvSource<R>, T>>
    where
        R: io::Read,
        T: DeserializeOwned,
        M: Into<Arc<FieldMapping>>,
    {
        let core = csv_core::ReaderBuilder::new()
            .delimiter(self.delimiter)
            .quote(self.quote)
            .build();
        let source = CsvSource::with_core(core, self.capacity, rdr);
        self.from_source(source, mapping)
    }

    /// Build a reader over the file at the given path.
    ///
    /// If there was a problem opening the file, then this returns the
    /// corresponding I/O error.
    pub fn from_path<P, T, M>(
        &self,
        path: P,
        mapping: M,
    ) -> Result<Reader<CsvSource<File>, T>>
    where
        P: AsRef<Path>,
        T: DeserializeOwned,
        M: Into<Arc<FieldMapping>>,
    {
        self.from_reader(File::open(path)?, mapping)
    }

    /// Build a reader over lines that are already split into cells.
    ///
    /// The source does its own tokenizing, so the quote setting is unused and
    /// the delimiter only serves to render failing lines in errors.
    pub fn from_source<S, T, M>(&self, source: S, mapping: M) -> Result<Reader<S, T>>
    where
        S: LineSource,
        T: DeserializeOwned,
        M: Into<Arc<FieldMapping>>,
    {
        let mapping = mapping.into();
        mapping.check::<T>()?;
        Ok(Reader {
            source,
            pre: Preprocessor::new(self.comment.map(char::from), self.align),
            binder: Binder::new(mapping),
            delimiter: char::from(self.delimiter),
            state: State::Uninitialized,
            raw: String::new(),
            lines: 0,
        })
    }

    /// Bind a single line of text to a record.
    ///
    /// An empty line, or one holding only a comment or blank cells, yields
    /// `None`. Reading stops at the first data line. Everything opened to
    /// read it is released before returning.
    pub fn read_line<T, M>(&self, line: &str, mapping: M) -> Result<Option<T>>
    where
        T: DeserializeOwned,
        M: Into<Arc<FieldMapping>>,
    {
        if line.is_empty() {
            return Ok(None);
        }
        let mut rdr: Reader<_, T> = self.from_reader(line.as_bytes(), mapping)?;
        match rdr.advance() {
            Advance::Record(record) => Ok(Some(record)),
            Advance::Failed(err) => Err(err),
            Advance::End => Ok(None),
        }
    }

    /// The field delimiter to use when parsing CSV.
    ///
    /// The default is `b','`.
    pub fn delimiter(&mut self, delimiter: u8) -> &mut ReaderBuilder {
        self.delimiter = delimiter;
        self
    }

    /// The quote character to use when parsing CSV.
    ///
    /// The default is `b'"'`.
    pub fn quote(&mut self, quote: u8) -> &mut ReaderBuilder {
        self.quote = quote;
        self
    }

    /// The comment character to use when parsing CSV.
    ///
    /// A cell whose trimmed text starts with this character is cleared along
    /// with every cell after it on the same line. A line with nothing before
    /// its comment is skipped.
    ///
    /// The default is `Some(b'#')`. `None` disables comments.
    pub fn comment(&mut self, comment: Option<u8>) -> &mut ReaderBuilder {
        self.comment = comment;
        self
    }

    /// How cells are aligned before binding.
    ///
    /// The default is `Align::None`.
    pub fn align(&mut self, align: Align) -> &mut ReaderBuilder {
        self.align = align;
        self
    }

    /// Set the capacity (in bytes) of the buffer used in the CSV reader.
    pub fn buffer_capacity(&mut self, capacity: usize) -> &mut ReaderBuilder {
        self.capacity = capacity;
        self
    }
}

/// Bind a single line of comma separated text to a record.
///
/// This is `ReaderBuilder::new().read_line(line, mapping)`.
pub fn read_line<T, M>(line: &str, mapping: M) -> Result<Option<T>>
where
    T: DeserializeOwned,
    M: Into<Arc<FieldMapping>>,
{
    ReaderBuilder::new().read_line(line, mapping)
}

/// The lookahead buffer of a reader.
#[derive(Debug)]
enum State<T> {
    /// No line has been read yet.
    Uninitialized,
    /// The next record, bound and waiting to be consumed.
    Ready(T),
    /// The last advance failed. The error is `Some` until it has been
    /// reported to the caller.
    Error(Option<Error>),
    /// No records remain, either because the source ended or because it
    /// failed.
    Exhausted,
}

/// The outcome of pulling lines until one of them produces something.
#[derive(Debug)]
enum Advance<T> {
    Record(T),
    Failed(Error),
    End,
}

/// A reader that binds lines of delimited text to records of type `T`.
///
/// The reader always holds at most one record ahead of its consumer.
/// Comment and blank lines never show up as records. A line that fails to
/// bind is reported as an error in place of its record, after which the
/// reader carries on with the next line. Errors of the source itself end
/// the reader.
///
/// Records can be consumed either with `has_next` and `next_record`, or as
/// an iterator of `Result<T>` via `records` or `into_iter`.
pub struct Reader<S, T> {
    source: S,
    pre: Preprocessor,
    binder: Binder,
    delimiter: char,
    state: State<T>,
    /// The current line rendered as text, kept for error reports.
    raw: String,
    lines: u64,
}

impl<R: io::Read, T: DeserializeOwned> Reader<CsvSource<R>, T> {
    /// Create a reader with a default configuration.
    ///
    /// To customize parsing, use a `ReaderBuilder`.
    pub fn from_reader<M>(rdr: R, mapping: M) -> Result<Reader<CsvSource<R>, T>>
    where
        M: Into<Arc<FieldMapping>>,
    {
        ReaderBuilder::new().from_reader(rdr, mapping)
    }
}

impl<T: DeserializeOwned> Reader<CsvSource<File>, T> {
    /// Create a reader over the file at the given path with a default
    /// configuration.
    pub fn from_path<P, M>(path: P, mapping: M) -> Result<Reader<CsvSource<File>, T>>
    where
        P: AsRef<Path>,
        M: Into<Arc<FieldMapping>>,
    {
        ReaderBuilder::new().from_path(path, mapping)
    }
}

impl<S: LineSource, T: DeserializeOwned> Reader<S, T> {
    /// Returns true if a record is available from `next_record`.
    ///
    /// The first call reads ahead until the first record. If reading ahead
    /// fails to bind a line, that failure is returned here; calling
    /// `has_next` again moves on to the following line. An I/O error is
    /// returned once, after which this always returns `Ok(false)`.
    pub fn has_next(&mut self) -> Result<bool> {
        loop {
            match mem::replace(&mut self.state, State::Exhausted) {
                State::Uninitialized | State::Error(None) => self.prime(),
                State::Ready(record) => {
                    self.state = State::Ready(record);
                    return Ok(true);
                }
                State::Error(Some(err)) => {
                    if err.is_recoverable() {
                        self.state = State::Error(None);
                    }
                    return Err(err);
                }
                State::Exhausted => return Ok(false),
            }
        }
    }

    /// Return the next record and read ahead to the one after it.
    ///
    /// If reading ahead fails, the record is still returned and the failure
    /// is reported by the next call to `has_next` or `next_record`.
    ///
    /// When no record is available, this returns `Error::Exhausted`.
    pub fn next_record(&mut self) -> Result<T> {
        if !self.has_next()? {
            return Err(Error::Exhausted);
        }
        match mem::replace(&mut self.state, State::Exhausted) {
            State::Ready(record) => {
                self.prime();
                Ok(record)
            }
            other => {
                self.state = other;
                Err(Error::Exhausted)
            }
        }
    }

    /// Returns a borrowed iterator over all records.
    ///
    /// Each item is either a record or the error for a line that failed. A
    /// failed line does not end the iteration, but an I/O error does.
    pub fn records(&mut self) -> RecordsIter<'_, S, T> {
        RecordsIter { rdr: self }
    }

    /// The number of lines pulled from the source so far, including comment
    /// and blank lines and the line read ahead.
    pub fn lines_read(&self) -> u64 {
        self.lines
    }

    /// The field mapping records are bound with.
    pub fn mapping(&self) -> &Arc<FieldMapping> {
        self.binder.mapping()
    }

    /// Returns a reference to the underlying line source.
    pub fn source(&self) -> &S {
        &self.source
    }

    /// Unwraps this reader, returning the underlying line source.
    ///
    /// A record read ahead but not yet consumed is lost.
    pub fn into_source(self) -> S {
        self.source
    }

    /// Advance and store the outcome as the new state.
    fn prime(&mut self) {
        self.state = match self.advance() {
            Advance::Record(record) => State::Ready(record),
            Advance::Failed(err) => State::Error(Some(err)),
            Advance::End => State::Exhausted,
        };
    }

    /// Pull lines until one binds, fails to bind, or the source ends.
    fn advance(&mut self) -> Advance<T> {
        loop {
            let mut line = match self.source.next_line() {
                Ok(Some(line)) => line,
                Ok(None) => return Advance::End,
                Err(err) => {
                    warn!(
                        line = ?self.source.line(),
                        error = %err,
                        "line source failed"
                    );
                    return Advance::Failed(Error::Io(err));
                }
            };
            self.lines += 1;
            render(&line, self.delimiter, &mut self.raw);
            let align_index = match self.pre.classify(&mut line) {
                LineKind::Data { align_index } => align_index,
                kind => {
                    trace!(line = ?self.source.line(), ?kind, "skipping line");
                    continue;
                }
            };
            return match self.binder.bind(&line, align_index) {
                Ok(record) => Advance::Record(record),
                Err(kind) => {
                    let err =
                        BindError::new(self.source.line(), self.raw.clone(), kind);
                    debug!(line = ?err.line(), error = %err, "line failed to bind");
                    Advance::Failed(Error::Bind(err))
                }
            };
        }
    }
}

/// Render a line as delimited text, with absent cells left empty.
fn render(line: &RawLine, delimiter: char, buf: &mut String) {
    buf.clear();
    for (i, cell) in line.iter().enumerate() {
        if i > 0 {
            buf.push(delimiter);
        }
        if let Some(ref cell) = *cell {
            buf.push_str(cell);
        }
    }
}

impl<S: LineSource, T: DeserializeOwned> IntoIterator for Reader<S, T> {
    type Item = Result<T>;
    type IntoIter = RecordsIntoIter<S, T>;

    fn into_iter(self) -> RecordsIntoIter<S, T> {
        RecordsIntoIter { rdr: self }
    }
}

/// A borrowed iterator over records.
///
/// The lifetime parameter `'r` refers to the lifetime of the underlying
/// reader.
pub struct RecordsIter<'r, S, T> {
    rdr: &'r mut Reader<S, T>,
}

impl<'r, S: LineSource, T: DeserializeOwned> RecordsIter<'r, S, T> {
    /// Return a mutable reference to the underlying reader.
    pub fn reader(&mut self) -> &mut Reader<S, T> {
        &mut *self.rdr
    }
}

impl<'r, S: LineSource, T: DeserializeOwned> Iterator for RecordsIter<'r, S, T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Result<T>> {
        next_item(&mut *self.rdr)
    }
}

/// An owned iterator over records.
pub struct RecordsIntoIter<S, T> {
    rdr: Reader<S, T>,
}

impl<S: LineSource, T: DeserializeOwned> RecordsIntoIter<S, T> {
    /// Drop this iterator and return the underlying reader.
    pub fn into_reader(self) -> Reader<S, T> {
        self.rdr
    }
}

impl<S: LineSource, T: DeserializeOwned> Iterator for RecordsIntoIter<S, T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Result<T>> {
        next_item(&mut self.rdr)
    }
}

fn next_item<S: LineSource, T: DeserializeOwned>(
    rdr: &mut Reader<S, T>,
) -> Option<Result<T>> {
    match rdr.has_next() {
        Ok(true) => Some(rdr.next_record()),
        Ok(false) => None,
        Err(err) => Some(Err(err)),
    }
}
