use std::io::{self, BufRead};

use bstr::ByteSlice;
use csv_core::ReadRecordResult;

/// One line of input, split into cells.
///
/// A `None` cell and an empty cell both count as empty when lines are
/// classified, but a `None` cell bound to a mandatory field is reported as
/// missing. Lines in the same input may have different lengths.
pub type RawLine = Vec<Option<String>>;

/// A source of lines that have already been split into cells.
///
/// This is the seam between tokenizing and binding: a reader asks its source
/// for one line at a time and never looks at the underlying text. The crate
/// provides `CsvSource`, which tokenizes any `io::Read` with the `csv-core`
/// parser, and `IterSource`, which serves lines that were split elsewhere.
pub trait LineSource {
    /// Return the next line, or `None` once the input is exhausted.
    ///
    /// I/O errors are returned as-is. The reader treats them as fatal.
    fn next_line(&mut self) -> io::Result<Option<RawLine>>;

    /// The line number of the line most recently returned, if known.
    fn line(&self) -> Option<u64> {
        None
    }
}

impl<'a, S: LineSource + ?Sized> LineSource for &'a mut S {
    fn next_line(&mut self) -> io::Result<Option<RawLine>> {
        (**self).next_line()
    }

    fn line(&self) -> Option<u64> {
        (**self).line()
    }
}

impl<S: LineSource + ?Sized> LineSource for Box<S> {
    fn next_line(&mut self) -> io::Result<Option<RawLine>> {
        (**self).next_line()
    }

    fn line(&self) -> Option<u64> {
        (**self).line()
    }
}

/// A line source that tokenizes delimited text from an `io::Read`.
///
/// Delimiter and quote handling are delegated to `csv_core::Reader`. Cells
/// are decoded as UTF-8, with invalid sequences replaced by U+FFFD.
pub struct CsvSource<R> {
    core: csv_core::Reader,
    rdr: io::BufReader<R>,
    /// All cells of the current line, stored contiguously.
    fields: Vec<u8>,
    /// The end offset of each cell in `fields`.
    ends: Vec<usize>,
    /// The number of cells in the current line.
    len: usize,
    line: Option<u64>,
    eof: bool,
}

impl<R: io::Read> CsvSource<R> {
    /// Create a source with the default delimiter (`,`) and quote (`"`).
    pub fn new(rdr: R) -> CsvSource<R> {
        CsvSource::with_core(csv_core::Reader::new(), 8 * (1 << 10), rdr)
    }

    pub(crate) fn with_core(
        core: csv_core::Reader,
        capacity: usize,
        rdr: R,
    ) -> CsvSource<R> {
        CsvSource {
            core,
            rdr: io::BufReader::with_capacity(capacity, rdr),
            fields: vec![0; 1024],
            ends: vec![0; 32],
            len: 0,
            line: None,
            eof: false,
        }
    }

    /// Unwrap this source, returning the underlying reader.
    ///
    /// Any data buffered but not yet tokenized is lost.
    pub fn into_inner(self) -> R {
        self.rdr.into_inner()
    }

    /// Tokenize the next record into `fields`/`ends`.
    ///
    /// Returns false once the end of input has been reached.
    fn read_cells(&mut self) -> io::Result<bool> {
        if self.eof {
            return Ok(false);
        }
        let mut start_line = self.core.line();
        let mut leading = true;
        let (mut outlen, mut endlen) = (0, 0);
        loop {
            let (res, nin, nout, nend) = {
                let input = match self.rdr.fill_buf() {
                    Ok(input) => input,
                    Err(err) => {
                        self.eof = true;
                        return Err(err);
                    }
                };
                let res = self.core.read_record(
                    input,
                    &mut self.fields[outlen..],
                    &mut self.ends[endlen..],
                );
                // Empty lines before the record are skipped by the tokenizer.
                if leading {
                    for &b in &input[..res.1] {
                        match b {
                            b'\n' => start_line += 1,
                            b'\r' => {}
                            _ => {
                                leading = false;
                                break;
                            }
                        }
                    }
                }
                res
            };
            self.rdr.consume(nin);
            outlen += nout;
            endlen += nend;
            match res {
                ReadRecordResult::InputEmpty => continue,
                ReadRecordResult::OutputFull => {
                    let new_len = self.fields.len() * 2;
                    self.fields.resize(new_len, 0);
                }
                ReadRecordResult::OutputEndsFull => {
                    let new_len = self.ends.len() * 2;
                    self.ends.resize(new_len, 0);
                }
                ReadRecordResult::Record => {
                    self.len = endlen;
                    self.line = Some(start_line);
                    return Ok(true);
                }
                ReadRecordResult::End => {
                    self.eof = true;
                    return Ok(false);
                }
            }
        }
    }
}

impl<R: io::Read> LineSource for CsvSource<R> {
    fn next_line(&mut self) -> io::Result<Option<RawLine>> {
        if !self.read_cells()? {
            return Ok(None);
        }
        let mut cells = Vec::with_capacity(self.len);
        let mut start = 0;
        for &end in &self.ends[..self.len] {
            let cell = self.fields[start..end].to_str_lossy();
            cells.push(Some(cell.into_owned()));
            start = end;
        }
        Ok(Some(cells))
    }

    fn line(&self) -> Option<u64> {
        self.line
    }
}

/// A line source over lines that were split by some other means.
///
/// Line numbers count the lines served, starting at 1.
#[derive(Clone, Debug)]
pub struct IterSource<I> {
    it: I,
    line: u64,
}

impl<I: Iterator<Item = RawLine>> IterSource<I> {
    /// Create a source that serves each line of the given sequence in turn.
    pub fn new<T>(lines: T) -> IterSource<I>
    where
        T: IntoIterator<Item = RawLine, IntoIter = I>,
    {
        IterSource { it: lines.into_iter(), line: 0 }
    }
}

impl<I: Iterator<Item = RawLine>> LineSource for IterSource<I> {
    fn next_line(&mut self) -> io::Result<Option<RawLine>> {
        let next = self.it.next();
        if next.is_some() {
            self.line += 1;
        }
        Ok(next)
    }

    fn line(&self) -> Option<u64> {
        if self.line == 0 {
            None
        } else {
            Some(self.line)
        }
    }
}
