use crate::source::RawLine;

/// How the cells of a data line are positioned before binding.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Align {
    /// Cells are bound exactly where they are.
    None,
    /// Leading empty cells are dropped, so that the first non-empty cell
    /// becomes column 0. The number of dropped cells is the align index.
    Left,
}

impl Default for Align {
    fn default() -> Align {
        Align::None
    }
}

/// The classification of one line of input.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LineKind {
    /// The line holds a comment marker in one of its cells. It is skipped.
    Comment,
    /// Every cell of the line is empty. It is skipped.
    Blank,
    /// The line holds data. `align_index` is the number of leading cells
    /// removed by left alignment (always 0 without alignment).
    Data { align_index: usize },
}

impl LineKind {
    /// Returns true if the line should not produce a record.
    pub fn is_skip(&self) -> bool {
        match *self {
            LineKind::Comment | LineKind::Blank => true,
            LineKind::Data { .. } => false,
        }
    }
}

/// Strips comments, detects blank lines and aligns cells.
#[derive(Clone, Debug)]
pub struct Preprocessor {
    comment: Option<char>,
    align: Align,
}

impl Preprocessor {
    /// Create a preprocessor. A `comment` of `None` disables comments.
    pub fn new(comment: Option<char>, align: Align) -> Preprocessor {
        Preprocessor { comment, align }
    }

    /// Classify `line`, adjusting its cells in place.
    ///
    /// A cell whose trimmed text starts with the comment marker is cleared
    /// along with every cell after it, and the whole line is a comment, even
    /// when data precedes the marker. Alignment is applied only to data lines.
    pub fn classify(&self, line: &mut RawLine) -> LineKind {
        if self.strip_comment(line) {
            return LineKind::Comment;
        }
        if line.iter().all(is_empty) {
            return LineKind::Blank;
        }
        let align_index = match self.align {
            Align::None => 0,
            Align::Left => align_left(line),
        };
        LineKind::Data { align_index }
    }

    /// Clear the first comment cell and everything after it.
    ///
    /// Returns true if a comment was found.
    fn strip_comment(&self, line: &mut RawLine) -> bool {
        let marker = match self.comment {
            None => return false,
            Some(marker) => marker,
        };
        let start = line.iter().position(|cell| match *cell {
            None => false,
            Some(ref s) => s.trim().starts_with(marker),
        });
        match start {
            None => false,
            Some(start) => {
                for cell in &mut line[start..] {
                    *cell = Some(String::new());
                }
                true
            }
        }
    }
}

fn is_empty(cell: &Option<String>) -> bool {
    cell.as_ref().map_or(true, |s| s.trim().is_empty())
}

/// Shift every cell left so the line starts with its first non-empty cell.
///
/// Vacated cells at the end become empty strings. Returns the shift.
fn align_left(line: &mut RawLine) -> usize {
    let shift = match line.iter().position(|cell| !is_empty(cell)) {
        None | Some(0) => return 0,
        Some(shift) => shift,
    };
    line.rotate_left(shift);
    let len = line.len();
    for cell in &mut line[len - shift..] {
        *cell = Some(String::new());
    }
    shift
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::{Align, LineKind, Preprocessor};
    use crate::source::RawLine;

    fn line(cells: &[&str]) -> RawLine {
        cells.iter().map(|s| Some(s.to_string())).collect()
    }

    fn pre(align: Align) -> Preprocessor {
        Preprocessor::new(Some('#'), align)
    }

    #[test]
    fn data_line_untouched() {
        let mut got = line(&["a", "b"]);
        assert_eq!(
            pre(Align::None).classify(&mut got),
            LineKind::Data { align_index: 0 }
        );
        assert_eq!(got, line(&["a", "b"]));
    }

    #[test]
    fn blank_lines() {
        let p = pre(Align::Left);
        assert_eq!(p.classify(&mut line(&[])), LineKind::Blank);
        assert_eq!(p.classify(&mut line(&[""])), LineKind::Blank);
        assert_eq!(p.classify(&mut line(&[" ", "\t", ""])), LineKind::Blank);
        assert_eq!(p.classify(&mut vec![None, None]), LineKind::Blank);
    }

    #[test]
    fn comment_lines() {
        let p = pre(Align::None);
        assert_eq!(p.classify(&mut line(&["# hi"])), LineKind::Comment);
        assert_eq!(p.classify(&mut line(&["  #", "x"])), LineKind::Comment);
        assert_eq!(p.classify(&mut line(&["", "#x", "y"])), LineKind::Comment);
        assert!(p.classify(&mut line(&["#"])).is_skip());
    }

    #[test]
    fn comment_after_data_skips_line() {
        let mut got = line(&["a", "b", " #c", "d"]);
        assert_eq!(pre(Align::None).classify(&mut got), LineKind::Comment);
        assert_eq!(got, line(&["a", "b", "", ""]));

        let mut got = line(&["a", "1", "#x"]);
        assert_eq!(pre(Align::Left).classify(&mut got), LineKind::Comment);
    }

    #[test]
    fn marker_inside_cell_is_data() {
        let mut got = line(&["a#b", "c"]);
        assert!(!pre(Align::None).classify(&mut got).is_skip());
        assert_eq!(got, line(&["a#b", "c"]));
    }

    #[test]
    fn comments_disabled() {
        let p = Preprocessor::new(None, Align::None);
        let mut got = line(&["#a", "b"]);
        assert_eq!(p.classify(&mut got), LineKind::Data { align_index: 0 });
        assert_eq!(got, line(&["#a", "b"]));
    }

    #[test]
    fn align_left_shifts() {
        let mut got = line(&["", " ", "a", "b"]);
        assert_eq!(
            pre(Align::Left).classify(&mut got),
            LineKind::Data { align_index: 2 }
        );
        assert_eq!(got, line(&["a", "b", "", ""]));
    }

    #[test]
    fn align_left_without_alignment_mode() {
        let mut got = line(&["", "a"]);
        assert_eq!(
            pre(Align::None).classify(&mut got),
            LineKind::Data { align_index: 0 }
        );
        assert_eq!(got, line(&["", "a"]));
    }

    #[test]
    fn comment_wins_over_alignment() {
        let mut got = vec![None, Some("a".into()), Some("#z".into())];
        assert_eq!(pre(Align::Left).classify(&mut got), LineKind::Comment);
        assert_eq!(got, vec![None, Some("a".into()), Some(String::new())]);
    }

    fn cell() -> impl Strategy<Value = String> {
        prop::sample::select(vec!["", " ", "a", "b c", "42", "#x", " #"])
            .prop_map(|s| s.to_string())
    }

    proptest! {
        #[test]
        fn left_alignment_shifts_by_first_content(
            lead in 0usize..6,
            rest in prop::collection::vec("[a-z0-9]{1,4}", 1..6),
        ) {
            let mut input: RawLine = vec![Some(String::new()); lead];
            input.extend(rest.iter().cloned().map(Some));
            let original = input.clone();

            let mut got = input;
            let kind = pre(Align::Left).classify(&mut got);
            prop_assert_eq!(kind, LineKind::Data { align_index: lead });
            prop_assert_eq!(got.len(), original.len());
            for i in 0..original.len() - lead {
                prop_assert_eq!(&got[i], &original[i + lead]);
            }
            for cell in &got[original.len() - lead..] {
                prop_assert_eq!(cell.as_deref(), Some(""));
            }
        }

        #[test]
        fn comment_blanks_suffix_and_skips(
            cells in prop::collection::vec(cell(), 0..8),
        ) {
            let mut got: RawLine = cells.iter().cloned().map(Some).collect();
            let kind = pre(Align::None).classify(&mut got);
            let start = cells.iter().position(|c| c.trim().starts_with('#'));
            match start {
                None => prop_assert_eq!(
                    got,
                    cells.iter().cloned().map(Some).collect::<RawLine>()
                ),
                Some(start) => {
                    for (i, c) in got.iter().enumerate() {
                        if i < start {
                            prop_assert_eq!(c.as_deref(), Some(cells[i].as_str()));
                        } else {
                            prop_assert_eq!(c.as_deref(), Some(""));
                        }
                    }
                    prop_assert_eq!(kind, LineKind::Comment);
                }
            }
        }
    }
}
