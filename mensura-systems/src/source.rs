//! Line reader for definition blocks

use std::iter::Enumerate;
use std::str::Lines;

/// Numbered, comment-free lines of a definition block.
///
/// Lines are numbered from 1. Blank lines and `#` comments are skipped,
/// trailing comments are stripped, and iteration stops at `@end`.
#[derive(Debug, Clone)]
pub struct SourceLines<'a> {
    lines: Enumerate<Lines<'a>>,
    finished: bool,
}

impl<'a> SourceLines<'a> {
    pub fn new(text: &'a str) -> Self {
        Self { lines: text.lines().enumerate(), finished: false }
    }
}

impl<'a> Iterator for SourceLines<'a> {
    type Item = (usize, &'a str);

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        for (index, raw) in self.lines.by_ref() {
            let line = raw.split('#').next().unwrap_or("").trim();
            if line.is_empty() {
                continue;
            }
            if line == "@end" {
                self.finished = true;
                return None;
            }
            return Some((index + 1, line));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numbers_and_skips() {
        let text = "# header comment\n@system mks\n\n  meter  # length\nsecond\n@end\nkilogram";
        let lines: Vec<_> = SourceLines::new(text).collect();
        assert_eq!(lines, vec![(2, "@system mks"), (4, "meter"), (5, "second")]);
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(SourceLines::new("").next(), None);
        assert_eq!(SourceLines::new("   \n# only comments\n").next(), None);
    }

    #[test]
    fn test_stops_at_end_marker() {
        let mut lines = SourceLines::new("@end\nmeter");
        assert_eq!(lines.next(), None);
        assert_eq!(lines.next(), None);
    }
}
