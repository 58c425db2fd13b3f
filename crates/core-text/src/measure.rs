//! Unicode measurement: the single choke point through which the gap-buffer
//! text store turns bytes into grapheme and column counts.
//!
//! The gap buffer always hands this module an already-contiguous slice (a
//! materialized line, produced by `TextBuffer::extract`) rather than a raw
//! view that might still straddle the gap — closing the gap at the cursor
//! before measuring keeps this module free of gap bookkeeping entirely.
//!
//! Graphemes are extended grapheme clusters (`unicode-segmentation`); column
//! width follows the terminal convention (ambiguous = 1, wide = 2, zero
//! width = 0), delegated to `crate::width::egc_width`.

use crate::width::egc_width;
use unicode_segmentation::UnicodeSegmentation;

pub const NO_STOP: i64 = i64::MAX;

/// Outcome of a forward or backward measurement pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MeasureResult {
    pub new_offset: usize,
    pub new_column: i64,
    pub graphemes_consumed: usize,
    pub crossed_newline: bool,
}

/// Advance from `offset` within `line` (a single logical line, no
/// newline), stopping at whichever of `column_stop` or `grapheme_stop`
/// is reached first. Passing `NO_STOP` disables a given stop condition.
/// `start_column` seeds the running column count (for resuming mid-line).
///
/// When `out_wrap` is provided, it receives the stop point reached by
/// `column_stop` alone (`grapheme_stop` disabled) — the last position a
/// soft wrap may occur at. Callers doing wrap-aware cursor placement use
/// this to advance a full row at a time without running a wide glyph that
/// straddles the wrap column past it.
pub fn measure_forward(
    line: &str,
    offset: usize,
    start_column: i64,
    column_stop: i64,
    grapheme_stop: i64,
    out_wrap: Option<&mut MeasureResult>,
) -> MeasureResult {
    let result = measure_forward_bounded(line, offset, start_column, column_stop, grapheme_stop);
    if let Some(out) = out_wrap {
        *out = measure_forward_bounded(line, offset, start_column, column_stop, NO_STOP);
    }
    result
}

fn measure_forward_bounded(
    line: &str,
    offset: usize,
    start_column: i64,
    column_stop: i64,
    grapheme_stop: i64,
) -> MeasureResult {
    let mut column = start_column;
    let mut consumed = 0usize;
    let mut pos = offset;
    for (idx, g) in line.grapheme_indices(true) {
        if idx < offset {
            continue;
        }
        if column >= column_stop || consumed as i64 >= grapheme_stop {
            break;
        }
        column += egc_width(g) as i64;
        consumed += 1;
        pos = idx + g.len();
    }
    MeasureResult {
        new_offset: pos,
        new_column: column,
        graphemes_consumed: consumed,
        crossed_newline: false,
    }
}

/// Symmetric to `measure_forward`, walking backward from `offset`. If the
/// walk reaches the start of `line` before satisfying the stop conditions,
/// `new_column` goes negative, signalling the caller must seek to the
/// previous line to resolve a true column.
pub fn measure_backward(
    line: &str,
    offset: usize,
    start_column: i64,
    column_stop: i64,
    grapheme_stop: i64,
) -> MeasureResult {
    let boundaries: Vec<usize> = line
        .grapheme_indices(true)
        .map(|(i, _)| i)
        .chain(std::iter::once(line.len()))
        .collect();
    let mut column = start_column;
    let mut consumed = 0usize;
    let mut pos = offset;
    let mut i = boundaries.iter().rposition(|&b| b <= offset).unwrap_or(0);
    while i > 0 {
        if column <= -column_stop || consumed as i64 >= grapheme_stop {
            break;
        }
        let start = boundaries[i - 1];
        let end = boundaries[i];
        let g = &line[start..end];
        column -= egc_width(g) as i64;
        consumed += 1;
        pos = start;
        i -= 1;
    }
    MeasureResult {
        new_offset: pos,
        new_column: column,
        graphemes_consumed: consumed,
        crossed_newline: pos == 0 && offset != 0,
    }
}

/// Count `\n` bytes forward in `text` from `offset` until `line` reaches
/// `line_stop` or the text is exhausted, updating `line` in place. Returns
/// the resulting byte offset (the byte just past the last newline consumed,
/// or the end of `text`).
pub fn newlines_forward(text: &[u8], offset: usize, line: &mut i64, line_stop: i64) -> usize {
    let mut pos = offset;
    while *line < line_stop {
        match text[pos..].iter().position(|&b| b == b'\n') {
            Some(rel) => {
                pos += rel + 1;
                *line += 1;
            }
            None => {
                pos = text.len();
                break;
            }
        }
    }
    pos
}

/// Symmetric to `newlines_forward`: walk backward counting `\n` bytes until
/// `line` reaches `line_stop` or the start of `text`.
pub fn newlines_backward(text: &[u8], offset: usize, line: &mut i64, line_stop: i64) -> usize {
    let mut pos = offset;
    while *line > line_stop && pos > 0 {
        match text[..pos].iter().rposition(|&b| b == b'\n') {
            Some(rel) => {
                pos = rel;
                *line -= 1;
            }
            None => {
                pos = 0;
                break;
            }
        }
    }
    pos
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn measure_forward_counts_graphemes_and_columns() {
        let r = measure_forward("hello", 0, 0, NO_STOP, NO_STOP, None);
        assert_eq!(r.graphemes_consumed, 5);
        assert_eq!(r.new_column, 5);
        assert_eq!(r.new_offset, 5);
    }

    #[test]
    fn measure_forward_stops_at_grapheme_count() {
        let r = measure_forward("hello", 0, 0, NO_STOP, 3, None);
        assert_eq!(r.graphemes_consumed, 3);
        assert_eq!(r.new_offset, 3);
    }

    #[test]
    fn measure_forward_wide_glyph_counts_two_columns() {
        let r = measure_forward("界x", 0, 0, NO_STOP, 1, None);
        assert_eq!(r.new_column, 2);
    }

    #[test]
    fn measure_forward_out_wrap_ignores_grapheme_stop() {
        let mut wrap = MeasureResult::default();
        let r = measure_forward("hello world", 0, 0, 5, 2, Some(&mut wrap));
        assert_eq!(r.graphemes_consumed, 2);
        assert_eq!(wrap.graphemes_consumed, 5);
        assert_eq!(wrap.new_column, 5);
    }

    #[test]
    fn measure_backward_from_end() {
        let r = measure_backward("hello", 5, 0, NO_STOP, NO_STOP);
        assert_eq!(r.graphemes_consumed, 5);
        assert_eq!(r.new_offset, 0);
    }

    #[test]
    fn newlines_forward_counts_and_stops() {
        let text = b"a\nb\nc\nd";
        let mut line = 0i64;
        let pos = newlines_forward(text, 0, &mut line, 2);
        assert_eq!(line, 2);
        assert_eq!(pos, 4); // just past the 2nd '\n'
    }

    #[test]
    fn newlines_backward_counts_and_stops() {
        let text = b"a\nb\nc\nd";
        let mut line = 3i64;
        let pos = newlines_backward(text, text.len(), &mut line, 1);
        assert_eq!(line, 1);
        assert_eq!(pos, 2); // start of line index 1 ("b\n...")
    }
}
