//! The paint pass: turns a finalized node tree into one escape-sequence
//! string for the terminal.
//!
//! Two full-frame bitmaps (`bg`/`fg`, one packed color per cell) are built
//! by walking the tree once, then diffed cell-by-cell against the previous
//! cell's colors to emit the minimum number of SGR sequences, the same
//! two-pass shape as the original's bitmap-then-diff renderer.

use unicode_segmentation::UnicodeSegmentation;

use core_text::egc_width;
use core_text::geom::{Point, Rect};

use crate::color::alpha_blend_rect;
use crate::context::{child_ids, UiContext};
use crate::layout;
use crate::node::{channel, rgba, Content, NodeId};

/// A screen row as one string per cell: a single-cell entry holds that
/// cell's grapheme, a wide glyph's trailing cell holds an empty string so
/// it contributes nothing when flushed.
struct CellRow {
    cells: Vec<String>,
}

impl CellRow {
    fn new(width: i32) -> Self {
        Self {
            cells: vec![" ".to_string(); width.max(0) as usize],
        }
    }

    /// Overwrites `[x1, x2)` with as much of `text` as fits, returning the
    /// column just past the last glyph actually written.
    fn replace(&mut self, x1: i32, x2: i32, text: &str) -> i32 {
        let mut x = x1;
        for g in text.graphemes(true) {
            let w = (egc_width(g) as i32).max(1);
            if x < 0 || x + w > x2 {
                break;
            }
            self.cells[x as usize] = g.to_string();
            for i in 1..w {
                self.cells[(x + i) as usize] = String::new();
            }
            x += w;
        }
        x
    }
}

struct Paint {
    bounds: Rect,
    lines: Vec<CellRow>,
    bg_bitmap: Vec<u32>,
    fg_bitmap: Vec<u32>,
    focused_item_id: u64,
    cursor: Point,
    cursor_overtype: bool,
}

fn render_node(paint: &mut Paint, ctx: &UiContext, id: NodeId) {
    let node = &ctx.nodes[id.index()];
    let outer_clamped = node.outer_clipped;
    if outer_clamped.is_empty() {
        return;
    }

    let w = outer_clamped.width();
    if node.attributes.bordered {
        if w >= 2 {
            let top = format!("┌{}┐", "─".repeat((w - 2) as usize));
            paint.lines[outer_clamped.top as usize].replace(outer_clamped.left, outer_clamped.right, &top);

            let mid = format!("│{}│", " ".repeat((w - 2) as usize));
            for y in (outer_clamped.top + 1)..(outer_clamped.bottom - 1) {
                paint.lines[y as usize].replace(outer_clamped.left, outer_clamped.right, &mid);
            }

            let bottom = format!("└{}┘", "─".repeat((w - 2) as usize));
            paint.lines[(outer_clamped.bottom - 1) as usize].replace(outer_clamped.left, outer_clamped.right, &bottom);
        }
    } else if node.attributes.floating {
        let fill = " ".repeat(w.max(0) as usize);
        for y in outer_clamped.top..outer_clamped.bottom {
            paint.lines[y as usize].replace(outer_clamped.left, outer_clamped.right, &fill);
        }
    }

    if let Content::Scrollarea { .. } = node.content {
        if let Some(&child_id) = child_ids(&ctx.nodes, id).first() {
            render_scrollbar(paint, node, &ctx.nodes[child_id.index()], outer_clamped);
        }
    }

    if channel(node.attributes.bg, 24) != 0 {
        alpha_blend_rect(&mut paint.bg_bitmap, node.attributes.bg, outer_clamped, paint.bounds.right);
    }
    if channel(node.attributes.fg, 24) != 0 {
        alpha_blend_rect(&mut paint.fg_bitmap, node.attributes.fg, outer_clamped, paint.bounds.right);
    }

    let inner_clamped = node.inner_clipped;
    if !inner_clamped.is_empty() {
        match &node.content {
            Content::Text { text, chunks } => render_text(paint, ctx, node.inner.left, inner_clamped, text, chunks),
            Content::Textarea { rows, cursor, overtype, selection } => {
                render_textarea(paint, node.id, node.inner, inner_clamped, rows, *cursor, *overtype, selection, paint.focused_item_id == node.id)
            }
            Content::None | Content::Scrollarea { .. } => {}
        }
    }

    for child in child_ids(&ctx.nodes, id) {
        render_node(paint, ctx, child);
    }
}

fn render_scrollbar(paint: &mut Paint, node: &crate::node::UiNode, child: &crate::node::UiNode, outer_clamped: Rect) {
    let outer_height = outer_clamped.height();
    let inner_height = child.intrinsic_size.height.max(1);
    let scroll_offset = (node.inner.top - child.outer.top).min(inner_height);
    let track_height = (((outer_height as f64 / inner_height as f64) * outer_height as f64 + 0.5) as i32).max(1);

    let mut track_bottom = (((scroll_offset + outer_height) as f64 / inner_height as f64) * outer_height as f64 + 0.5) as i32;
    track_bottom = track_bottom.max(track_height).min(outer_height);
    let track_top = (track_bottom - track_height).max(0) + outer_clamped.top;
    let track_bottom = track_bottom + outer_clamped.top;

    for y in outer_clamped.top..outer_clamped.bottom {
        let glyph = if y >= track_top && y < track_bottom { "█" } else { "░" };
        paint.lines[y as usize].replace(outer_clamped.right - 1, outer_clamped.right, glyph);
    }
}

fn render_text(
    paint: &mut Paint,
    ctx: &UiContext,
    inner_left: i32,
    inner_clamped: Rect,
    text: &str,
    chunks: &[crate::node::StyledChunk],
) {
    let mut origin_x = inner_left;
    for chunk in chunks {
        let mut chunk_text = &text[chunk.text_start as usize..chunk.text_end as usize];
        if origin_x < inner_clamped.left {
            let mut skipped = 0;
            for g in chunk_text.graphemes(true) {
                let gw = (egc_width(g) as i32).max(1);
                if origin_x >= inner_clamped.left {
                    break;
                }
                origin_x += gw;
                skipped += g.len();
            }
            chunk_text = &chunk_text[skipped..];
            if origin_x < inner_clamped.left {
                continue;
            }
        }

        let end_x = paint.lines[inner_clamped.top as usize].replace(origin_x, inner_clamped.right, chunk_text);
        if chunk.fg_index != 0 {
            let c = ctx.indexed_colors[chunk.fg_index as usize];
            let fg = rgba(c[0], c[1], c[2], 255);
            let row = (inner_clamped.top * paint.bounds.right) as usize;
            for x in (row + origin_x as usize)..(row + end_x as usize) {
                paint.fg_bitmap[x] = fg;
            }
        }
        origin_x = end_x;
    }
}

#[allow(clippy::too_many_arguments)]
fn render_textarea(
    paint: &mut Paint,
    node_id: u64,
    inner: Rect,
    inner_clamped: Rect,
    rows: &[String],
    cursor: Option<Point>,
    overtype: bool,
    selection: &[(i32, i32, i32)],
    is_focused: bool,
) {
    for (i, row) in rows.iter().enumerate() {
        let y = inner.top + i as i32;
        if y < inner_clamped.top || y >= inner_clamped.bottom {
            continue;
        }
        paint.lines[y as usize].replace(inner_clamped.left, inner_clamped.right, row);
    }

    for &(row, x1, x2) in selection {
        let y = inner.top + row;
        if y < inner_clamped.top || y >= inner_clamped.bottom {
            continue;
        }
        let x1 = (inner.left + x1).max(inner_clamped.left);
        let x2 = (inner.left + x2).min(inner_clamped.right);
        for x in x1..x2 {
            let idx = (y * paint.bounds.right + x) as usize;
            paint.bg_bitmap[idx] = 15;
            paint.fg_bitmap[idx] = 0;
        }
    }

    if is_focused {
        if let Some(c) = cursor {
            let point = Point::new(inner.left + c.x, inner.top + c.y);
            if inner_clamped.contains(point) {
                paint.cursor = point;
                paint.cursor_overtype = overtype;
            }
        }
    }
}

fn push_sgr(out: &mut String, color: u32, background: bool) {
    if color < 8 {
        out.push_str(&format!("\x1b[{}m", (if background { 40 } else { 30 }) + color));
    } else if color < 16 {
        out.push_str(&format!("\x1b[{}m", (if background { 100 } else { 90 }) + color - 8));
    } else {
        let tag = if background { 48 } else { 38 };
        out.push_str(&format!(
            "\x1b[{};2;{};{};{}m",
            tag,
            channel(color, 0),
            channel(color, 8),
            channel(color, 16)
        ));
    }
}

/// Composites the current frame and returns it as a single string: a home
/// cursor, the screen content with embedded SGR runs, and a trailing
/// cursor-position/DECSCUSR/DECTCEM sequence.
pub fn root_render(ctx: &mut UiContext) -> String {
    layout::finalize(ctx);

    let width = ctx.size.width.max(0);
    let height = ctx.size.height.max(0);
    if width == 0 || height == 0 {
        return "\x1b[H\x1b[?25l".to_string();
    }
    let area = (width * height) as usize;

    let mut paint = Paint {
        bounds: Rect::new(0, 0, width, height),
        lines: (0..height).map(|_| CellRow::new(width)).collect(),
        bg_bitmap: vec![0u32; area],
        fg_bitmap: vec![15u32; area],
        focused_item_id: ctx.focused_id(),
        cursor: Point::new(-1, -1),
        cursor_overtype: false,
    };

    let roots = ctx.roots.clone();
    for root in roots {
        render_node(&mut paint, ctx, root);
    }

    let mut result = String::from("\x1b[H");
    let mut last_bg = paint.bg_bitmap[0] ^ 1;
    let mut last_fg = paint.fg_bitmap[0] ^ 1;

    for y in 0..height {
        if y != 0 {
            result.push_str("\r\n");
        }
        let row = &paint.lines[y as usize];
        let mut flushed = 0usize;
        for x in 0..width {
            let idx = (y * width + x) as usize;
            let bg = paint.bg_bitmap[idx];
            let fg = paint.fg_bitmap[idx];
            if bg == last_bg && fg == last_fg {
                continue;
            }
            if x > 0 {
                for cell in &row.cells[flushed..x as usize] {
                    result.push_str(cell);
                }
                flushed = x as usize;
            }
            if last_bg != bg {
                last_bg = bg;
                push_sgr(&mut result, bg, true);
            }
            if last_fg != fg {
                last_fg = fg;
                push_sgr(&mut result, fg, false);
            }
        }
        for cell in &row.cells[flushed..] {
            result.push_str(cell);
        }
    }

    if paint.cursor.x >= 0 && paint.cursor.y >= 0 {
        result.push_str(&format!(
            "\x1b[{};{}H\x1b[{} q\x1b[?25h",
            paint.cursor.y + 1,
            paint.cursor.x + 1,
            if paint.cursor_overtype { 1 } else { 5 }
        ));
    } else {
        result.push_str("\x1b[?25l");
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::UiContext;
    use crate::node::{rgba, FloatSpec};
    use core_text::geom::Size;

    #[test]
    fn blank_frame_hides_cursor_and_homes() {
        let mut ctx = UiContext::new();
        ctx.size = Size::new(5, 2);
        let frame = root_render(&mut ctx);
        assert!(frame.starts_with("\x1b[H"));
        assert!(frame.ends_with("\x1b[?25l"));
    }

    #[test]
    fn bordered_container_draws_box_glyphs() {
        let mut ctx = UiContext::new();
        ctx.size = Size::new(6, 3);
        ctx.container_begin(1);
        ctx.attr_border();
        ctx.nodes[1].intrinsic_size = Size::new(4, 1);
        ctx.nodes[1].intrinsic_size_set = true;
        ctx.container_end();

        let frame = root_render(&mut ctx);
        assert!(frame.contains('┌'));
        assert!(frame.contains('┘'));
    }

    #[test]
    fn opaque_background_emits_sgr_background_sequence() {
        let mut ctx = UiContext::new();
        ctx.size = Size::new(4, 1);
        ctx.container_begin(1);
        ctx.attr_background_rgba(rgba(200, 0, 0, 255));
        ctx.nodes[1].intrinsic_size = Size::new(4, 1);
        ctx.nodes[1].intrinsic_size_set = true;
        ctx.container_end();

        let frame = root_render(&mut ctx);
        assert!(frame.contains("48;2;200;0;0"));
    }

    #[test]
    fn float_node_is_rendered_at_gravity_offset_position() {
        let mut ctx = UiContext::new();
        ctx.size = Size::new(10, 4);
        ctx.container_begin(1);
        ctx.attr_float(FloatSpec { gravity_x: 0.0, gravity_y: 0.0, offset_x: 2, offset_y: 1 });
        ctx.attr_border();
        ctx.nodes[1].intrinsic_size = Size::new(3, 1);
        ctx.nodes[1].intrinsic_size_set = true;
        ctx.container_end();

        let frame = root_render(&mut ctx);
        assert!(frame.contains('┌'));
    }
}
