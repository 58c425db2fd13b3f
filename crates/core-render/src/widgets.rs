//! Widget primitives built on top of `UiContext`'s container calls: labels,
//! buttons, scrollareas, a textarea, and a menubar. Each function is called
//! fresh every frame; persistent state (scroll offset, selection, undo log)
//! lives on whatever the caller passes in, not on the node tree.

use core_input::{KeyCode, KeyModifiers, MouseAction};
use core_text::geom::{Point, Rect, Size};
use core_text::{LogicalPos, SelectionState, TextBuffer, VisualPos};

use crate::context::UiContext;
use crate::node::{rgba, Content, FloatSpec, NodeId, Padding, StyledChunk};

fn text_width(s: &str) -> i32 {
    core_text::measure_forward(s, 0, 0, core_text::NO_STOP, core_text::NO_STOP, None).new_column as i32
}

pub fn label(ctx: &mut UiContext, text: &str) {
    ctx.container_begin_named(text);
    ctx.nodes[ctx.attr_node.index()].content = Content::Text { text: text.to_string(), chunks: Vec::new() };
    ctx.nodes[ctx.attr_node.index()].intrinsic_size = Size::new(text_width(text), 1);
    ctx.nodes[ctx.attr_node.index()].intrinsic_size_set = true;
    ctx.container_end();
}

fn styled_label_begin_named(ctx: &mut UiContext, name: &str) {
    ctx.container_begin_named(name);
    ctx.nodes[ctx.attr_node.index()].content = Content::Text { text: String::new(), chunks: Vec::new() };
}

pub fn styled_label_begin(ctx: &mut UiContext, id: u64) {
    ctx.container_begin(id);
    ctx.nodes[ctx.attr_node.index()].content = Content::Text { text: String::new(), chunks: Vec::new() };
}

pub fn styled_label_set_foreground_indexed(ctx: &mut UiContext, fg_index: u8) {
    if let Content::Text { chunks, .. } = &mut ctx.nodes[ctx.attr_node.index()].content {
        chunks.push(StyledChunk { text_start: 0, text_end: 0, fg_index });
    }
}

pub fn styled_label_add_text(ctx: &mut UiContext, text: &str) {
    let node = &mut ctx.nodes[ctx.attr_node.index()];
    let Content::Text { text: buf, chunks } = &mut node.content else {
        return;
    };
    let start = buf.len() as u32;
    buf.push_str(text);
    let end = buf.len() as u32;
    match chunks.last_mut() {
        Some(chunk) if chunk.text_end == start => chunk.text_end = end,
        _ => chunks.push(StyledChunk { text_start: start, text_end: end, fg_index: 0 }),
    }
}

pub fn styled_label_end(ctx: &mut UiContext) {
    let width = match &ctx.nodes[ctx.attr_node.index()].content {
        Content::Text { text, .. } => text_width(text),
        _ => 0,
    };
    let node = &mut ctx.nodes[ctx.attr_node.index()];
    node.intrinsic_size = Size::new(width, 1);
    node.intrinsic_size_set = true;
    ctx.container_end();
}

/// `true` on the frame the button was released while focused.
pub fn button(ctx: &mut UiContext, text: &str) -> bool {
    ctx.container_begin_named(text);
    ctx.attr_padding(Padding::uniform(1, 0, 1, 0));

    if ctx.is_hovering() {
        ctx.focus_next_by_default();
    }

    if ctx.has_focus() {
        ctx.attr_background_rgba(rgba(255, 255, 255, 0xa0));
        ctx.attr_foreground_rgba(rgba(0, 0, 0, 0xff));
    } else {
        ctx.attr_background_rgba(rgba(0, 0, 0, 0xa0));
        ctx.attr_foreground_rgba(rgba(255, 255, 255, 0xff));
    }

    let clicked = ctx.was_clicked();
    if clicked {
        ctx.consume_input();
    }

    ctx.nodes[ctx.attr_node.index()].content = Content::Text { text: text.to_string(), chunks: Vec::new() };
    ctx.nodes[ctx.attr_node.index()].intrinsic_size = Size::new(text_width(text), 1);
    ctx.nodes[ctx.attr_node.index()].intrinsic_size_set = true;
    ctx.container_end();

    clicked
}

/// A single-line text field. Not yet implemented upstream either: the
/// original ships this as an empty stub awaiting a cursor/selection model
/// shared with the textarea.
pub fn editline(_ctx: &mut UiContext, _name: &str) -> bool {
    false
}

pub fn scrollarea_begin(ctx: &mut UiContext, name: &str, intrinsic_size: Size) {
    ctx.container_begin_named(name);
    let scroll = match ctx.nodes[ctx.attr_node.index()].content {
        Content::Scrollarea { scroll } => scroll,
        _ => Point::default(),
    };
    ctx.nodes[ctx.attr_node.index()].content = Content::Scrollarea { scroll };
    ctx.nodes[ctx.attr_node.index()].intrinsic_size = intrinsic_size;
    ctx.nodes[ctx.attr_node.index()].intrinsic_size_set = true;

    if ctx.has_focus() {
        let delta = ctx.input_scroll_delta();
        if delta != Point::default() {
            if let Content::Scrollarea { scroll } = &mut ctx.nodes[ctx.attr_node.index()].content {
                scroll.x += delta.x;
                scroll.y += delta.y;
            }
            ctx.consume_input();
        }
    }

    ctx.container_begin_named("viewport");
}

pub fn scrollarea_end(ctx: &mut UiContext) {
    ctx.container_end();
    ctx.container_end();
}

fn visual_to_logical(tb: &mut TextBuffer, pos: VisualPos) -> LogicalPos {
    let saved = tb.cursor;
    tb.move_to_visual(pos);
    let result = tb.cursor.logical;
    tb.cursor = saved;
    result
}

/// Handles keyboard and mouse input for a focused textarea, scrolling the
/// enclosing scrollarea to keep the cursor visible afterward.
fn textarea_handle_input(ctx: &mut UiContext, tb: &mut TextBuffer, outer: NodeId, inner: NodeId, viewport: Rect) {
    let width = viewport.width();
    let height = viewport.height();

    if !ctx.input_text().is_empty() {
        let text = ctx.input_text().to_string();
        tb.write(&text);
        ctx.consume_input();
    } else if let Some((code, modifiers)) = ctx.input_keyboard() {
        let mut make_cursor_visible = true;

        match code {
            KeyCode::Back => tb.delete(-1),
            KeyCode::Tab => tb.write("    "),
            KeyCode::Enter => tb.write("\n"),
            KeyCode::PageUp => {
                let target = VisualPos { row: tb.cursor.visual.row - height as i64, col: tb.cursor.visual.col };
                tb.move_to_visual(target);
            }
            KeyCode::PageDown => {
                let target = VisualPos { row: tb.cursor.visual.row + height as i64, col: tb.cursor.visual.col };
                tb.move_to_visual(target);
            }
            KeyCode::Home => tb.move_to_logical(LogicalPos { line: tb.cursor.logical.line, x: 0 }),
            KeyCode::End => tb.move_to_logical(LogicalPos { line: tb.cursor.logical.line, x: i64::MAX }),
            KeyCode::Left => tb.move_delta(-1),
            KeyCode::Right => tb.move_delta(1),
            KeyCode::Up if modifiers.contains(KeyModifiers::CTRL) => {
                scroll_outer(ctx, outer, Point::new(0, -1));
                make_cursor_visible = false;
            }
            KeyCode::Up => {
                let target = VisualPos { row: tb.cursor.visual.row - 1, col: tb.cursor.visual.col };
                tb.move_to_visual(target);
            }
            KeyCode::Down if modifiers.contains(KeyModifiers::CTRL) => {
                scroll_outer(ctx, outer, Point::new(0, 1));
                make_cursor_visible = false;
            }
            KeyCode::Down => {
                let target = VisualPos { row: tb.cursor.visual.row + 1, col: tb.cursor.visual.col };
                tb.move_to_visual(target);
            }
            KeyCode::Insert => tb.overtype = !tb.overtype,
            KeyCode::Delete => tb.delete(1),
            KeyCode::Char('Y') if modifiers.contains(KeyModifiers::CTRL) => tb.redo(),
            KeyCode::Char('Z') if modifiers.contains(KeyModifiers::CTRL) => tb.undo(),
            _ => return,
        }

        if make_cursor_visible {
            let mut scroll = match ctx.nodes[outer.index()].content {
                Content::Scrollarea { scroll } => scroll,
                _ => Point::default(),
            };
            let cursor_col = tb.cursor.visual.col as i32;
            let cursor_row = tb.cursor.visual.row as i32;
            scroll.x = scroll.x.min(cursor_col);
            scroll.x = scroll.x.max(cursor_col - width + 1);
            scroll.y = scroll.y.min(cursor_row);
            scroll.y = scroll.y.max(cursor_row - height + 1);
            ctx.nodes[outer.index()].content = Content::Scrollarea { scroll };

            let grown = (scroll.x + width).max(0);
            let node = &mut ctx.nodes[inner.index()];
            node.intrinsic_size.width = node.intrinsic_size.width.max(grown);
        }

        ctx.consume_input();
    } else {
        let mouse = ctx.input_mouse();
        if matches!(mouse, MouseAction::Left | MouseAction::Release) {
            let pos = ctx.input_mouse_position();
            let scroll = match ctx.nodes[outer.index()].content {
                Content::Scrollarea { scroll } => scroll,
                _ => Point::default(),
            };
            let visual = VisualPos {
                row: (scroll.y + (pos.y - viewport.top)) as i64,
                col: (scroll.x + (pos.x - viewport.left)) as i64,
            };
            let logical = visual_to_logical(tb, visual);

            if mouse == MouseAction::Left {
                tb.selection.update(logical);
            } else if matches!(tb.selection.state, SelectionState::Active) {
                tb.selection.update(logical);
                tb.selection.end();
            }
            tb.move_to_logical(logical);
            ctx.consume_input();
        }
    }
}

fn scroll_outer(ctx: &mut UiContext, outer: NodeId, delta: Point) {
    if let Content::Scrollarea { scroll } = &mut ctx.nodes[outer.index()].content {
        scroll.x += delta.x;
        scroll.y += delta.y;
    }
}

/// Extracts the visible rows, cursor position, and selection spans for the
/// viewport `rect` at the given scroll offset, leaving `tb`'s cursor
/// untouched.
fn materialize_textarea_content(
    tb: &mut TextBuffer,
    viewport: Rect,
    scroll: Point,
    is_focused: bool,
) -> (Vec<String>, Option<Point>, Vec<(i32, i32, i32)>) {
    let width = viewport.width().max(0);
    let height = viewport.height().max(0);
    let cursor_backup = tb.cursor;

    let mut rows = Vec::with_capacity(height as usize);
    for y in 0..height {
        let row = (scroll.y + y) as i64;
        let beg = { tb.move_to_visual(VisualPos { row, col: scroll.x as i64 }); tb.cursor.offset };
        let end = { tb.move_to_visual(VisualPos { row, col: scroll.x as i64 + width as i64 }); tb.cursor.offset };
        rows.push(tb.extract_string(beg.min(end), beg.max(end)));
    }

    let mut selection = Vec::new();
    if let Some((beg_l, end_l)) = tb.selection.visible_range() {
        tb.move_to_logical(beg_l);
        let mut beg = tb.cursor.visual;
        tb.move_to_logical(end_l);
        let mut end = tb.cursor.visual;
        if (beg.row, beg.col) > (end.row, end.col) {
            std::mem::swap(&mut beg, &mut end);
        }

        let top = scroll.y as i64;
        let bottom = top + height as i64;
        let mut row = beg.row.max(top);
        while row < end.row.min(bottom - 1) + 1 && row < bottom {
            let x1 = if row == beg.row { beg.col } else { 0 };
            let x2 = if row == end.row { end.col } else { scroll.x as i64 + width as i64 };
            let row_local = (row - top) as i32;
            let x1_local = (x1 - scroll.x as i64).clamp(0, width as i64) as i32;
            let x2_local = (x2 - scroll.x as i64).clamp(0, width as i64) as i32;
            if x2_local > x1_local {
                selection.push((row_local, x1_local, x2_local));
            }
            row += 1;
        }
    }

    let cursor = if is_focused {
        let v = cursor_backup.visual;
        let local = Point::new((v.col - scroll.x as i64) as i32, (v.row - scroll.y as i64) as i32);
        (local.x >= 0 && local.x < width && local.y >= 0 && local.y < height).then_some(local)
    } else {
        None
    };

    tb.cursor = cursor_backup;
    (rows, cursor, selection)
}

/// A scrollable, editable text area over `tb`. `tb` outlives the frame;
/// this function both drives input against it and renders its current
/// state, using the previous frame's resolved geometry for both (a node's
/// own layout isn't known until after this call returns). `intrinsic_size`
/// sizes the surrounding scrollarea — pass the viewport the caller wants
/// this textarea to occupy, not the document's own line count, so a short
/// document still fills the screen instead of shrinking to its content.
pub fn textarea(ctx: &mut UiContext, name: &str, tb: &mut TextBuffer, intrinsic_size: Size) {
    ctx.container_begin_named(name);
    let outer_id = ctx.attr_node;
    let outer_id64 = ctx.nodes[outer_id.index()].id;

    let is_focused = ctx.has_focus();
    if ctx.is_hovering() && ctx.input_mouse() == MouseAction::Left {
        ctx.focus_next_by_default();
    }

    scrollarea_begin(ctx, "content", intrinsic_size);
    let inner_id = ctx.attr_node;

    let prev_viewport = ctx
        .prev_node(outer_id64)
        .map(|n| n.inner)
        .unwrap_or_default();

    if is_focused {
        textarea_handle_input(ctx, tb, outer_id, inner_id, prev_viewport);
    }

    tb.reflow(-1);

    let scroll = match ctx.nodes[outer_id.index()].content {
        Content::Scrollarea { scroll } => scroll,
        _ => Point::default(),
    };
    let (rows, cursor, selection) = materialize_textarea_content(tb, prev_viewport, scroll, is_focused);

    ctx.container_begin_named("text");
    ctx.nodes[ctx.attr_node.index()].content = Content::Textarea { rows, cursor, overtype: tb.overtype, selection };
    ctx.nodes[ctx.attr_node.index()].intrinsic_size = Size::new(0, tb.line_count() as i32);
    ctx.nodes[ctx.attr_node.index()].intrinsic_size_set = true;
    ctx.container_end();

    scrollarea_end(ctx);
    ctx.container_end();
}

/// Builds a label container (named by `text`) with the first occurrence of
/// `accelerator` picked out in red; if the letter isn't present in `text`
/// at all, appends it in parentheses instead, matching how a menu still
/// needs to show its accelerator even when it isn't a substring.
fn styled_accelerator_label(ctx: &mut UiContext, text: &str, accelerator: char) {
    if !accelerator.is_ascii_alphabetic() {
        label(ctx, text);
        return;
    }

    let upper = accelerator.to_ascii_uppercase();
    let hit = text.char_indices().find(|&(_, c)| c.to_ascii_uppercase() == upper);

    styled_label_begin_named(ctx, text);
    match hit {
        Some((start, c)) => {
            let end = start + c.len_utf8();
            styled_label_add_text(ctx, &text[..start]);
            styled_label_set_foreground_indexed(ctx, 9);
            styled_label_add_text(ctx, &text[start..end]);
            styled_label_set_foreground_indexed(ctx, 0);
            styled_label_add_text(ctx, &text[end..]);
        }
        None => {
            styled_label_add_text(ctx, text);
            styled_label_add_text(ctx, " (");
            styled_label_set_foreground_indexed(ctx, 9);
            styled_label_add_text(ctx, &upper.to_string());
            styled_label_set_foreground_indexed(ctx, 0);
            styled_label_add_text(ctx, ")");
        }
    }
    styled_label_end(ctx);
}

fn shortcut_label(letter: char, modifiers: KeyModifiers) -> Option<String> {
    if !letter.is_ascii_alphabetic() {
        return None;
    }
    let mut s = String::new();
    if modifiers.contains(KeyModifiers::CTRL) {
        s.push_str("Ctrl+");
    }
    if modifiers.contains(KeyModifiers::ALT) {
        s.push_str("Alt+");
    }
    if modifiers.contains(KeyModifiers::SHIFT) {
        s.push_str("Shift+");
    }
    s.push(letter.to_ascii_uppercase());
    Some(s)
}

pub fn menubar_begin(ctx: &mut UiContext) {
    ctx.container_begin_named("menubar");
    ctx.attr_grid_columns(Vec::new());
}

/// Begins a menu's label in the menubar row; if it's focused, opens its
/// flyout (a bordered column anchored under the label, not the row as a
/// whole) and returns `true` so the caller can fill it with `menu_item`s.
pub fn menubar_menu_begin(ctx: &mut UiContext, text: &str, accelerator: char) -> bool {
    {
        let row = ctx.parent;
        ctx.nodes[row.index()].attributes.grid_columns.push(0);
    }

    styled_accelerator_label(ctx, text, accelerator);
    let label_node = ctx.attr_node;
    ctx.attr_padding(Padding::uniform(1, 0, 1, 0));

    if ctx.is_hovering() {
        ctx.focus_next_by_default();
    }

    if !ctx.has_focus() {
        return false;
    }

    ctx.attr_background_indexed(15);
    ctx.attr_foreground_indexed(0);

    let label_id = ctx.nodes[label_node.index()].id;
    ctx.container_begin(label_id ^ 0x5a5a_5a5a_5a5a_5a5a);
    let flyout = ctx.attr_node;
    ctx.attr_float(FloatSpec { gravity_x: 0.0, gravity_y: 0.0, offset_x: 0, offset_y: 1 });
    // Anchored to the label itself, not the menubar row it was built under:
    // `attr_float` above unlinked it from the row using its real tree
    // parent, and only now is the stored parent redirected so the layout
    // pass positions it against the label's `outer` rect instead.
    ctx.nodes[flyout.index()].parent = Some(label_node);
    ctx.attr_grid_columns(vec![-1]);
    ctx.attr_border();
    ctx.attr_background_indexed(15);
    ctx.attr_foreground_indexed(0);

    true
}

/// `true` on the frame this item was released while focused.
pub fn menubar_menu_item(ctx: &mut UiContext, text: &str, accelerator: char, shortcut: Option<(char, KeyModifiers)>) -> bool {
    ctx.container_begin_named(text);
    ctx.attr_grid_columns(vec![-1, 0]);
    ctx.attr_padding(Padding::uniform(1, 0, 1, 0));

    if ctx.is_hovering() {
        ctx.focus_next_by_default();
    }

    let focused = ctx.has_focus();
    if focused {
        ctx.attr_background_indexed(0);
        ctx.attr_foreground_indexed(15);
    }
    let clicked = ctx.was_clicked();

    styled_accelerator_label(ctx, text, accelerator);
    match shortcut.and_then(|(letter, mods)| shortcut_label(letter, mods)) {
        Some(display) => label(ctx, &display),
        None => {
            ctx.container_begin_named("");
            ctx.container_end();
        }
    }

    if clicked {
        ctx.consume_input();
    }
    ctx.container_end();
    clicked
}

pub fn menubar_menu_end(ctx: &mut UiContext) {
    ctx.container_end();
}

pub fn menubar_end(ctx: &mut UiContext) {
    ctx.container_end();
}
