//! Box-model geometry and the layout pass: turns the node tree's intrinsic
//! sizes and grid/float attributes into screen-space `outer`/`inner` rects.

use core_text::geom::{Rect, Size};

use crate::context::{UiContext, child_ids};
use crate::node::{Content, NodeId, UiNode};

fn border_edges(node: &UiNode) -> (i32, i32, i32, i32) {
    let b = node.attributes.bordered as i32;
    let scrollarea_right = matches!(node.content, Content::Scrollarea { .. }) as i32;
    (b, b, b | scrollarea_right, b)
}

fn outer_to_inner(node: &UiNode, outer: Rect) -> Rect {
    let (l, t, r, b) = border_edges(node);
    let p = &node.attributes.padding;
    Rect::new(
        outer.left + p.left + l,
        outer.top + p.top + t,
        outer.right - p.right - r,
        outer.bottom - p.bottom - b,
    )
}

fn intrinsic_to_outer(node: &UiNode) -> Size {
    let (l, t, r, b) = border_edges(node);
    let p = &node.attributes.padding;
    Size::new(
        node.intrinsic_size.width + p.left + p.right + l + r,
        node.intrinsic_size.height + p.top + p.bottom + t + b,
    )
}

fn compute_intrinsic_size(ctx: &mut UiContext, id: NodeId) {
    if ctx.nodes[id.index()].intrinsic_size_set {
        return;
    }

    let children = child_ids(&ctx.nodes, id);
    for &child in &children {
        compute_intrinsic_size(ctx, child);
    }

    let columns = effective_columns(&ctx.nodes[id.index()].attributes.grid_columns);
    let mut row_size = Size::default();
    let mut total = Size::default();
    let mut column = 0usize;

    for &child in &children {
        let mut size = intrinsic_to_outer(&ctx.nodes[child.index()]);
        size.width = size.width.max(*columns.get(column).unwrap_or(&-1));

        row_size.width += size.width;
        row_size.height = row_size.height.max(size.height);

        column += 1;
        if column >= columns.len().max(1) {
            total.width = total.width.max(row_size.width);
            total.height += row_size.height;
            row_size = Size::default();
            column = 0;
        }
    }

    total.width = total.width.max(row_size.width);
    total.height += row_size.height;

    let node = &mut ctx.nodes[id.index()];
    node.intrinsic_size = total;
    node.intrinsic_size_set = true;
}

/// Grid columns as declared, or the single implicit auto column.
fn effective_columns(declared: &[i32]) -> Vec<i32> {
    if declared.is_empty() { vec![-1] } else { declared.to_vec() }
}

fn layout_children(ctx: &mut UiContext, id: NodeId, clip: Rect) {
    let children = child_ids(&ctx.nodes, id);
    if children.is_empty() || ctx.nodes[id.index()].inner.is_empty() {
        return;
    }

    if matches!(ctx.nodes[id.index()].content, Content::Scrollarea { .. }) {
        layout_scrollarea(ctx, id, children[0]);
        return;
    }

    let mut columns = effective_columns(&ctx.nodes[id.index()].attributes.grid_columns);

    let mut intrinsic_width = vec![0i32; columns.len()];
    for (i, &child) in children.iter().enumerate() {
        let size = intrinsic_to_outer(&ctx.nodes[child.index()]);
        let slot = i % columns.len();
        intrinsic_width[slot] = intrinsic_width[slot].max(size.width);
    }

    let inner_width = ctx.nodes[id.index()].inner.width();
    let total_abs: i32 = columns.iter().copied().filter(|&w| w > 0).sum();
    let total_fr: i32 = columns.iter().copied().filter(|&w| w < 0).sum();
    let fr_scale = if total_fr < 0 {
        let remaining = (inner_width - total_abs).max(0);
        remaining as f64 / total_fr as f64
    } else {
        0.0
    };
    for (i, w) in columns.iter_mut().enumerate() {
        if *w <= 0 {
            let mut adjusted = intrinsic_width[i];
            if *w < 0 {
                let fr = (*w as f64 * fr_scale + 0.5) as i32;
                adjusted = adjusted.max(fr);
            }
            *w = adjusted;
        }
    }

    let inner = ctx.nodes[id.index()].inner;
    let mut x = inner.left;
    let mut y = inner.top;
    let mut row_height = 0;

    for (i, &child) in children.iter().enumerate() {
        let column = i % columns.len();
        let mut size = intrinsic_to_outer(&ctx.nodes[child.index()]);
        size.width = columns[column];

        let mut outer = Rect::new(x, y, x + size.width, y + size.height);
        outer = outer.intersect(inner);
        let c = &mut ctx.nodes[child.index()];
        c.outer = outer;
        c.inner = outer_to_inner(c, outer);
        c.outer_clipped = outer.intersect(clip);
        c.inner_clipped = c.inner.intersect(clip);

        x += size.width;
        row_height = row_height.max(size.height);

        if column + 1 >= columns.len() {
            x = inner.left;
            y += row_height;
            row_height = 0;
        }
    }

    for &child in &children {
        layout_children(ctx, child, clip);
    }
}

fn layout_scrollarea(ctx: &mut UiContext, id: NodeId, child: NodeId) {
    let node_inner = ctx.nodes[id.index()].inner;
    let sx = node_inner.width();
    let sy = node_inner.height();
    let child_intrinsic = ctx.nodes[child.index()].intrinsic_size;
    let cx = child_intrinsic.width.max(sx);
    let cy = child_intrinsic.height.max(sy);

    let scroll = match ctx.nodes[id.index()].content {
        Content::Scrollarea { scroll } => scroll,
        _ => unreachable!("caller checked content type"),
    };
    let ox = scroll.x.clamp(0, (cx - sx).max(0));
    let oy = scroll.y.clamp(0, (cy - sy).max(0));

    let mut outer = node_inner;
    outer.left = node_inner.left - ox;
    outer.top = node_inner.top - oy;
    outer.right = outer.left + cx;
    outer.bottom = outer.top + cy;

    let node_inner_clipped = ctx.nodes[id.index()].inner_clipped;
    let c = &mut ctx.nodes[child.index()];
    c.outer = outer;
    c.inner = outer_to_inner(c, outer);
    c.outer_clipped = outer.intersect(node_inner_clipped);
    c.inner_clipped = c.inner.intersect(node_inner_clipped);

    if let Content::Scrollarea { scroll } = &mut ctx.nodes[id.index()].content {
        scroll.x = ox;
        scroll.y = oy;
    }
}

/// Builds the current frame's layout: intrinsic sizes bottom-up, the main
/// tree top-down from the root's bounds, then each floating root
/// positioned against its original parent's bounds using its gravity and
/// offset.
pub(crate) fn finalize(ctx: &mut UiContext) {
    if ctx.finalized {
        return;
    }

    let roots = ctx.roots.clone();
    for &root in &roots {
        compute_intrinsic_size(ctx, root);
    }

    if let Some(&root) = roots.first() {
        let size = ctx.size;
        {
            let node = &mut ctx.nodes[root.index()];
            node.outer = Rect::new(0, 0, size.width, size.height);
            node.inner = outer_to_inner(node, node.outer);
            node.outer_clipped = node.outer;
            node.inner_clipped = node.inner;
        }
        let root_outer = ctx.nodes[root.index()].outer;
        layout_children(ctx, root, root_outer);

        for &float_root in &roots[1..] {
            let parent = ctx.nodes[float_root.index()].parent.expect("float root keeps its original parent");
            let parent_outer = ctx.nodes[parent.index()].outer;
            let size = intrinsic_to_outer(&ctx.nodes[float_root.index()]);
            let spec = ctx.nodes[float_root.index()].attributes.float_spec;

            let x = parent_outer.left + spec.offset_x - (spec.gravity_x * size.width as f32 + 0.5) as i32;
            let y = parent_outer.top + spec.offset_y - (spec.gravity_y * size.height as f32 + 0.5) as i32;

            let outer = Rect::new(x, y, x + size.width, y + size.height);
            let root_inner_clipped = ctx.nodes[root.index()].inner_clipped;
            let c = &mut ctx.nodes[float_root.index()];
            c.outer = outer;
            c.inner = outer_to_inner(c, outer);
            c.outer_clipped = outer.intersect(root_inner_clipped);
            c.inner_clipped = outer.intersect(root_inner_clipped);

            layout_children(ctx, float_root, outer);
        }
    }

    ctx.finalized = true;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_child_fills_inner_width_with_auto_column() {
        let mut ctx = UiContext::new();
        ctx.container_begin(1);
        ctx.nodes[1].intrinsic_size = Size::new(4, 1);
        ctx.nodes[1].intrinsic_size_set = true;
        ctx.container_end();

        ctx.size = Size::new(20, 5);
        finalize(&mut ctx);

        assert_eq!(ctx.nodes[1].outer, Rect::new(0, 0, 4, 1));
    }

    #[test]
    fn grid_columns_split_two_equal_fractions() {
        let mut ctx = UiContext::new();
        ctx.attr_grid_columns(vec![-1, -1]);
        ctx.container_begin(1);
        ctx.container_end();
        ctx.container_begin(2);
        ctx.container_end();

        ctx.size = Size::new(20, 5);
        finalize(&mut ctx);

        assert_eq!(ctx.nodes[1].outer.width(), 10);
        assert_eq!(ctx.nodes[2].outer.width(), 10);
    }

    #[test]
    fn float_positions_relative_to_parent_with_gravity() {
        let mut ctx = UiContext::new();
        ctx.container_begin(1);
        ctx.nodes[1].intrinsic_size = Size::new(6, 2);
        ctx.nodes[1].intrinsic_size_set = true;
        ctx.attr_float(crate::node::FloatSpec { gravity_x: 0.0, gravity_y: 0.0, offset_x: 0, offset_y: 1 });
        ctx.container_end();

        ctx.size = Size::new(20, 5);
        finalize(&mut ctx);

        assert_eq!(ctx.nodes[1].outer, Rect::new(0, 1, 6, 3));
    }

    #[test]
    fn finalize_gives_the_root_the_full_screen_rect() {
        let mut ctx = UiContext::new();
        ctx.size = Size::new(10, 3);
        finalize(&mut ctx);
        assert_eq!(ctx.nodes[0].outer, Rect::new(0, 0, 10, 3));
    }

    #[test]
    fn finalize_is_idempotent_once_flagged() {
        let mut ctx = UiContext::new();
        ctx.size = Size::new(10, 3);
        finalize(&mut ctx);
        ctx.size = Size::new(99, 99);
        finalize(&mut ctx);
        assert_eq!(ctx.nodes[0].outer, Rect::new(0, 0, 10, 3));
    }
}
