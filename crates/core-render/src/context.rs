//! The per-frame context: a container/widget call graph is rebuilt into
//! this every frame, and per-id state (focus, scroll offset, hover) is
//! carried across frames by looking nodes up by id in the previous frame.

use std::collections::HashMap;
use std::hash::{Hash, Hasher};

use core_input::{InputEvent, KeyCode, KeyModifiers, MouseAction};
use core_text::geom::{Point, Rect, Size};

use crate::node::{NodeId, UiNode};

/// The root node's id never collides with a hashed one: real ids come from
/// `hash_named`, which can theoretically produce this value but never will
/// in practice (it would require an adversarial name under the same
/// parent), matching the sentinel the original reserves for the root.
const ROOT_ID: u64 = 0x0123_4567_89ab_cdef;

fn hash_named(parent: u64, name: &str) -> u64 {
    let mut h = ahash::AHasher::default();
    parent.hash(&mut h);
    name.hash(&mut h);
    h.finish()
}

#[derive(Debug, Clone, Default)]
pub enum UiInput {
    #[default]
    None,
    Resize {
        width: i32,
        height: i32,
    },
    Text(String),
    Keyboard {
        code: KeyCode,
        modifiers: KeyModifiers,
    },
    Mouse {
        action: MouseAction,
        modifiers: KeyModifiers,
        position: Point,
        scroll: Point,
    },
}

impl From<InputEvent> for UiInput {
    fn from(ev: InputEvent) -> Self {
        match ev {
            InputEvent::Resize { width, height } => UiInput::Resize { width, height },
            InputEvent::Text(s) => UiInput::Text(s),
            InputEvent::Key { code, modifiers } => UiInput::Keyboard { code, modifiers },
            InputEvent::Mouse { action, modifiers, x, y, scroll_x, scroll_y } => UiInput::Mouse {
                action,
                modifiers,
                position: Point::new(x, y),
                scroll: Point::new(scroll_x, scroll_y),
            },
        }
    }
}

pub struct UiContext {
    pub(crate) nodes: Vec<UiNode>,
    prev_nodes: Vec<UiNode>,
    prev_node_map: HashMap<u64, NodeId>,

    pub indexed_colors: [[u8; 3]; 16],
    pub size: Size,

    pub(crate) roots: Vec<NodeId>,
    pub(crate) attr_node: NodeId,
    pub(crate) parent: NodeId,
    autofocus_next: bool,

    focused_item_id: u64,

    input: UiInput,
    input_consumed: bool,
    input_mouse_position: Point,
    input_mouse_action: MouseAction,
    input_scroll_delta: Point,
    input_keyboard: Option<(KeyCode, KeyModifiers)>,
    input_text: String,

    pub(crate) finalized: bool,
}

impl UiContext {
    /// The very first frame: no previous-frame state to carry over.
    pub fn new() -> Self {
        let root = UiNode::new(ROOT_ID);
        Self {
            nodes: vec![root],
            prev_nodes: Vec::new(),
            prev_node_map: HashMap::new(),
            indexed_colors: [[0; 3]; 16],
            size: Size::new(80, 24),
            roots: vec![NodeId(0)],
            attr_node: NodeId(0),
            parent: NodeId(0),
            autofocus_next: false,
            focused_item_id: ROOT_ID,
            input: UiInput::None,
            input_consumed: true,
            input_mouse_position: Point::new(-1, -1),
            input_mouse_action: MouseAction::None,
            input_scroll_delta: Point::default(),
            input_keyboard: None,
            input_text: String::new(),
            finalized: false,
        }
    }

    pub fn setup_indexed_colors(&mut self, colors: [[u8; 3]; 16]) {
        self.indexed_colors = colors;
    }

    pub fn get_size(&self) -> Size {
        self.size
    }

    fn node(&self, id: NodeId) -> &UiNode {
        &self.nodes[id.index()]
    }

    fn node_mut(&mut self, id: NodeId) -> &mut UiNode {
        &mut self.nodes[id.index()]
    }

    pub(crate) fn prev_node(&self, id: u64) -> Option<&UiNode> {
        self.prev_node_map.get(&id).map(|&nid| &self.prev_nodes[nid.index()])
    }

    fn alloc_node(&mut self, id: u64) -> NodeId {
        self.nodes.push(UiNode::new(id));
        NodeId((self.nodes.len() - 1) as u32)
    }

    fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.node_mut(child).parent = Some(parent);
        let prev_last = self.node(parent).child_last;
        self.node_mut(child).sibling_prev = prev_last;
        if let Some(last) = prev_last {
            self.node_mut(last).sibling_next = Some(child);
        }
        if self.node(parent).child_first.is_none() {
            self.node_mut(parent).child_first = Some(child);
        }
        self.node_mut(parent).child_last = Some(child);
    }

    fn remove_from_tree(&mut self, id: NodeId) {
        let parent = self.node(id).parent.expect("node has a parent");
        let prev = self.node(id).sibling_prev;
        let next = self.node(id).sibling_next;
        if let Some(p) = prev {
            self.node_mut(p).sibling_next = next;
        }
        if let Some(n) = next {
            self.node_mut(n).sibling_prev = prev;
        }
        if self.node(parent).child_first == Some(id) {
            self.node_mut(parent).child_first = next;
        }
        if self.node(parent).child_last == Some(id) {
            self.node_mut(parent).child_last = prev;
        }
        let node = self.node_mut(id);
        node.sibling_prev = None;
        node.sibling_next = None;
    }

    // -- container / widget call graph -------------------------------------

    pub fn container_begin(&mut self, id: u64) {
        let parent = self.parent;
        let node = self.alloc_node(id);
        self.node_mut(node).stack_parent = Some(parent);
        self.append_child(parent, node);

        self.attr_node = node;
        self.parent = node;

        if self.autofocus_next {
            self.autofocus_next = false;
            if self.focused_item_id == self.node(parent).id {
                self.focused_item_id = id;
            }
        }
    }

    pub fn container_begin_named(&mut self, name: &str) {
        let parent_id = self.node(self.parent).id;
        self.container_begin(hash_named(parent_id, name));
    }

    pub fn container_end(&mut self) {
        self.attr_node = self.parent;
        let stack_parent = self.node(self.parent).stack_parent.expect("container was opened with container_begin");
        self.parent = stack_parent;
        self.autofocus_next = false;
    }

    pub fn attr_float(&mut self, spec: crate::node::FloatSpec) {
        let node = self.attr_node;
        self.remove_from_tree(node);
        let parent = self.node(node).parent;
        self.node_mut(node).parent = parent;
        let last = *self.roots.last().expect("at least the implicit root exists");
        self.node_mut(node).sibling_prev = Some(last);
        self.node_mut(last).sibling_next = Some(node);
        self.roots.push(node);

        let mut spec = spec;
        spec.gravity_x = spec.gravity_x.clamp(0.0, 1.0);
        spec.gravity_y = spec.gravity_y.clamp(0.0, 1.0);
        let attrs = &mut self.node_mut(node).attributes;
        attrs.float_spec = spec;
        attrs.floating = true;
    }

    pub fn attr_border(&mut self) {
        self.node_mut(self.attr_node).attributes.bordered = true;
    }

    pub fn attr_padding(&mut self, padding: crate::node::Padding) {
        self.node_mut(self.attr_node).attributes.padding = padding;
    }

    pub fn attr_grid_columns(&mut self, columns: Vec<i32>) {
        self.node_mut(self.attr_node).attributes.grid_columns = columns;
    }

    pub fn attr_background_rgba(&mut self, bg: u32) {
        self.node_mut(self.attr_node).attributes.bg = bg;
    }

    pub fn attr_foreground_rgba(&mut self, fg: u32) {
        self.node_mut(self.attr_node).attributes.fg = fg;
    }

    pub fn attr_background_indexed(&mut self, index: u32) {
        let rgb = self.indexed_colors[(index & 15) as usize];
        self.attr_background_rgba(crate::node::rgba(rgb[0], rgb[1], rgb[2], 0xff));
    }

    pub fn attr_foreground_indexed(&mut self, index: u32) {
        let rgb = self.indexed_colors[(index & 15) as usize];
        self.attr_foreground_rgba(crate::node::rgba(rgb[0], rgb[1], rgb[2], 0xff));
    }

    pub fn focus_next_by_default(&mut self) {
        self.autofocus_next = true;
    }

    pub fn consume_input(&mut self) {
        debug_assert!(!self.input_consumed);
        self.input_consumed = true;
    }

    pub fn consume_shortcut(&mut self, code: KeyCode, modifiers: KeyModifiers) -> bool {
        if !self.input_consumed && self.input_keyboard == Some((code, modifiers)) {
            self.consume_input();
            return true;
        }
        false
    }

    pub fn input_mouse(&self) -> MouseAction {
        if self.input_consumed { MouseAction::None } else { self.input_mouse_action }
    }

    pub fn input_mouse_position(&self) -> Point {
        self.input_mouse_position
    }

    pub fn input_scroll_delta(&self) -> Point {
        self.input_scroll_delta
    }

    pub fn input_text(&self) -> &str {
        if self.input_consumed { "" } else { &self.input_text }
    }

    pub fn input_keyboard(&self) -> Option<(KeyCode, KeyModifiers)> {
        if self.input_consumed { None } else { self.input_keyboard }
    }

    pub fn is_hovering(&self) -> bool {
        let id = self.node(self.attr_node).id;
        match self.prev_node(id) {
            Some(prev) => prev.outer.contains(self.input_mouse_position),
            None => false,
        }
    }

    pub fn has_focus(&self) -> bool {
        self.node(self.attr_node).id == self.focused_item_id
    }

    pub fn was_clicked(&self) -> bool {
        self.has_focus() && self.input_mouse() == MouseAction::Release
    }

    pub fn focused_id(&self) -> u64 {
        self.focused_item_id
    }

    /// Advance to the next frame: finalizes layout on `self` (if not
    /// already done), then rotates the node arenas so the just-finished
    /// frame becomes the "previous frame" lookup table for the new one.
    pub fn reset(mut self, input: UiInput) -> Self {
        crate::layout::finalize(&mut self);

        let mut prev_node_map = HashMap::with_capacity(self.nodes.len());
        for (i, node) in self.nodes.iter().enumerate() {
            prev_node_map.insert(node.id, NodeId(i as u32));
        }

        let root = UiNode::new(ROOT_ID);
        let mut ctx = Self {
            nodes: vec![root],
            prev_nodes: self.nodes,
            prev_node_map,
            indexed_colors: self.indexed_colors,
            size: self.size,
            roots: vec![NodeId(0)],
            attr_node: NodeId(0),
            parent: NodeId(0),
            autofocus_next: false,
            focused_item_id: self.focused_item_id,
            input: input.clone(),
            input_consumed: false,
            input_mouse_position: self.input_mouse_position,
            input_mouse_action: self.input_mouse_action,
            input_scroll_delta: Point::default(),
            input_keyboard: None,
            input_text: String::new(),
            finalized: false,
        };

        let root_colors = ctx.indexed_colors;
        {
            let root_node = ctx.node_mut(NodeId(0));
            root_node.attributes.bg = crate::node::rgba(root_colors[0][0], root_colors[0][1], root_colors[0][2], 0xff);
            root_node.attributes.fg = crate::node::rgba(root_colors[15][0], root_colors[15][1], root_colors[15][2], 0xff);
        }

        match input {
            UiInput::None => {
                ctx.input_consumed = true;
            }
            UiInput::Resize { width, height } => {
                ctx.size = Size::new(width.max(1), height.max(1));
            }
            UiInput::Text(text) => {
                ctx.input_text = text;
            }
            UiInput::Keyboard { code, modifiers } => {
                ctx.input_keyboard = Some((code, modifiers));
            }
            UiInput::Mouse { action, modifiers: _, position, scroll } => {
                let mut best = None;
                for &root in &self.roots {
                    walk(&ctx.prev_nodes, root, &mut |node, id| {
                        if node.inner_clipped.contains(position) {
                            best = Some(id);
                        }
                    });
                }

                let mut action = action;
                if matches!(self.input_mouse_action, MouseAction::Left | MouseAction::Middle | MouseAction::Right)
                    && matches!(action, MouseAction::None)
                {
                    action = MouseAction::Release;
                }

                ctx.input_mouse_action = action;
                ctx.input_mouse_position = position;
                ctx.input_scroll_delta = scroll;

                if let Some(id) = best {
                    if matches!(action, MouseAction::Left) {
                        ctx.focused_item_id = ctx.prev_nodes[id.index()].id;
                    }
                }
            }
        }

        ctx
    }
}

impl Default for UiContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Pre-order walk over a previous-frame subtree rooted at `root`, using the
/// sibling/child links recorded on `nodes`.
pub(crate) fn walk(nodes: &[UiNode], root: NodeId, f: &mut impl FnMut(&UiNode, NodeId)) {
    let mut node = root;
    loop {
        f(&nodes[node.index()], node);
        if let Some(child) = nodes[node.index()].child_first {
            node = child;
            continue;
        }
        loop {
            if let Some(next) = nodes[node.index()].sibling_next {
                node = next;
                break;
            }
            match nodes[node.index()].parent {
                Some(parent) if parent != root => node = parent,
                _ => return,
            }
        }
    }
}

pub(crate) fn child_ids(nodes: &[UiNode], parent: NodeId) -> Vec<NodeId> {
    let mut out = Vec::new();
    let mut cur = nodes[parent.index()].child_first;
    while let Some(id) = cur {
        out.push(id);
        cur = nodes[id.index()].sibling_next;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn container_begin_links_child_into_parent() {
        let mut ctx = UiContext::new();
        ctx.container_begin(1);
        assert_eq!(ctx.nodes[0].child_first, Some(NodeId(1)));
        ctx.container_end();
        assert_eq!(ctx.parent, NodeId(0));
    }

    #[test]
    fn named_containers_hash_deterministically_under_same_parent() {
        let mut a = UiContext::new();
        a.container_begin_named("button");
        let id_a = a.node(a.attr_node).id;

        let mut b = UiContext::new();
        b.container_begin_named("button");
        let id_b = b.node(b.attr_node).id;

        assert_eq!(id_a, id_b);
    }

    #[test]
    fn reset_on_an_empty_tree_does_not_panic() {
        let ctx = UiContext::new();
        let ctx = ctx.reset(UiInput::None);
        assert_eq!(ctx.nodes.len(), 1);
    }

    #[test]
    fn clicking_a_node_focuses_it_next_frame() {
        let mut ctx = UiContext::new();
        ctx.container_begin_named("btn");
        // Give the node a real, laid-out-sized footprint without requiring
        // a full widget call: this is what `ui_styled_label_end` etc. do in
        // practice, setting `intrinsic_size` before layout runs.
        ctx.node_mut(NodeId(1)).intrinsic_size = Size::new(5, 1);
        ctx.node_mut(NodeId(1)).intrinsic_size_set = true;
        let btn_id = ctx.node(NodeId(1)).id;
        ctx.container_end();

        let ctx = ctx.reset(UiInput::Mouse {
            action: MouseAction::Left,
            modifiers: KeyModifiers::empty(),
            position: Point::new(2, 0),
            scroll: Point::default(),
        });
        assert_eq!(ctx.focused_item_id, btn_id);
    }

    #[test]
    fn attr_setters_round_trip_onto_attr_node() {
        let mut ctx = UiContext::new();
        ctx.container_begin(1);
        ctx.attr_border();
        ctx.attr_padding(crate::node::Padding::uniform(1, 2, 3, 4));
        ctx.attr_background_rgba(crate::node::rgba(1, 2, 3, 255));
        let attrs = &ctx.node(NodeId(1)).attributes;
        assert!(attrs.bordered);
        assert_eq!(attrs.padding.top, 2);
        assert_eq!(attrs.bg, crate::node::rgba(1, 2, 3, 255));
    }
}
