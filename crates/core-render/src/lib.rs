//! Immediate-mode terminal UI: a node tree rebuilt from container/widget
//! calls every frame, laid out with a small box-model + grid engine, and
//! painted into a minimal SGR diff against the previous frame.
//!
//! - [`node`]: the node tree's storage (`NodeId`, `UiNode`, `Content`).
//! - [`color`]: gamma-correct alpha blending for background/foreground fill.
//! - [`context`]: `UiContext`, the per-frame call graph and input state.
//! - [`layout`]: intrinsic sizing, grid/scrollarea placement, floats.
//! - [`render`]: the paint pass and SGR diff that turns a frame into bytes.
//! - [`widgets`]: labels, buttons, scrollareas, a textarea, and a menubar.

pub mod color;
pub mod context;
pub mod layout;
pub mod node;
pub mod render;
pub mod widgets;

pub use context::{UiContext, UiInput};
pub use node::{Attributes, Content, FloatSpec, NodeId, Padding, StyledChunk, UiNode};
pub use render::root_render;
