//! Gap-buffer text store: the document model shared by the editing core
//! and the renderer.
//!
//! `gap_buffer::TextBuffer` holds the document; `measure` and `width`
//! turn bytes into graphemes and terminal columns; `bom` identifies
//! non-UTF-8 input before it is ever handed to the buffer; `geom` is the
//! screen-space vocabulary shared with the renderer.

pub mod bom;
pub mod gap_buffer;
pub mod geom;
pub mod measure;
pub mod width;

pub use bom::{Encoding, detect_bom};
pub use gap_buffer::{Cursor, LogicalPos, Selection, SelectionState, TextBuffer, VisualPos};
pub use measure::{MeasureResult, NO_STOP, measure_backward, measure_forward};
pub use width::egc_width;
