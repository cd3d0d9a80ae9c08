//! Source nodes

mod content_input;

pub use content_input::ContentInputNode;
