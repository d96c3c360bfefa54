//! One module per dashboard view

pub mod timeline;
pub mod traces;
pub mod versions;
