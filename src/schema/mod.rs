mod data;
mod document;

pub use data::*;
pub use document::*;
