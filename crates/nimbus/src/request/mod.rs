//! Request descriptors and call-shape normalization

mod descriptor;
mod options;

pub use descriptor::{RequestDescriptor, RequestPath};
pub use options::RequestOptions;
