pub mod chrome;
pub mod memory;
pub mod registry;
pub mod traits;

pub use registry::{PageContextId, PageRegistry};
pub use traits::{DomEvent, Document, ElementRef};
