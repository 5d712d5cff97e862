//! Path resource services.

pub mod reference;
pub mod repository;
pub mod tree;

pub use reference::ResourceRef;
pub use repository::ResourceRepository;
pub use tree::TreeService;
