mod publisher;
mod repository;

pub use publisher::*;
pub use repository::*;
