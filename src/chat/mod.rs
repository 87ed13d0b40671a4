mod core;
pub mod models;
pub mod render;

pub use self::core::*;
pub use models::*;
