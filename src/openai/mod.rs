mod core;
pub mod keys;
pub use self::core::*;
pub use keys::{KeyError, KeyStore, validate_api_key_format};
