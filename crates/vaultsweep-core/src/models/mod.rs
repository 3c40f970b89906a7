pub mod cipher;
pub mod strategy;
pub mod uri;

pub use cipher::*;
pub use strategy::*;
pub use uri::{UriFields, UriValue};
