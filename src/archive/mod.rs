pub mod attributes;
pub mod error;
pub mod frame;
pub mod merger;
pub mod store;
