pub mod accumulator;
pub mod selector;
