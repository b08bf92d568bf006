pub mod engine;
pub mod synthetic;
