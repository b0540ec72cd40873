pub mod balance;
pub mod engine;

pub use balance::*;
pub use engine::*;
