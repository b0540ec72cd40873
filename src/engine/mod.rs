pub mod actions;
pub mod reconciler;

pub use actions::*;
pub use reconciler::*;
