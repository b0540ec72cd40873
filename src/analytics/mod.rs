pub mod spike_filter;

pub use spike_filter::*;
