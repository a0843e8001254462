pub mod coordinator;
pub mod dataset;
pub mod indicators;
pub mod model;
pub mod signal;
