pub mod errors;
pub mod history;
pub mod ports;
pub mod types;
