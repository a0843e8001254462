pub mod file_store;
pub mod sim_feed;
