pub mod api;
pub mod climate;
pub mod config;
pub mod control;
pub mod coordinator;
pub mod host;
pub mod hub;
pub mod notify;
pub mod sensors;
pub mod setup;
pub mod snapshot_cache;

#[cfg(test)]
mod testing;
