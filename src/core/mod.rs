pub mod download;
pub mod engine;
pub mod events;
pub mod install;
pub mod model;
pub mod sweeper;
pub mod version;
