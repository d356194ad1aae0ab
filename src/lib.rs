pub mod artifacts;
pub mod cancel;
pub mod clean;
pub mod config;
pub mod db;
pub mod executor;
pub mod pipeline;
pub mod splitter;
