pub mod api;
pub mod cli;
pub mod config;
pub mod job;
pub mod markdown;
pub mod normalize;
pub mod payload;
pub mod progress;
pub mod render;
pub mod report;
pub mod section;
pub mod state;
pub mod transport;
pub mod util;
