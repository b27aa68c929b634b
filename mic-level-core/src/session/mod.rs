pub mod engine;
pub mod level_channel;
pub mod monitor;
pub mod recorder;
