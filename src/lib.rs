pub mod app;
pub mod cli;
pub mod download;
pub mod file;
pub mod ipc;
pub mod mask;
pub mod media;
pub mod util;

pub use app::config::Config;
