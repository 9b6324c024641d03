// Play configuration: viewport, judge, input and compatibility settings

pub mod compat_config;
pub mod play_config;

pub use compat_config::CompatConfig;
pub use play_config::{PlayConfig, ViewportConfig};
