pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::CliConfig;
pub use config::{cli::LocalStorage, toml_config::DnsgateConfig};

pub use core::{engine::GenerateEngine, pipeline::BlocklistPipeline};
pub use domain::ports::{ConfigProvider, Pipeline, Storage};
pub use utils::error::{DnsgateError, Result};
