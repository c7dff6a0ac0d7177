//! Configuration loading, merging and the validated run configuration.
mod apply;
mod loader;
mod run;
pub mod types;


pub use apply::apply_config;
pub use loader::{DEFAULT_CONFIG_FILES, default_config_path, load_config};
pub use run::RunConfig;

#[cfg(test)]
pub(crate) use loader::{load_config_file, resolve_config_path};
