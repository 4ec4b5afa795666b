pub mod catalog;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod error;
pub mod export;
pub mod icons;
pub mod layout;
pub mod model;
pub mod render;
pub mod server;
pub mod service;
pub mod store;
pub mod svg;
pub mod theme;

#[cfg(feature = "cli")]
pub use cli::run;
pub use error::{LabelError, Result};
