mod error;
mod extdev_toml;

pub use error::*;
pub use extdev_toml::*;
