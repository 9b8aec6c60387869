pub mod cleanup;
pub mod dev;
pub mod install_addon;
pub mod instances;
