//! One module per group of subcommands. Each command takes the store and
//! paths it needs and returns plain data; rendering lives next to it.

pub mod backup;
pub mod migrate;
pub mod reports;
