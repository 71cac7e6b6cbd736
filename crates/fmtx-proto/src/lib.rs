pub mod config;
pub mod platform;
pub mod prefs;
pub mod presets;
pub mod protocol;
pub mod state;
