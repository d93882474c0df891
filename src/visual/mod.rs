pub mod coordinator;
pub mod preset;
pub mod settings;
