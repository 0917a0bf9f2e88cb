pub mod api;
pub mod chat;
pub mod cli;
pub mod core;
pub mod floats;
pub mod stream;
