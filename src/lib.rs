pub mod bootstrap;
pub mod cache;
pub mod error;
pub mod kernel;
pub mod options;
pub mod routes;
pub mod settings;
pub mod state;
