pub mod config;
pub mod constants;
pub mod errors;
pub mod gateway;
pub mod logging;
pub mod manifest;
pub mod model;
pub mod resolver;
