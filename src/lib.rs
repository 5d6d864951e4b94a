pub mod builder;
pub mod cli;
pub mod config;
pub mod impact;
pub mod model;
pub mod parser;
pub mod store;
pub mod util;
