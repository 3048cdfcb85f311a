pub mod components;
pub mod config;
pub mod document;
pub mod error;
pub mod export;
pub mod fetch;
pub mod lines;
pub mod model;
pub mod pipeline;
pub mod registry;
pub mod runtime;
pub mod store;
pub mod tables;
