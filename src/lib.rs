pub mod api;
pub mod app;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod model;
pub mod output;

#[cfg(test)]
mod tests;
