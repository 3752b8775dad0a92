pub mod catalog;
pub mod cli;
pub mod config;
pub mod error;
pub mod household;
pub mod models;
pub mod optim;
