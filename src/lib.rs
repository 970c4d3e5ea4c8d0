pub mod assembler;
pub mod classifier;
pub mod cli;
pub mod config;
pub mod connection;
pub mod filter;
pub mod focus;
pub mod logging;
pub mod render;
pub mod scrollback;
pub mod session;
