pub mod catalog;
pub mod chunk;
pub mod config;
pub mod datum;
pub mod executor;
pub mod session;
pub mod sql;
pub mod tx;
