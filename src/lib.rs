pub mod app;
pub mod autotune;
pub mod classify;
pub mod config;
pub mod copy_engine;
pub mod extensions;
pub mod regional;
pub mod scan;
pub mod types;
