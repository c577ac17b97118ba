pub mod capture;
pub mod completeness;
pub mod config;
pub mod kernel;
pub mod kernel_executor;
pub mod server;
pub mod tcl_runtime;
