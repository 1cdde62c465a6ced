pub mod config;
pub mod device_info;
pub mod error;
pub mod session_report;
pub mod spectrum;
pub mod state;
