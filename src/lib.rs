pub mod advisor;
pub mod config;
pub mod forecast;
pub mod logging;
pub mod mock;
pub mod report;
pub mod risk;
pub mod scenario;
pub mod session;
pub mod users;
