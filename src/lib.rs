pub mod backend;
pub mod config;
pub mod errors;
pub mod metrics;
pub mod mix;
pub mod mysql;
pub mod poller;
pub mod pool;
pub mod profile;
pub mod rate;
pub mod shutdown;
pub mod utils;
pub mod worker;
