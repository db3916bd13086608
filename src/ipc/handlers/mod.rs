pub mod backup_exchange;
pub mod core;
pub mod records;
pub mod results;
pub mod session;
