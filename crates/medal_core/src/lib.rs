pub mod clock;
pub mod config;
pub mod error;
pub mod ledger_api;
pub mod model;
pub mod storage;
