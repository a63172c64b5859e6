pub mod config;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod root;
pub mod scanner;
pub mod storage;

pub use config::AppConfig;
pub use engine::{ScanEngine, ScanOutcome};
pub use error::Error;
pub use root::RootResolver;
