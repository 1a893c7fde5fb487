pub mod config;
pub mod formula;
pub mod logger;
pub mod net;
pub mod oracle;
pub mod orchestrator;
pub mod threading;
