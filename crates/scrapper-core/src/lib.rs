pub mod adapters;
pub mod bot_client;
pub mod config;
pub mod error;
pub mod migrations;
pub mod models;
pub mod monitor;
pub mod storage;

pub use bot_client::BotClient;
pub use config::Config;
pub use monitor::Monitor;
pub use storage::{LinkServiceKind, LinkStorage, MemoryLinkStorage, OrmLinkStorage, SqlLinkStorage};
