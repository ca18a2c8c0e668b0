pub mod chime;
pub mod config;
pub mod error;
pub mod kv_store;
pub mod notion_client;
pub mod settings_store;
pub mod task_mapper;
