// Infrastructure layer - External dependencies and adapters
pub mod config;
pub mod discord_notifier;
pub mod hetrix_client;
pub mod json_mapper;
