mod config;
mod migrations;
mod repository;
mod rows;

pub use config::PostgresConfig;
pub use migrations::run_migrations;
pub use repository::PostgresRepository;
