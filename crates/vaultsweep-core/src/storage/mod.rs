pub mod database;
pub mod import;
pub mod repositories;
