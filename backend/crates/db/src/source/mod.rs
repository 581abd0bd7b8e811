pub mod models;
pub mod payloads;
pub mod pg_repository;
pub mod repositories;
