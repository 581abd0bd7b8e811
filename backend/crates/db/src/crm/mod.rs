pub mod document;
pub mod models;
pub mod pg_repository;
pub mod repositories;
