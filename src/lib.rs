//! Memoria: posts with ordered, annotated media, stored in PostgreSQL and
//! on local object storage, served over an API-key authenticated HTTP API.

pub mod application;
pub mod config;
pub mod domain;
pub mod infra;
