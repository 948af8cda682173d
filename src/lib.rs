//! The backend for the Sick Fits clothing shop

pub mod auth;
pub mod config;
pub mod email;
pub mod error;
pub mod graphql;
pub mod models;
pub mod payment;
pub mod util;
