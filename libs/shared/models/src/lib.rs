pub mod appointment;
pub mod auth;
pub mod error;
pub mod report;
pub mod response;
pub mod user;
