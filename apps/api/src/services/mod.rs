//! Service layer.
//!
//! Logic shared by several routes, or that touches more than the database:
//!
//! - [`auth_service`] - registration, login, refresh rotation, logout
//! - [`report_service`] - PDF report rendering and publishing
//! - [`upload_service`] - avatar and report files under the upload directory

pub mod auth_service;
pub mod report_service;
pub mod upload_service;

pub use auth_service::{AuthService, Registration, TokenPair};
