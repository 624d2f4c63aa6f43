pub mod models;
pub mod service;

pub use service::NotificationService;
