pub mod db;
pub mod farming;
pub mod notifications;
pub mod predictions;
pub mod server;
