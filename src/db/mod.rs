//! Domain records and the storage contract the engines run against.

pub mod enums;
pub mod memory;
pub mod models;
pub mod storage;
