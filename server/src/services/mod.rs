// marketplace_server/src/services/mod.rs

pub mod notifications;
