// marketplace_server/src/web/handlers/mod.rs

pub mod admin_handlers;
pub mod order_handlers;
pub mod vendor_handlers;
