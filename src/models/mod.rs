pub mod server;
pub mod status;
pub mod user;
