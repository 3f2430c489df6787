pub mod conversation;
pub mod group;
pub mod message;
pub mod notification;
pub mod session;
pub mod user;
