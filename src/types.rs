pub mod notification;
pub mod push;
pub mod role;
