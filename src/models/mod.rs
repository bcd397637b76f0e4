pub mod project;
pub mod response;
pub mod security_event;
pub mod user;
