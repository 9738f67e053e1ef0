pub mod email;
pub mod event;
pub mod timestamp;
