pub mod driver;
pub mod interchange;
pub mod resolver;
pub mod source;
pub mod watermark;
