pub mod color;
pub mod encoding;
pub mod time;
