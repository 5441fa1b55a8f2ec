pub mod names;
pub mod time;
pub mod tokens;
