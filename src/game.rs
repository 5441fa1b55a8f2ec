pub mod color;
pub mod constants;
pub mod snake;
pub mod state;
pub mod types;
