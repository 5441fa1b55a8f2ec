pub const TICK_MS: u64 = 150;
pub const ARENA_WIDTH: i32 = 32;
pub const ARENA_HEIGHT: i32 = 32;
pub const PLAYER_TIMEOUT_SECS: u64 = 5 * 60;
pub const REAP_INTERVAL_SECS: u64 = 10;
pub const READ_TIMEOUT_SECS: u64 = 240;
pub const STARTING_LENGTH: usize = 1;
pub const MAX_SPAWN_ATTEMPTS: usize = 32;
pub const TOKEN_LENGTH: usize = 5;
