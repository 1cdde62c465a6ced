pub(crate) mod capture_loop;
pub(crate) mod state_cell;
pub mod streamer;
