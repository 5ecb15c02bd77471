pub mod song;
pub mod spotify;
