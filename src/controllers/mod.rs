pub mod acoustid;
pub mod parser;
pub mod playlist;
pub mod session;
pub mod song;
pub mod spotify;

#[cfg(test)]
pub mod fakes;

pub use acoustid::AcoustIdController;
pub use playlist::PlaylistManager;
pub use session::{Request, SessionController};
pub use song::SongController;
pub use spotify::SpotifyController;
