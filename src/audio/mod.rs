pub mod controller;
pub mod output;
pub mod queue;

pub use controller::{PlaybackController, PlaybackNotifier, PlaybackState};
pub use output::{AudioOutput, DecodeOptions, SongbirdOutput};
pub use queue::{Track, TrackQueue};
