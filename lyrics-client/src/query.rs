use getset::Getters;

/// A song lookup as typed by the user
#[derive(Clone, Debug, PartialEq, Eq, Getters)]
#[get = "pub"]
pub struct LyricsQuery {
    song: String,
    artist: String,
}

impl LyricsQuery {
    pub fn new(song: impl Into<String>, artist: impl Into<String>) -> Self {
        Self {
            song: song.into(),
            artist: artist.into(),
        }
    }
}
