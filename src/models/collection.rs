use serde::{Deserialize, Serialize};

/// The four entity collections that take part in sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Collection {
    Profiles,
    Courses,
    Games,
    Scores,
}

impl Collection {
    pub const ALL: [Collection; 4] = [
        Collection::Profiles,
        Collection::Courses,
        Collection::Games,
        Collection::Scores,
    ];
}

/// A per-collection tally, used for push acknowledgements, pull results
/// and server-side record counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionCounts {
    #[serde(default)]
    pub profiles: u64,
    #[serde(default)]
    pub courses: u64,
    #[serde(default)]
    pub games: u64,
    #[serde(default)]
    pub scores: u64,
}

impl CollectionCounts {
    pub fn total(&self) -> u64 {
        self.profiles + self.courses + self.games + self.scores
    }
}
