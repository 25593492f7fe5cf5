use serde::{Deserialize, Serialize};

use crate::models::{Collection, CollectionCounts, Course, Game, Profile, Score};

/// Records of all four collections travelling together: a local snapshot
/// on push, or a change set on pull.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityBatch {
    #[serde(default)]
    pub profiles: Vec<Profile>,
    #[serde(default)]
    pub courses: Vec<Course>,
    #[serde(default)]
    pub games: Vec<Game>,
    #[serde(default)]
    pub scores: Vec<Score>,
}

impl EntityBatch {
    pub fn len_of(&self, collection: Collection) -> usize {
        match collection {
            Collection::Profiles => self.profiles.len(),
            Collection::Courses => self.courses.len(),
            Collection::Games => self.games.len(),
            Collection::Scores => self.scores.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        Collection::ALL.iter().all(|c| self.len_of(*c) == 0)
    }

    pub fn counts(&self) -> CollectionCounts {
        CollectionCounts {
            profiles: self.profiles.len() as u64,
            courses: self.courses.len() as u64,
            games: self.games.len() as u64,
            scores: self.scores.len() as u64,
        }
    }
}
