use serde::{Deserialize, Serialize};

use crate::models::Collection;

/// Per-collection sync watermarks. The tokens are opaque and only ever
/// produced by the server. A missing entry means the collection has never
/// been synced and is left out of the wire form.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncCursors {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profiles: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub courses: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub games: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scores: Option<String>,
}

impl SyncCursors {
    pub fn get(&self, collection: Collection) -> Option<&str> {
        self.slot(collection).as_deref()
    }

    pub fn set(&mut self, collection: Collection, cursor: impl Into<String>) {
        *self.slot_mut(collection) = Some(cursor.into());
    }

    pub fn is_empty(&self) -> bool {
        Collection::ALL.iter().all(|c| self.slot(*c).is_none())
    }

    /// Applies the cursors reported by the server. Collections the server
    /// left out, or reported as null, keep their current watermark.
    pub fn advance(&mut self, server: &SyncCursors) {
        for collection in Collection::ALL {
            if let Some(cursor) = server.slot(collection) {
                *self.slot_mut(collection) = Some(cursor.clone());
            }
        }
    }

    fn slot(&self, collection: Collection) -> &Option<String> {
        match collection {
            Collection::Profiles => &self.profiles,
            Collection::Courses => &self.courses,
            Collection::Games => &self.games,
            Collection::Scores => &self.scores,
        }
    }

    fn slot_mut(&mut self, collection: Collection) -> &mut Option<String> {
        match collection {
            Collection::Profiles => &mut self.profiles,
            Collection::Courses => &mut self.courses,
            Collection::Games => &mut self.games,
            Collection::Scores => &mut self.scores,
        }
    }
}
