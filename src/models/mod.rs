pub mod batch;
pub mod collection;
pub mod course;
pub mod cursors;
pub mod game;
pub mod profile;
pub mod score;

pub use batch::EntityBatch;
pub use collection::{Collection, CollectionCounts};
pub use course::{Course, NewCourseRequest, UpdateCourseRequest};
pub use cursors::SyncCursors;
pub use game::{CompleteGameRequest, Game, NewGameRequest};
pub use profile::{NewProfileRequest, Profile};
pub use score::{RecordScoreRequest, Score};
