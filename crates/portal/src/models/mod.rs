//! Domain models for the portal.

pub mod ambassador;
pub mod program;
pub mod session;
pub mod zone;

pub use ambassador::{
    Ambassador, AmbassadorFilter, AmbassadorLookup, AmbassadorPatch, HeadLink, NewAmbassador,
};
pub use program::{
    AssignmentScope, NewSubmission, NewTask, NewTaskAssignment, Review, Submission,
    SubmissionScope, Task, TaskAssignment, TaskPatch,
};
pub use session::{CurrentUser, keys as session_keys};
pub use zone::{NewZone, Zone, ZoneFilter, ZonePatch, clean_pin_prefixes};
