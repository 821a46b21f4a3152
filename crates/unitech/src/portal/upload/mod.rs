//! Upload view: the single screen of the portal.
//!
//! The view owns five independent state slots (selected file, uploading flag,
//! progress, download link and file listing) and only changes them through its
//! operations. Remote failures are returned to the caller and never recorded
//! in the view state.

mod render;
pub mod selection;
pub mod view;


pub use render::PROGRESS_WIDTH;
pub use selection::{destination_key, FileSelection, SelectedFile, UploadTask};
pub use view::{UploadView, UploadViewError, UploadViewState};
