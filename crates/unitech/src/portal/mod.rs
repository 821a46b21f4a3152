//! Client-side portal: the remote API and storage clients and the upload view
//! that wires them to user actions.

pub mod api;
pub mod provisioning;
pub mod session;
pub mod storage;
pub mod upload;

pub use api::{
    set_parameters, ApiClient, ApiError, ApiGateway, ApplicationRecord, FetchRequest,
    PostRequest, RequestParams, CREATE_APPLICATION_ENDPOINT, DEFAULT_API_NAME,
};
pub use session::Session;
pub use storage::{
    AccessLevel, DownloadLink, FileListing, GetOptions, ListOptions, ProgressCallback,
    ProgressSnapshot, PutOptions, StorageError, StorageGateway, StorageItem, UploadReceipt,
};
pub use upload::{FileSelection, UploadTask, UploadView, UploadViewError, UploadViewState};
