use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::Notify;
use serde_json::{json, Value};

use crate::portal::api::{ApiError, ApiGateway, FetchRequest, PostRequest};
use crate::portal::session::Session;
use crate::portal::storage::{
    AccessLevel, DownloadLink, FileListing, GetOptions, ListOptions, ProgressSnapshot, PutOptions,
    StorageError, StorageGateway, StorageItem, UploadReceipt,
};
use crate::portal::upload::{FileSelection, UploadView};

/// Makes a listing and an application post wait for each other, so both only
/// finish when they are in flight at the same time.
#[derive(Default)]
pub(super) struct Rendezvous {
    list_started: Notify,
    posted: Notify,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum StorageCall {
    Put {
        key: String,
        content_type: Option<String>,
        level: AccessLevel,
        size: usize,
    },
    Get {
        key: String,
        level: AccessLevel,
    },
    List {
        prefix: String,
        level: AccessLevel,
    },
}

/// Storage fake that records every call and replays scripted progress.
///
/// Each put pops one progress script: the `loaded` values reported against the
/// size of the uploaded data.
#[derive(Default)]
pub(super) struct RecordingStorage {
    calls: Mutex<Vec<StorageCall>>,
    progress_scripts: Mutex<VecDeque<Vec<u64>>>,
    listing: Mutex<FileListing>,
    reject_put: bool,
    reject_list: AtomicBool,
    reject_get: AtomicBool,
    rendezvous: Option<Arc<Rendezvous>>,
}

impl RecordingStorage {
    pub(super) fn with_progress(scripts: Vec<Vec<u64>>) -> Self {
        Self {
            progress_scripts: Mutex::new(scripts.into()),
            ..Self::default()
        }
    }

    pub(super) fn rejecting_puts() -> Self {
        Self {
            reject_put: true,
            ..Self::default()
        }
    }

    pub(super) fn meeting(rendezvous: Arc<Rendezvous>) -> Self {
        Self {
            rendezvous: Some(rendezvous),
            ..Self::default()
        }
    }

    pub(super) fn reject_lists(&self, reject: bool) {
        self.reject_list.store(reject, Ordering::SeqCst);
    }

    pub(super) fn reject_gets(&self, reject: bool) {
        self.reject_get.store(reject, Ordering::SeqCst);
    }

    pub(super) fn with_listing(keys: &[&str]) -> Self {
        Self {
            listing: Mutex::new(keys.iter().map(|key| StorageItem::new(*key)).collect()),
            ..Self::default()
        }
    }

    pub(super) fn calls(&self) -> Vec<StorageCall> {
        self.calls.lock().expect("storage mutex poisoned").clone()
    }

    pub(super) fn set_listing(&self, keys: &[&str]) {
        *self.listing.lock().expect("storage mutex poisoned") =
            keys.iter().map(|key| StorageItem::new(*key)).collect();
    }

    fn record(&self, call: StorageCall) {
        self.calls.lock().expect("storage mutex poisoned").push(call);
    }
}

#[async_trait]
impl StorageGateway for RecordingStorage {
    async fn put(
        &self,
        key: &str,
        data: Vec<u8>,
        options: PutOptions,
    ) -> Result<UploadReceipt, StorageError> {
        self.record(StorageCall::Put {
            key: key.to_string(),
            content_type: options.content_type.clone(),
            level: options.level,
            size: data.len(),
        });

        let script = self
            .progress_scripts
            .lock()
            .expect("storage mutex poisoned")
            .pop_front()
            .unwrap_or_default();
        if let Some(callback) = &options.progress {
            let total = data.len() as u64;
            for loaded in script {
                callback(ProgressSnapshot::new(loaded, total));
            }
        }

        if self.reject_put {
            return Err(StorageError::Backend("access denied".to_string()));
        }
        Ok(UploadReceipt {
            key: key.to_string(),
        })
    }

    async fn get(&self, key: &str, options: GetOptions) -> Result<DownloadLink, StorageError> {
        self.record(StorageCall::Get {
            key: key.to_string(),
            level: options.level,
        });
        if self.reject_get.load(Ordering::SeqCst) {
            return Err(StorageError::Backend("not found".to_string()));
        }
        Ok(DownloadLink {
            url: format!("https://storage.example.test/private/{key}?signature=abc"),
            expires_at: None,
        })
    }

    async fn list(&self, prefix: &str, options: ListOptions) -> Result<FileListing, StorageError> {
        self.record(StorageCall::List {
            prefix: prefix.to_string(),
            level: options.level,
        });
        if let Some(rendezvous) = &self.rendezvous {
            rendezvous.list_started.notify_one();
            rendezvous.posted.notified().await;
        }
        if self.reject_list.load(Ordering::SeqCst) {
            return Err(StorageError::Backend("network unreachable".to_string()));
        }
        Ok(self.listing.lock().expect("storage mutex poisoned").clone())
    }
}

/// API fake recording posted requests.
#[derive(Default)]
pub(super) struct RecordingApi {
    posts: Mutex<Vec<PostRequest>>,
    fetches: Mutex<Vec<FetchRequest>>,
    reject: bool,
    rendezvous: Option<Arc<Rendezvous>>,
}

impl RecordingApi {
    pub(super) fn meeting(rendezvous: Arc<Rendezvous>) -> Self {
        Self {
            rendezvous: Some(rendezvous),
            ..Self::default()
        }
    }

    pub(super) fn rejecting() -> Self {
        Self {
            reject: true,
            ..Self::default()
        }
    }

    pub(super) fn posts(&self) -> Vec<PostRequest> {
        self.posts.lock().expect("api mutex poisoned").clone()
    }

    pub(super) fn fetches(&self) -> Vec<FetchRequest> {
        self.fetches.lock().expect("api mutex poisoned").clone()
    }
}

#[async_trait]
impl ApiGateway for RecordingApi {
    async fn fetch_data(&self, request: FetchRequest) -> Result<Value, ApiError> {
        self.fetches
            .lock()
            .expect("api mutex poisoned")
            .push(request);
        Ok(json!({ "status": "ok" }))
    }

    async fn post_data(&self, request: PostRequest) -> Result<Value, ApiError> {
        self.posts.lock().expect("api mutex poisoned").push(request);
        if let Some(rendezvous) = &self.rendezvous {
            rendezvous.list_started.notified().await;
            rendezvous.posted.notify_one();
        }
        if self.reject {
            return Err(ApiError::Status {
                status: 500,
                body: "{\"message\": \"Could not add application\"}".to_string(),
            });
        }
        Ok(json!({ "message": "Created the application" }))
    }
}

pub(super) fn alice() -> Session {
    Session::new("alice").with_identity("us-east-1:alice")
}

pub(super) fn resume() -> FileSelection {
    FileSelection::new("resume.pdf", "application/pdf", vec![7u8; 1024])
}

pub(super) fn build_view(
    storage: RecordingStorage,
    api: RecordingApi,
) -> (
    UploadView<RecordingStorage, RecordingApi>,
    Arc<RecordingStorage>,
    Arc<RecordingApi>,
) {
    let storage = Arc::new(storage);
    let api = Arc::new(api);
    let view = UploadView::new(alice(), storage.clone(), api.clone());
    (view, storage, api)
}
