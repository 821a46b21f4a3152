use std::sync::Arc;

use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use super::render;
use super::selection::{FileSelection, SelectedFile, UploadTask};
use crate::portal::api::{ApiError, ApiGateway, ApplicationRecord, PostRequest};
use crate::portal::session::Session;
use crate::portal::storage::{
    AccessLevel, DownloadLink, FileListing, GetOptions, ListOptions, ProgressCallback,
    ProgressSnapshot, PutOptions, StorageError, StorageGateway, UploadReceipt,
};

/// Error raised by a view operation. The view state never records it.
#[derive(Debug, thiserror::Error)]
pub enum UploadViewError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Point-in-time copy of the five view slots.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadViewState {
    pub file: Option<SelectedFile>,
    pub is_uploading: bool,
    pub progress: ProgressSnapshot,
    pub download_link: Option<DownloadLink>,
    pub listing: FileListing,
}

/// Controller behind the upload screen.
pub struct UploadView<S, A> {
    session: Session,
    storage: Arc<S>,
    api: Arc<A>,
    application: ApplicationRecord,
    mounted: bool,
    file: Option<FileSelection>,
    is_uploading: bool,
    progress: Arc<watch::Sender<ProgressSnapshot>>,
    download_link: Option<DownloadLink>,
    listing: FileListing,
}

impl<S, A> UploadView<S, A>
where
    S: StorageGateway + 'static,
    A: ApiGateway + 'static,
{
    pub fn new(session: Session, storage: Arc<S>, api: Arc<A>) -> Self {
        let (progress, _) = watch::channel(ProgressSnapshot::default());
        Self {
            session,
            storage,
            api,
            application: ApplicationRecord::demo(),
            mounted: false,
            file: None,
            is_uploading: false,
            progress: Arc::new(progress),
            download_link: None,
            listing: FileListing::new(),
        }
    }

    /// Replaces the application payload sent on mount.
    pub fn with_application(mut self, application: ApplicationRecord) -> Self {
        self.application = application;
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn selected_file(&self) -> Option<&FileSelection> {
        self.file.as_ref()
    }

    pub fn is_uploading(&self) -> bool {
        self.is_uploading
    }

    pub fn progress(&self) -> ProgressSnapshot {
        *self.progress.borrow()
    }

    pub fn download_link(&self) -> Option<&DownloadLink> {
        self.download_link.as_ref()
    }

    pub fn listing(&self) -> &FileListing {
        &self.listing
    }

    pub fn state(&self) -> UploadViewState {
        UploadViewState {
            file: self.file.as_ref().map(FileSelection::summary),
            is_uploading: self.is_uploading,
            progress: self.progress(),
            download_link: self.download_link.clone(),
            listing: self.listing.clone(),
        }
    }

    /// Progress updates for the current and future uploads.
    pub fn subscribe_progress(&self) -> watch::Receiver<ProgressSnapshot> {
        self.progress.subscribe()
    }

    /// Runs the mount-time effects once: lists the user's files and submits the
    /// configured application concurrently. The application outcome is only logged.
    pub async fn mount(&mut self) -> Result<(), UploadViewError> {
        if self.mounted {
            debug!("view already mounted");
            return Ok(());
        }
        self.mounted = true;

        let storage = self.storage.clone();
        let api = self.api.clone();
        let request = PostRequest::create_application(&self.application);

        let (listing, created) = tokio::join!(
            storage.list("", private_list()),
            async move {
                match request {
                    Ok(request) => api.post_data(request).await,
                    Err(err) => Err(err),
                }
            }
        );

        match created {
            Ok(response) => info!(%response, "application created"),
            Err(err) => warn!(error = %err, "application creation failed"),
        }

        self.listing = listing?;
        info!(files = self.listing.len(), "listing loaded");
        Ok(())
    }

    /// Lists the user's private files again, replacing the current listing.
    pub async fn refresh_listing(&mut self) -> Result<&FileListing, UploadViewError> {
        self.listing = self.storage.list("", private_list()).await?;
        Ok(&self.listing)
    }

    /// Only the file slot changes.
    pub fn select_file(&mut self, file: FileSelection) {
        debug!(name = %file.name, size = file.size(), "file selected");
        self.file = Some(file);
    }

    /// Uploads the selected file to `{username}/{file name}` in private storage.
    ///
    /// Returns `Ok(None)` when no file is selected. The uploading flag is cleared
    /// whether the put succeeds or fails.
    pub async fn upload(&mut self) -> Result<Option<UploadReceipt>, UploadViewError> {
        let Some(file) = self.file.as_ref() else {
            debug!("upload requested without a selected file");
            return Ok(None);
        };

        let UploadTask {
            file,
            content_type,
            destination_key,
        } = UploadTask::new(&self.session, file);

        self.is_uploading = true;
        self.progress
            .send_replace(ProgressSnapshot::new(0, file.size()));

        let options = PutOptions {
            content_type: Some(content_type),
            level: AccessLevel::Private,
            progress: Some(self.progress_callback()),
        };
        let result = self
            .storage
            .put(&destination_key, file.data, options)
            .await;
        self.is_uploading = false;

        match result {
            Ok(receipt) => {
                info!(key = %receipt.key, "upload finished");
                Ok(Some(receipt))
            }
            Err(err) => {
                warn!(key = %destination_key, error = %err, "upload failed");
                Err(err.into())
            }
        }
    }

    /// Resolves a temporary link for `key`. An empty key is ignored.
    pub async fn download(&mut self, key: &str) -> Result<Option<DownloadLink>, UploadViewError> {
        if key.is_empty() {
            return Ok(None);
        }

        let link = self
            .storage
            .get(
                key,
                GetOptions {
                    level: AccessLevel::Private,
                    expires_in: None,
                },
            )
            .await?;
        self.download_link = Some(link.clone());
        Ok(Some(link))
    }

    pub fn render(&self) -> String {
        render::render_view(
            &self.session,
            self.file.as_ref(),
            self.is_uploading.then(|| self.progress()),
            self.download_link.as_ref(),
            &self.listing,
        )
    }

    /// Tears the view down and hands the session back to the auth wrapper.
    pub fn sign_out(self) -> Session {
        info!(username = %self.session.username, "signing out");
        self.session
    }

    fn progress_callback(&self) -> ProgressCallback {
        let sender = self.progress.clone();
        Arc::new(move |snapshot: ProgressSnapshot| {
            sender.send_if_modified(|current| {
                if snapshot.loaded < current.loaded {
                    return false;
                }
                *current = snapshot;
                true
            });
        })
    }
}

fn private_list() -> ListOptions {
    ListOptions {
        level: AccessLevel::Private,
    }
}
