use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use reqwest::StatusCode;
use sqlx::sqlite::SqlitePoolOptions;

use super::provider::{ConvertError, Converter, DriveFile, DriveTree, Folder, ProviderError};
use crate::store::StateStore;

pub(crate) async fn memory_state() -> StateStore {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    let store = StateStore::from_pool(pool);
    store.init().await.unwrap();
    store
}

fn api_error(status: StatusCode, body: &str) -> driveconv_core::DriveError {
    driveconv_core::DriveError::Api {
        status,
        body: body.to_string(),
    }
}

#[derive(Clone)]
struct FakeFolder {
    folder: Folder,
    parent: Option<String>,
}

/// In-memory folder tree. Children are listed in insertion order.
#[derive(Clone, Default)]
pub(crate) struct FakeTree {
    folders: Vec<FakeFolder>,
    files: Vec<DriveFile>,
    unavailable: HashSet<String>,
    vanished: HashSet<String>,
    forbidden: HashSet<String>,
    unlistable: HashSet<String>,
}

impl FakeTree {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn folder(mut self, id: &str, name: &str, parent: Option<&str>) -> Self {
        self.folders.push(FakeFolder {
            folder: Folder {
                id: id.to_string(),
                name: name.to_string(),
                url: format!("https://drive.example/folders/{id}"),
            },
            parent: parent.map(str::to_string),
        });
        self
    }

    pub(crate) fn file(self, id: &str, name: &str, parent: &str) -> Self {
        self.file_with(id, name, parent, false)
    }

    pub(crate) fn trashed_file(self, id: &str, name: &str, parent: &str) -> Self {
        self.file_with(id, name, parent, true)
    }

    fn file_with(mut self, id: &str, name: &str, parent: &str, trashed: bool) -> Self {
        self.files.push(DriveFile {
            id: id.to_string(),
            name: name.to_string(),
            mime_type: "application/octet-stream".to_string(),
            trashed,
            parent: Some(parent.to_string()),
            url: format!("https://drive.example/file/{id}"),
        });
        self
    }

    /// Resolving this folder fails as if the service were down.
    pub(crate) fn unavailable(mut self, id: &str) -> Self {
        self.unavailable.insert(id.to_string());
        self
    }

    /// Still listed by its parent but no longer resolvable.
    pub(crate) fn vanished(mut self, id: &str) -> Self {
        self.vanished.insert(id.to_string());
        self
    }

    /// Resolving this folder is refused for lack of permission.
    pub(crate) fn forbidden(mut self, id: &str) -> Self {
        self.forbidden.insert(id.to_string());
        self
    }

    /// Resolves, but listing its contents is refused.
    pub(crate) fn unlistable(mut self, id: &str) -> Self {
        self.unlistable.insert(id.to_string());
        self
    }

    fn check_listable(&self, folder: &Folder) -> Result<(), ProviderError> {
        if self.unlistable.contains(&folder.id) {
            return Err(api_error(StatusCode::FORBIDDEN, "insufficientFilePermissions").into());
        }
        Ok(())
    }

    pub(crate) fn healed(&self) -> Self {
        let mut tree = self.clone();
        tree.unavailable.clear();
        tree
    }
}

impl DriveTree for FakeTree {
    async fn get_folder(&self, id: &str) -> Result<Option<Folder>, ProviderError> {
        if self.unavailable.contains(id) {
            return Err(api_error(StatusCode::SERVICE_UNAVAILABLE, "backend unavailable").into());
        }
        if self.forbidden.contains(id) {
            return Err(api_error(StatusCode::FORBIDDEN, "insufficientFilePermissions").into());
        }
        if self.vanished.contains(id) {
            return Ok(None);
        }
        Ok(self
            .folders
            .iter()
            .find(|entry| entry.folder.id == id)
            .map(|entry| entry.folder.clone()))
    }

    async fn list_files(&self, folder: &Folder) -> Result<Vec<DriveFile>, ProviderError> {
        self.check_listable(folder)?;
        Ok(self
            .files
            .iter()
            .filter(|file| file.parent.as_deref() == Some(folder.id.as_str()))
            .cloned()
            .collect())
    }

    async fn list_subfolders(&self, folder: &Folder) -> Result<Vec<Folder>, ProviderError> {
        self.check_listable(folder)?;
        Ok(self
            .folders
            .iter()
            .filter(|entry| entry.parent.as_deref() == Some(folder.id.as_str()))
            .map(|entry| entry.folder.clone())
            .collect())
    }

    async fn get_file(&self, id: &str) -> Result<DriveFile, ProviderError> {
        self.files
            .iter()
            .find(|file| file.id == id)
            .cloned()
            .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "file not found").into())
    }

    async fn download(&self, file: &DriveFile) -> Result<Vec<u8>, ProviderError> {
        Ok(file.name.as_bytes().to_vec())
    }

    async fn move_file(
        &self,
        file: &DriveFile,
        new_parent: &str,
    ) -> Result<DriveFile, ProviderError> {
        let mut moved = file.clone();
        moved.parent = Some(new_parent.to_string());
        Ok(moved)
    }

    async fn rename_file(
        &self,
        file: &DriveFile,
        new_name: &str,
    ) -> Result<DriveFile, ProviderError> {
        let mut renamed = file.clone();
        renamed.name = new_name.to_string();
        Ok(renamed)
    }
}

/// Converter that records the names it was asked to convert.
#[derive(Clone, Default)]
pub(crate) struct FakeConverter {
    failing: HashSet<String>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl FakeConverter {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn failing_on(mut self, name: &str) -> Self {
        self.failing.insert(name.to_string());
        self
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl Converter for FakeConverter {
    async fn convert(&self, file: &DriveFile) -> Result<DriveFile, ConvertError> {
        self.calls.lock().unwrap().push(file.name.clone());
        if self.failing.contains(&file.name) {
            return Err(ProviderError::from(api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "conversion failed",
            ))
            .into());
        }
        Ok(DriveFile {
            id: format!("{}-converted", file.id),
            name: file.base_name().to_string(),
            mime_type: "application/vnd.google-apps.document".to_string(),
            trashed: false,
            parent: file.parent.clone(),
            url: format!("https://docs.example/{}-converted", file.id),
        })
    }
}
