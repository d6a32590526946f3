use driveconv_core::{ChildKind, DriveClient, DriveItem};
use tracing::{debug, warn};

use crate::traverse::provider::{
    ConvertError, Converter, DriveFile, DriveTree, Folder, ProviderError,
};

const DEFAULT_PAGE_SIZE: u32 = 100;

/// `DriveTree` over the Drive REST API.
#[derive(Clone)]
pub struct RemoteDrive {
    client: DriveClient,
    page_size: u32,
}

impl RemoteDrive {
    pub fn new(client: DriveClient) -> Self {
        Self {
            client,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn client(&self) -> &DriveClient {
        &self.client
    }
}

impl DriveTree for RemoteDrive {
    async fn get_folder(&self, id: &str) -> Result<Option<Folder>, ProviderError> {
        match self.client.get_item(id).await {
            Ok(item) if item.is_folder() => Ok(Some(folder_from_item(item))),
            Ok(item) => {
                warn!(id = %item.id, mime_type = %item.mime_type, "queued id is not a folder");
                Ok(None)
            }
            Err(err) if err.is_item_error() => {
                warn!(id, error = %err, "folder is missing or not accessible");
                Ok(None)
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn list_files(&self, folder: &Folder) -> Result<Vec<DriveFile>, ProviderError> {
        let items = self
            .client
            .list_children_all(&folder.id, ChildKind::Files, self.page_size)
            .await?;
        Ok(items.into_iter().map(file_from_item).collect())
    }

    async fn list_subfolders(&self, folder: &Folder) -> Result<Vec<Folder>, ProviderError> {
        let items = self
            .client
            .list_children_all(&folder.id, ChildKind::Folders, self.page_size)
            .await?;
        Ok(items.into_iter().map(folder_from_item).collect())
    }

    async fn get_file(&self, id: &str) -> Result<DriveFile, ProviderError> {
        let item = self.client.get_item(id).await?;
        if item.is_folder() {
            return Err(ProviderError::NotAFile(item.id));
        }
        Ok(file_from_item(item))
    }

    async fn download(&self, file: &DriveFile) -> Result<Vec<u8>, ProviderError> {
        Ok(self.client.download(&file.id).await?)
    }

    async fn move_file(
        &self,
        file: &DriveFile,
        new_parent: &str,
    ) -> Result<DriveFile, ProviderError> {
        let old_parents: Vec<String> = file.parent.iter().cloned().collect();
        let item = self
            .client
            .move_item(&file.id, new_parent, &old_parents)
            .await?;
        Ok(file_from_item(item))
    }

    async fn rename_file(
        &self,
        file: &DriveFile,
        new_name: &str,
    ) -> Result<DriveFile, ProviderError> {
        let item = self.client.rename_item(&file.id, new_name).await?;
        Ok(file_from_item(item))
    }
}

/// Converts by uploading the original bytes to the converting upload
/// endpoint, then moving the result next to the original and giving it the
/// original's name without extension.
#[derive(Clone)]
pub struct UploadConverter {
    drive: RemoteDrive,
}

impl UploadConverter {
    pub fn new(drive: RemoteDrive) -> Self {
        Self { drive }
    }
}

impl Converter for UploadConverter {
    async fn convert(&self, file: &DriveFile) -> Result<DriveFile, ConvertError> {
        let parent = file
            .parent
            .clone()
            .ok_or_else(|| ConvertError::MissingParent(file.id.clone()))?;
        let bytes = self.drive.download(file).await?;
        debug!(file = %file.name, bytes = bytes.len(), "uploading for conversion");
        let uploaded = self
            .drive
            .client()
            .upload_converted(bytes, &file.mime_type)
            .await?;
        let created = self.drive.get_file(&uploaded.id).await?;
        let moved = self.drive.move_file(&created, &parent).await?;
        let renamed = self.drive.rename_file(&moved, file.base_name()).await?;
        Ok(renamed)
    }
}

fn folder_from_item(item: DriveItem) -> Folder {
    let url = item
        .web_view_link
        .unwrap_or_else(|| format!("https://drive.google.com/drive/folders/{}", item.id));
    Folder {
        id: item.id,
        name: item.name,
        url,
    }
}

fn file_from_item(item: DriveItem) -> DriveFile {
    let url = item
        .web_view_link
        .unwrap_or_else(|| format!("https://drive.google.com/file/d/{}/view", item.id));
    DriveFile {
        parent: item.parents.into_iter().next(),
        id: item.id,
        name: item.name,
        mime_type: item.mime_type,
        trashed: item.trashed,
        url,
    }
}
