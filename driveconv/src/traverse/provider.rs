use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("api error: {0}")]
    Api(#[from] driveconv_core::DriveError),
    #[error("{0} is a folder, expected a file")]
    NotAFile(String),
}

impl ProviderError {
    /// Failure tied to one folder or file; the walk skips it and moves on.
    pub fn is_item_error(&self) -> bool {
        match self {
            ProviderError::Api(err) => err.is_item_error(),
            ProviderError::NotAFile(_) => true,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("provider error: {0}")]
    Provider(#[from] ProviderError),
    #[error("api error: {0}")]
    Api(#[from] driveconv_core::DriveError),
    #[error("file {0} has no parent folder")]
    MissingParent(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Folder {
    pub id: String,
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriveFile {
    pub id: String,
    pub name: String,
    pub mime_type: String,
    pub trashed: bool,
    pub parent: Option<String>,
    pub url: String,
}

impl DriveFile {
    /// Name with the text after the final period removed, or the whole name
    /// when it has no period.
    pub fn base_name(&self) -> &str {
        match self.name.rfind('.') {
            Some(dot) => &self.name[..dot],
            None => &self.name,
        }
    }
}

/// Remote folder tree the traversal walks.
#[allow(async_fn_in_trait)]
pub trait DriveTree {
    /// `Ok(None)` when the folder does not exist or is not accessible.
    async fn get_folder(&self, id: &str) -> Result<Option<Folder>, ProviderError>;

    async fn list_files(&self, folder: &Folder) -> Result<Vec<DriveFile>, ProviderError>;

    /// Direct subfolders in the provider's enumeration order.
    async fn list_subfolders(&self, folder: &Folder) -> Result<Vec<Folder>, ProviderError>;

    async fn get_file(&self, id: &str) -> Result<DriveFile, ProviderError>;

    async fn download(&self, file: &DriveFile) -> Result<Vec<u8>, ProviderError>;

    async fn move_file(&self, file: &DriveFile, new_parent: &str)
    -> Result<DriveFile, ProviderError>;

    async fn rename_file(&self, file: &DriveFile, new_name: &str)
    -> Result<DriveFile, ProviderError>;
}

/// Turns a legacy binary document into the service's native format.
#[allow(async_fn_in_trait)]
pub trait Converter {
    async fn convert(&self, file: &DriveFile) -> Result<DriveFile, ConvertError>;
}
