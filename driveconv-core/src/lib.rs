mod client;
mod oauth;

pub use client::{
    ApiErrorClass, ChildKind, DriveClient, DriveError, DriveItem, FOLDER_MIME_TYPE, FileList,
    UploadedFile,
};
pub use oauth::{OAuthClient, OAuthError, OAuthToken};
