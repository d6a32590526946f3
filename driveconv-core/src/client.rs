use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

const DEFAULT_API_BASE_URL: &str = "https://www.googleapis.com";
const DEFAULT_UPLOAD_BASE_URL: &str = "https://www.googleapis.com";
const ITEM_FIELDS: &str = "id,name,mimeType,trashed,parents,webViewLink";

pub const FOLDER_MIME_TYPE: &str = "application/vnd.google-apps.folder";

#[derive(Debug, Error)]
pub enum DriveError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
    #[error("api returned {status}: {body}")]
    Api { status: StatusCode, body: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiErrorClass {
    Auth,
    Forbidden,
    NotFound,
    RateLimit,
    Transient,
    Permanent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChildKind {
    Files,
    Folders,
}

#[derive(Clone)]
pub struct DriveClient {
    http: Client,
    api_base: Url,
    upload_base: Url,
    token: String,
}

impl DriveClient {
    pub fn new(token: impl Into<String>) -> Result<Self, DriveError> {
        Self::with_base_urls(DEFAULT_API_BASE_URL, DEFAULT_UPLOAD_BASE_URL, token)
    }

    pub fn with_base_url(base_url: &str, token: impl Into<String>) -> Result<Self, DriveError> {
        Self::with_base_urls(base_url, base_url, token)
    }

    pub fn with_base_urls(
        api_base: &str,
        upload_base: &str,
        token: impl Into<String>,
    ) -> Result<Self, DriveError> {
        Ok(Self {
            http: Client::new(),
            api_base: Url::parse(api_base)?,
            upload_base: Url::parse(upload_base)?,
            token: token.into(),
        })
    }

    pub async fn get_item(&self, id: &str) -> Result<DriveItem, DriveError> {
        let mut url = self.file_endpoint(id)?;
        url.query_pairs_mut()
            .append_pair("fields", ITEM_FIELDS)
            .append_pair("supportsAllDrives", "true");
        let response = self
            .http
            .get(url)
            .header("Authorization", self.auth_header_value())
            .send()
            .await?;
        Self::handle_response(response).await
    }

    pub async fn list_children(
        &self,
        parent_id: &str,
        kind: ChildKind,
        page_size: u32,
        page_token: Option<&str>,
    ) -> Result<FileList, DriveError> {
        let mut url = self.api_base.join("/drive/v3/files")?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("q", &children_query(parent_id, kind));
            query.append_pair("fields", &format!("nextPageToken,files({ITEM_FIELDS})"));
            query.append_pair("pageSize", &page_size.max(1).to_string());
            query.append_pair("orderBy", "folder,name");
            query.append_pair("supportsAllDrives", "true");
            query.append_pair("includeItemsFromAllDrives", "true");
            if let Some(token) = page_token {
                query.append_pair("pageToken", token);
            }
        }
        let response = self
            .http
            .get(url)
            .header("Authorization", self.auth_header_value())
            .send()
            .await?;
        Self::handle_response(response).await
    }

    pub async fn list_children_all(
        &self,
        parent_id: &str,
        kind: ChildKind,
        page_size: u32,
    ) -> Result<Vec<DriveItem>, DriveError> {
        let mut items = Vec::new();
        let mut page_token: Option<String> = None;
        loop {
            let page = self
                .list_children(parent_id, kind, page_size, page_token.as_deref())
                .await?;
            items.extend(page.files);
            match page.next_page_token {
                Some(next) if !next.is_empty() => page_token = Some(next),
                _ => break,
            }
        }
        Ok(items)
    }

    pub async fn download(&self, id: &str) -> Result<Vec<u8>, DriveError> {
        let mut url = self.file_endpoint(id)?;
        url.query_pairs_mut()
            .append_pair("alt", "media")
            .append_pair("supportsAllDrives", "true");
        let response = self
            .http
            .get(url)
            .header("Authorization", self.auth_header_value())
            .send()
            .await?;
        if response.status().is_success() {
            Ok(response.bytes().await?.to_vec())
        } else {
            Err(Self::api_error(response).await)
        }
    }

    pub async fn move_item(
        &self,
        id: &str,
        new_parent: &str,
        old_parents: &[String],
    ) -> Result<DriveItem, DriveError> {
        let mut url = self.file_endpoint(id)?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("addParents", new_parent);
            if !old_parents.is_empty() {
                query.append_pair("removeParents", &old_parents.join(","));
            }
            query.append_pair("fields", ITEM_FIELDS);
            query.append_pair("supportsAllDrives", "true");
        }
        let response = self
            .http
            .patch(url)
            .header("Authorization", self.auth_header_value())
            .json(&serde_json::json!({}))
            .send()
            .await?;
        Self::handle_response(response).await
    }

    pub async fn rename_item(&self, id: &str, name: &str) -> Result<DriveItem, DriveError> {
        let mut url = self.file_endpoint(id)?;
        url.query_pairs_mut()
            .append_pair("fields", ITEM_FIELDS)
            .append_pair("supportsAllDrives", "true");
        let response = self
            .http
            .patch(url)
            .header("Authorization", self.auth_header_value())
            .json(&RenameBody { name })
            .send()
            .await?;
        Self::handle_response(response).await
    }

    /// Uploads raw bytes and asks the service to convert them into its native
    /// document format. The created file lands in the root folder.
    pub async fn upload_converted(
        &self,
        bytes: Vec<u8>,
        mime_type: &str,
    ) -> Result<UploadedFile, DriveError> {
        let mut url = self.upload_base.join("/upload/drive/v2/files")?;
        url.query_pairs_mut()
            .append_pair("uploadType", "media")
            .append_pair("convert", "true");
        let response = self
            .http
            .post(url)
            .header("Authorization", self.auth_header_value())
            .header("Content-Type", mime_type)
            .body(bytes)
            .send()
            .await?;
        Self::handle_response(response).await
    }

    fn auth_header_value(&self) -> String {
        format!("Bearer {}", self.token)
    }

    fn file_endpoint(&self, id: &str) -> Result<Url, DriveError> {
        let mut url = self.api_base.join("/drive/v3/files/")?;
        url.path_segments_mut()
            .map_err(|_| url::ParseError::RelativeUrlWithCannotBeABaseBase)?
            .pop_if_empty()
            .push(id);
        Ok(url)
    }

    async fn handle_response<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, DriveError> {
        if response.status().is_success() {
            Ok(response.json::<T>().await?)
        } else {
            Err(Self::api_error(response).await)
        }
    }

    async fn api_error(response: reqwest::Response) -> DriveError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        DriveError::Api { status, body }
    }
}

impl DriveError {
    pub fn classification(&self) -> Option<ApiErrorClass> {
        match self {
            DriveError::Api { status, body } => Some(classify_api_error(*status, body)),
            _ => None,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(
            self.classification(),
            Some(ApiErrorClass::RateLimit | ApiErrorClass::Transient)
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self.classification(), Some(ApiErrorClass::NotFound))
    }

    /// The request failed because of the item itself (missing, not shared with
    /// the caller, malformed id). Retrying the same request will not help, but
    /// other items are unaffected.
    pub fn is_item_error(&self) -> bool {
        matches!(
            self.classification(),
            Some(ApiErrorClass::NotFound | ApiErrorClass::Forbidden | ApiErrorClass::Permanent)
        )
    }
}

fn classify_api_error(status: StatusCode, body: &str) -> ApiErrorClass {
    if status == StatusCode::FORBIDDEN {
        // Drive reports quota exhaustion as 403 with a rate limit reason.
        if body.to_ascii_lowercase().contains("ratelimitexceeded") {
            ApiErrorClass::RateLimit
        } else {
            ApiErrorClass::Forbidden
        }
    } else if status == StatusCode::UNAUTHORIZED {
        ApiErrorClass::Auth
    } else if matches!(status, StatusCode::NOT_FOUND | StatusCode::GONE) {
        ApiErrorClass::NotFound
    } else if status == StatusCode::TOO_MANY_REQUESTS {
        ApiErrorClass::RateLimit
    } else if status.is_server_error()
        || matches!(
            status,
            StatusCode::REQUEST_TIMEOUT | StatusCode::CONFLICT | StatusCode::TOO_EARLY
        )
    {
        ApiErrorClass::Transient
    } else {
        ApiErrorClass::Permanent
    }
}

fn children_query(parent_id: &str, kind: ChildKind) -> String {
    let parent = parent_id.replace('\\', "\\\\").replace('\'', "\\'");
    match kind {
        ChildKind::Files => {
            format!("'{parent}' in parents and mimeType != '{FOLDER_MIME_TYPE}'")
        }
        ChildKind::Folders => format!(
            "'{parent}' in parents and mimeType = '{FOLDER_MIME_TYPE}' and trashed = false"
        ),
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DriveItem {
    pub id: String,
    pub name: String,
    pub mime_type: String,
    #[serde(default)]
    pub trashed: bool,
    #[serde(default)]
    pub parents: Vec<String>,
    #[serde(default)]
    pub web_view_link: Option<String>,
}

impl DriveItem {
    pub fn is_folder(&self) -> bool {
        self.mime_type == FOLDER_MIME_TYPE
    }
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileList {
    #[serde(default)]
    pub files: Vec<DriveItem>,
    #[serde(default)]
    pub next_page_token: Option<String>,
}

/// Response of the v2 upload endpoint; only the id is relied upon.
#[derive(Debug, Deserialize, Serialize)]
pub struct UploadedFile {
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Serialize)]
struct RenameBody<'a> {
    name: &'a str,
}
