use crate::store::{LinearStore, SqliteList, StateStore, StoreError};

pub const STACK_LIST_NAME: &str = "folder_stack";
pub const STACK_HEADER: &str = "The script will process these folders soon";

const OPEN_MARKER: &str = "> ";

/// One record of the folder stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StackEntry {
    /// Child listed by its parent and not walked yet.
    Staged(String),
    /// Folder whose subtree is being walked. Stored as `"> <id>"`.
    Open(String),
}

impl StackEntry {
    fn decode(value: String) -> Self {
        match value.strip_prefix(OPEN_MARKER) {
            Some(id) => Self::Open(id.to_string()),
            None => Self::Staged(value),
        }
    }

    fn encode(&self) -> String {
        match self {
            Self::Staged(id) => id.clone(),
            Self::Open(id) => format!("{OPEN_MARKER}{id}"),
        }
    }

    pub fn folder_id(&self) -> &str {
        match self {
            Self::Staged(id) | Self::Open(id) => id,
        }
    }
}

/// Durable record of the walk below the top-level folder in flight: one open
/// frame per folder on the current path, each followed by the children it
/// staged and has not walked yet. Empty between top-level folders.
pub struct FolderStack<S> {
    store: S,
}

impl FolderStack<SqliteList> {
    pub async fn open(state: &StateStore) -> Result<Self, StoreError> {
        Ok(Self::new(state.ensure_list(STACK_LIST_NAME, STACK_HEADER).await?))
    }
}

impl<S: LinearStore> FolderStack<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Stages a child folder.
    pub async fn push(&self, folder_id: &str) -> Result<(), StoreError> {
        self.store.append(folder_id).await
    }

    pub async fn open_frame(&self, folder_id: &str) -> Result<(), StoreError> {
        self.store.append(&StackEntry::Open(folder_id.to_string()).encode()).await
    }

    /// Turns the staged top into an open frame in a single write.
    pub async fn mark_open(&self, folder_id: &str) -> Result<bool, StoreError> {
        self.replace_top(StackEntry::Open(folder_id.to_string())).await
    }

    /// Turns an open top frame back into a staged entry.
    pub async fn mark_staged(&self, folder_id: &str) -> Result<bool, StoreError> {
        self.replace_top(StackEntry::Staged(folder_id.to_string())).await
    }

    pub async fn peek_entry(&self) -> Result<Option<StackEntry>, StoreError> {
        Ok(self.store.tail_value().await?.map(StackEntry::decode))
    }

    pub async fn pop(&self) -> Result<Option<StackEntry>, StoreError> {
        Ok(self.store.remove_tail().await?.map(StackEntry::decode))
    }

    /// Innermost folder still being walked.
    pub async fn innermost_frame(&self) -> Result<Option<String>, StoreError> {
        Ok(self
            .decoded()
            .await?
            .into_iter()
            .rev()
            .find_map(|entry| match entry {
                StackEntry::Open(id) => Some(id),
                StackEntry::Staged(_) => None,
            }))
    }

    pub async fn open_frames(&self) -> Result<usize, StoreError> {
        Ok(self
            .decoded()
            .await?
            .iter()
            .filter(|entry| matches!(entry, StackEntry::Open(_)))
            .count())
    }

    /// Pops staged entries down to the innermost open frame.
    pub async fn discard_staged(&self) -> Result<usize, StoreError> {
        let mut discarded = 0;
        while let Some(StackEntry::Staged(_)) = self.peek_entry().await? {
            self.store.remove_tail().await?;
            discarded += 1;
        }
        Ok(discarded)
    }

    pub async fn is_empty(&self) -> Result<bool, StoreError> {
        self.store.is_empty_at_tail().await
    }

    pub async fn len(&self) -> Result<usize, StoreError> {
        self.store.len().await
    }

    /// Records as stored, bottom first.
    pub async fn entries(&self) -> Result<Vec<String>, StoreError> {
        self.store.values().await
    }

    async fn replace_top(&self, entry: StackEntry) -> Result<bool, StoreError> {
        self.store.replace_tail(&entry.encode()).await
    }

    async fn decoded(&self) -> Result<Vec<StackEntry>, StoreError> {
        Ok(self
            .store
            .values()
            .await?
            .into_iter()
            .map(StackEntry::decode)
            .collect())
    }
}
