use tracing::warn;

use super::EngineError;
use super::locator::extract_folder_id;
use super::provider::{DriveTree, Folder};
use crate::store::{LinearStore, SqliteList, StateStore, StoreError};

pub const QUEUE_LIST_NAME: &str = "folder_queue";
pub const QUEUE_HEADER: &str = "Put folder URLs or IDs below this cell";

/// Folders still to be processed. The head is the folder in flight and is
/// only removed once everything derived from it has been recorded.
pub struct FolderQueue<S> {
    store: S,
}

/// Result of resolving the queue head.
#[derive(Debug)]
pub struct Resolved {
    pub folder: Option<Folder>,
    /// Queue entries dropped because they could not be resolved.
    pub dropped: usize,
}

#[derive(Debug)]
pub enum Head {
    Empty,
    Ready(Folder),
    Dropped(String),
}

impl FolderQueue<SqliteList> {
    pub async fn open(state: &StateStore) -> Result<Self, StoreError> {
        Ok(Self::new(state.ensure_list(QUEUE_LIST_NAME, QUEUE_HEADER).await?))
    }
}

impl<S: LinearStore> FolderQueue<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Duplicates are kept.
    pub async fn enqueue(&self, locator: &str) -> Result<(), StoreError> {
        self.store.append(locator).await
    }

    pub async fn push_to_front(&self, locator: &str) -> Result<(), StoreError> {
        self.store.insert_after_origin(locator).await
    }

    pub async fn is_empty(&self) -> Result<bool, StoreError> {
        self.store.is_empty_at_head().await
    }

    pub async fn peek(&self) -> Result<Option<String>, StoreError> {
        self.store.head_value().await
    }

    /// Resolves the head to a folder, dropping entries that point at folders
    /// which no longer exist or cannot be accessed.
    pub async fn next_folder<T: DriveTree>(&self, tree: &T) -> Result<Resolved, EngineError> {
        let mut dropped = 0;
        loop {
            match self.resolve_head(tree).await? {
                Head::Empty => {
                    return Ok(Resolved {
                        folder: None,
                        dropped,
                    });
                }
                Head::Ready(folder) => {
                    return Ok(Resolved {
                        folder: Some(folder),
                        dropped,
                    });
                }
                Head::Dropped(_) => dropped += 1,
            }
        }
    }

    /// Single resolution attempt; an unresolvable head is removed and reported
    /// as dropped without looking further down the queue.
    pub async fn resolve_head<T: DriveTree>(&self, tree: &T) -> Result<Head, EngineError> {
        let Some(locator) = self.peek().await? else {
            return Ok(Head::Empty);
        };
        let id = extract_folder_id(&locator);
        if !id.is_empty() {
            match tree.get_folder(id).await {
                Ok(Some(folder)) => return Ok(Head::Ready(folder)),
                Ok(None) => {}
                Err(err) if err.is_item_error() => {
                    warn!(locator = %locator, error = %err, "folder lookup failed");
                }
                Err(err) => return Err(err.into()),
            }
        }
        warn!(locator = %locator, "couldn't find folder, dropping it from the queue");
        self.store.remove_head().await?;
        Ok(Head::Dropped(locator))
    }

    /// Marks the head as done. Call only after the head's files and children
    /// have been fully recorded.
    pub async fn commit_done(&self) -> Result<Option<String>, StoreError> {
        self.store.remove_head().await
    }

    pub async fn len(&self) -> Result<usize, StoreError> {
        self.store.len().await
    }

    pub async fn entries(&self) -> Result<Vec<String>, StoreError> {
        self.store.values().await
    }
}
