use serde::Serialize;
use tracing::info;

use crate::store::{SqliteList, StateStore, StoreError};
use crate::traverse::queue::FolderQueue;
use crate::traverse::stack::FolderStack;

/// Queue and stack contents as stored, for `driveconv status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StateSnapshot {
    pub queued: Vec<String>,
    pub staged: Vec<String>,
}

/// Creates both lists with their header markers and enqueues every
/// non-blank locator. Locators are stored as given and resolved when the
/// traversal reaches them. Returns how many were enqueued.
pub async fn provision<I, L>(state: &StateStore, locators: I) -> Result<usize, StoreError>
where
    I: IntoIterator<Item = L>,
    L: AsRef<str>,
{
    let (queue, _stack) = open_lists(state).await?;
    let mut added = 0;
    for locator in locators {
        let locator = locator.as_ref().trim();
        if locator.is_empty() {
            continue;
        }
        queue.enqueue(locator).await?;
        added += 1;
    }
    info!(added, "provisioned folder queue");
    Ok(added)
}

pub async fn snapshot(state: &StateStore) -> Result<StateSnapshot, StoreError> {
    let (queue, stack) = open_lists(state).await?;
    Ok(StateSnapshot {
        queued: queue.entries().await?,
        staged: stack.entries().await?,
    })
}

async fn open_lists(
    state: &StateStore,
) -> Result<(FolderQueue<SqliteList>, FolderStack<SqliteList>), StoreError> {
    Ok((FolderQueue::open(state).await?, FolderStack::open(state).await?))
}
