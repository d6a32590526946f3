use tracing::{debug, error, info, warn};

use super::EngineError;
use super::locator::extract_folder_id;
use super::predicate::ConversionPredicate;
use super::provider::{Converter, DriveFile, DriveTree, Folder, ProviderError};
use super::queue::{FolderQueue, Head};
use super::stack::{FolderStack, StackEntry};
use crate::store::LinearStore;
use crate::trace::TraceRecorder;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// When false the traversal only records what it would convert.
    pub convert: bool,
    /// Record files that are not converted, not only conversions.
    pub record_all_files: bool,
    pub predicate: ConversionPredicate,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            convert: false,
            record_all_files: true,
            predicate: ConversionPredicate::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub folders: usize,
    pub files: usize,
    pub converted: usize,
    pub failed: usize,
    pub dropped: usize,
    /// Folders whose contents could not be listed.
    pub unreadable: usize,
    /// Stack records found when the run started.
    pub recovered: usize,
}

/// Pre-order walk over the remote tree driven entirely by the durable queue
/// and stack, so a killed run picks up where it stopped.
///
/// The queue head is the folder being expanded. Expanding it records its
/// files, stages its children on the stack and commits it (removes it from
/// the queue). The stack holds an open frame for every folder on the current
/// path; a staged child is moved to the queue front and turned into a frame
/// before it is expanded, and a frame is closed once nothing is staged above
/// it.
pub struct TraversalEngine<T, C, R, S> {
    tree: T,
    converter: C,
    trace: R,
    queue: FolderQueue<S>,
    stack: FolderStack<S>,
    config: EngineConfig,
    summary: RunSummary,
}

impl<T, C, R, S> TraversalEngine<T, C, R, S>
where
    T: DriveTree,
    C: Converter,
    R: TraceRecorder,
    S: LinearStore,
{
    pub fn new(
        tree: T,
        converter: C,
        trace: R,
        queue: FolderQueue<S>,
        stack: FolderStack<S>,
        config: EngineConfig,
    ) -> Self {
        Self {
            tree,
            converter,
            trace,
            queue,
            stack,
            config,
            summary: RunSummary::default(),
        }
    }

    pub fn trace(&self) -> &R {
        &self.trace
    }

    pub fn into_trace(self) -> R {
        self.trace
    }

    pub fn summary(&self) -> RunSummary {
        self.summary
    }

    pub fn queue(&self) -> &FolderQueue<S> {
        &self.queue
    }

    pub fn stack(&self) -> &FolderStack<S> {
        &self.stack
    }

    /// Drains the queue. Safe to call again after the process was killed at
    /// any point.
    pub async fn run(&mut self) -> Result<RunSummary, EngineError> {
        let recovered = self.recover().await?;
        if recovered > 0 {
            info!(recovered, "resuming the walk of an interrupted run");
        }
        while self.process_next().await? {}
        info!(
            folders = self.summary.folders,
            files = self.summary.files,
            converted = self.summary.converted,
            failed = self.summary.failed,
            dropped = self.summary.dropped,
            unreadable = self.summary.unreadable,
            "traversal finished"
        );
        Ok(self.summary)
    }

    /// Brings the stack left by an interrupted run into a state the walk can
    /// continue from. A frame whose folder is still the queue head was never
    /// committed: whatever it had staged is discarded and the folder is
    /// staged again, so it is expanded anew. Returns the number of stack
    /// records found.
    pub async fn recover(&mut self) -> Result<usize, EngineError> {
        let recovered = self.stack.len().await?;
        if recovered == 0 {
            return Ok(0);
        }
        let head = self.queue.peek().await?;
        if let Some(frame) = self.stack.innermost_frame().await?
            && head.as_deref().map(extract_folder_id) == Some(frame.as_str())
        {
            let discarded = self.stack.discard_staged().await?;
            debug!(folder = %frame, discarded, "expanding uncommitted folder again");
            self.stack.mark_staged(&frame).await?;
        }
        let depth = self.stack.open_frames().await?;
        self.trace.resume_at(depth)?;
        self.summary.recovered += recovered;
        Ok(recovered)
    }

    /// Walks the next top-level folder and its whole subtree, or finishes the
    /// subtree in flight. Returns false once queue and stack are both empty.
    pub async fn process_next(&mut self) -> Result<bool, EngineError> {
        if !self.step().await? {
            return Ok(false);
        }
        while !self.stack.is_empty().await? {
            self.step().await?;
        }
        Ok(true)
    }

    /// Advances the walk by one durable transition.
    async fn step(&mut self) -> Result<bool, EngineError> {
        match self.stack.peek_entry().await? {
            None => {
                let resolved = self.queue.next_folder(&self.tree).await?;
                self.summary.dropped += resolved.dropped;
                let Some(folder) = resolved.folder else {
                    return Ok(false);
                };
                self.stack.open_frame(&folder.id).await?;
                self.expand(folder).await?;
            }
            Some(StackEntry::Staged(child_id)) => {
                // Queue first, then stack. A kill in between leaves the child
                // at the queue head.
                let head = self.queue.peek().await?;
                if head.as_deref().map(extract_folder_id) != Some(child_id.as_str()) {
                    self.queue.push_to_front(&child_id).await?;
                }
                self.stack.mark_open(&child_id).await?;
                self.open_head().await?;
            }
            Some(StackEntry::Open(folder_id)) => {
                debug!(id = %folder_id, "leaving folder");
                self.stack.pop().await?;
                self.trace.exit_folder()?;
            }
        }
        Ok(true)
    }

    /// Expands the child just moved to the queue front. A child that vanished
    /// since it was listed is dropped without touching the entries behind it.
    async fn open_head(&mut self) -> Result<(), EngineError> {
        match self.queue.resolve_head(&self.tree).await? {
            Head::Ready(folder) => self.expand(folder).await,
            Head::Dropped(_) => {
                self.summary.dropped += 1;
                self.stack.pop().await?;
                Ok(())
            }
            Head::Empty => {
                self.stack.pop().await?;
                Ok(())
            }
        }
    }

    async fn expand(&mut self, folder: Folder) -> Result<(), EngineError> {
        debug!(folder = %folder.name, id = %folder.id, "entering folder");
        self.trace.enter_folder(&folder.name, &folder.url)?;
        self.summary.folders += 1;

        let files = match self.tree.list_files(&folder).await {
            Ok(files) => files,
            Err(err) if err.is_item_error() => return self.skip_unreadable(&folder, err).await,
            Err(err) => return Err(err.into()),
        };
        for file in &files {
            self.process_file(file).await?;
        }

        let children = match self.tree.list_subfolders(&folder).await {
            Ok(children) => children,
            Err(err) if err.is_item_error() => return self.skip_unreadable(&folder, err).await,
            Err(err) => return Err(err.into()),
        };
        // Reversed so that the stack top is the first child.
        for child in children.iter().rev() {
            self.stack.push(&child.id).await?;
        }

        self.queue.commit_done().await?;
        Ok(())
    }

    /// Records a folder whose contents cannot be listed and commits it
    /// without children.
    async fn skip_unreadable(
        &mut self,
        folder: &Folder,
        err: ProviderError,
    ) -> Result<(), EngineError> {
        warn!(
            folder = %folder.name,
            id = %folder.id,
            error = %err,
            "folder contents are not readable, skipping it"
        );
        self.summary.unreadable += 1;
        self.trace
            .record_failure(&folder.name, &folder.url, &err.to_string())?;
        self.queue.commit_done().await?;
        Ok(())
    }

    async fn process_file(&mut self, file: &DriveFile) -> Result<(), EngineError> {
        if file.trashed {
            debug!(file = %file.name, "skipping trashed file");
            return Ok(());
        }
        self.summary.files += 1;

        if !(self.config.convert && self.config.predicate.matches(&file.name)) {
            if self.config.record_all_files {
                self.trace.visit_file(&file.name, &file.url)?;
            }
            return Ok(());
        }

        match self.converter.convert(file).await {
            Ok(converted) => {
                info!(file = %file.name, converted = %converted.id, "converted file");
                self.summary.converted += 1;
                self.trace.record_conversion(
                    &file.name,
                    &file.url,
                    &converted.name,
                    &converted.url,
                )?;
            }
            Err(err) => {
                error!(file = %file.name, id = %file.id, error = %err, "conversion failed");
                self.summary.failed += 1;
                self.trace
                    .record_failure(&file.name, &file.url, &err.to_string())?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;
