//! Checks batches of files and adds them to a pool.
//!
//! A batch is flattened into a list of definitions, then loaded in two passes over a copy of
//! the pool. The first pass declares every name, the second resolves imports and field types
//! against them. The copy replaces the pool only if no problem was found.

mod declare;
mod flatten;
mod link;
mod scope;

use std::sync::Arc;

use prost_types::FileDescriptorProto;

use crate::descriptor::{
    error::{Location, Problem},
    to_index, DescriptorError, DescriptorPool, FileIndex, Origin, PoolData,
};
use crate::ErrorKind;

use self::flatten::{flatten, Counts};

impl DescriptorPool {
    pub(super) fn load(&mut self, batch: Vec<FileDescriptorProto>) -> Result<(), DescriptorError> {
        let batch = self.data.unseen(batch);
        if batch.is_empty() {
            return Ok(());
        }

        let mut staged = PoolData::clone(&self.data);
        if let Err(err) = staged.load(&batch) {
            tracing::debug!(
                kind = %err.kind(),
                problems = err.len(),
                "rejected batch of files"
            );
            return Err(err);
        }

        tracing::debug!(
            files = batch.len(),
            messages = staged.messages.len() - self.data.messages.len(),
            enums = staged.enums.len() - self.data.enums.len(),
            "added files to descriptor pool"
        );
        self.data = Arc::new(staged);
        Ok(())
    }
}

impl PoolData {
    /// Drops files that are already in the pool with the same contents, and repeats within the
    /// batch. A different file reusing a known name is kept so that it gets reported.
    fn unseen(&self, batch: Vec<FileDescriptorProto>) -> Vec<FileDescriptorProto> {
        let mut unseen: Vec<FileDescriptorProto> = Vec::with_capacity(batch.len());
        for file in batch {
            let known = match self.file_lookup.get(file.name()) {
                Some(&index) => self.files[index as usize].proto == file,
                None => false,
            };
            if !known && !unseen.contains(&file) {
                unseen.push(file);
            }
        }
        unseen
    }

    fn load(&mut self, batch: &[FileDescriptorProto]) -> Result<(), DescriptorError> {
        let first_message = self.messages.len();
        let start = Counts {
            files: to_index(self.files.len()),
            messages: to_index(self.messages.len()),
            enums: to_index(self.enums.len()),
        };
        let nodes = flatten(batch, start);

        let mut problems = Vec::new();
        self.declare(&nodes, &mut problems);
        DescriptorError::take(&mut problems)?;
        self.link(&nodes, &mut problems);
        DescriptorError::take(&mut problems)?;
        self.check_map_entries(first_message, &mut problems);
        DescriptorError::take(&mut problems)
    }

    fn locate(&self, origin: Origin) -> Location {
        Location::new(&self.files[origin.file as usize].proto, origin.path)
    }

    fn duplicate_name(&self, name: &str, first: FileIndex, second: Origin) -> Problem {
        let message = if first == second.file {
            format!("name '{name}' is defined twice")
        } else {
            format!(
                "name '{}' is already defined in file '{}'",
                name,
                self.files[first as usize].proto.name()
            )
        };
        Problem::new(ErrorKind::DuplicateName, message).at(self.locate(second))
    }
}
