use std::io::{self, Write};

use serde::Serialize;

/// One of the two continuations of a [`BranchingWriter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum WritePath {
    /// The accept path.
    Trunk,
    /// The reject path.
    Branch,
}

/// A sink with a shared prefix and two mutually exclusive continuations.
///
/// Text written as *common* goes to both continuations; *trunk* and *branch*
/// text goes to one each. Nothing reaches the underlying sink until one
/// continuation is committed, at which point it is written in order and both
/// buffers are released. Later commits and writes are ignored.
#[derive(Debug)]
pub struct BranchingWriter<W> {
    sink: W,
    trunk: String,
    branch: String,
    committed: Option<WritePath>,
}

impl<W: Write> BranchingWriter<W> {
    /// Buffer output for `sink`.
    pub fn new(sink: W) -> Self {
        Self {
            sink,
            trunk: String::new(),
            branch: String::new(),
            committed: None,
        }
    }

    /// Append to both continuations.
    pub fn write_common(&mut self, text: &str) {
        if self.committed.is_none() {
            self.trunk.push_str(text);
            self.branch.push_str(text);
        }
    }

    /// Append to the accept continuation only.
    pub fn write_trunk(&mut self, text: &str) {
        if self.committed.is_none() {
            self.trunk.push_str(text);
        }
    }

    /// Append to the reject continuation only.
    pub fn write_branch(&mut self, text: &str) {
        if self.committed.is_none() {
            self.branch.push_str(text);
        }
    }

    /// Write the accept continuation to the sink.
    pub fn commit_trunk(&mut self) -> io::Result<()> {
        self.commit(WritePath::Trunk)
    }

    /// Write the reject continuation to the sink.
    pub fn commit_branch(&mut self) -> io::Result<()> {
        self.commit(WritePath::Branch)
    }

    /// Write the chosen continuation to the sink, once.
    pub fn commit(&mut self, path: WritePath) -> io::Result<()> {
        if self.committed.is_some() {
            return Ok(());
        }
        self.committed = Some(path);
        let chosen = match path {
            WritePath::Trunk => std::mem::take(&mut self.trunk),
            WritePath::Branch => std::mem::take(&mut self.branch),
        };
        self.trunk = String::new();
        self.branch = String::new();
        self.sink.write_all(chosen.as_bytes())?;
        self.sink.flush()
    }

    /// Whether a continuation has been committed.
    pub fn is_committed(&self) -> bool {
        self.committed.is_some()
    }

    /// The committed continuation, if any.
    pub fn committed_path(&self) -> Option<WritePath> {
        self.committed
    }

    /// Pending text of a continuation; empty after a commit.
    pub fn pending(&self, path: WritePath) -> &str {
        match path {
            WritePath::Trunk => &self.trunk,
            WritePath::Branch => &self.branch,
        }
    }

    /// Recover the sink. Uncommitted text is discarded.
    pub fn into_inner(self) -> W {
        self.sink
    }
}
