//! Document and assembly traits with in-memory reference implementations.

use std::path::Path;

use anyhow::Context as _;

use crate::doc::model::PageContent;
use crate::foundation::error::{SpotMergeError, SpotMergeResult};

/// An opened document assembly.
///
/// Documents are dense, zero-based and contiguous; iteration stops at the
/// first index for which [`Assembly::document_exists`] returns `false`.
pub trait Assembly: Sync {
    /// Return `true` when a document exists at `index`.
    fn document_exists(&self, index: u32) -> bool;

    /// Open the document at `index`.
    fn document(&self, index: u32) -> SpotMergeResult<Box<dyn Document + '_>>;
}

/// One document inside an assembly. Pages are dense and zero-based, like
/// documents.
pub trait Document: Send {
    /// Return `true` when a page exists at `index`.
    fn page_exists(&self, index: u32) -> bool;

    /// Open the page at `index`.
    fn page(&self, index: u32) -> SpotMergeResult<Box<dyn Page + '_>>;
}

/// An open page handle.
pub trait Page: Send {
    /// Take the page content, consuming the handle.
    ///
    /// Ownership of the content transfers to the caller here; any page-level
    /// resources not needed for content access are released with the handle.
    fn content(self: Box<Self>) -> SpotMergeResult<PageContent>;
}

/// In-memory assembly implementation backed by a JSON-loadable definition.
#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct InMemoryAssembly {
    /// Documents in assembly order.
    pub documents: Vec<InMemoryDocument>,
}

/// One in-memory document: a list of page contents.
#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct InMemoryDocument {
    /// Pages in document order.
    pub pages: Vec<PageContent>,
}

impl InMemoryAssembly {
    /// Load an assembly definition from a JSON file.
    pub fn from_path(path: &Path) -> SpotMergeResult<Self> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("open assembly '{}'", path.display()))?;
        let reader = std::io::BufReader::new(file);
        let assembly: Self = serde_json::from_reader(reader)
            .with_context(|| format!("parse assembly JSON '{}'", path.display()))?;
        Ok(assembly)
    }

    /// Single-document convenience constructor.
    pub fn single_document(pages: Vec<PageContent>) -> Self {
        Self {
            documents: vec![InMemoryDocument { pages }],
        }
    }
}

impl Assembly for InMemoryAssembly {
    fn document_exists(&self, index: u32) -> bool {
        (index as usize) < self.documents.len()
    }

    fn document(&self, index: u32) -> SpotMergeResult<Box<dyn Document + '_>> {
        let doc = self.documents.get(index as usize).ok_or_else(|| {
            SpotMergeError::validation(format!("document index {index} out of range"))
        })?;
        Ok(Box::new(InMemoryDocumentHandle { doc }))
    }
}

struct InMemoryDocumentHandle<'a> {
    doc: &'a InMemoryDocument,
}

impl Document for InMemoryDocumentHandle<'_> {
    fn page_exists(&self, index: u32) -> bool {
        (index as usize) < self.doc.pages.len()
    }

    fn page(&self, index: u32) -> SpotMergeResult<Box<dyn Page + '_>> {
        let content = self.doc.pages.get(index as usize).ok_or_else(|| {
            SpotMergeError::validation(format!("page index {index} out of range"))
        })?;
        Ok(Box::new(InMemoryPageHandle { content }))
    }
}

struct InMemoryPageHandle<'a> {
    content: &'a PageContent,
}

impl Page for InMemoryPageHandle<'_> {
    fn content(self: Box<Self>) -> SpotMergeResult<PageContent> {
        Ok(self.content.clone())
    }
}
