//! Corpus loading.
//!
//! A [`DocumentLoader`] yields page-level [`Document`]s. [`PdfDirectoryLoader`]
//! (feature `pdf`) reads every `*.pdf` file directly inside a directory, one
//! document per page, labelled with the file name.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use walkdir::WalkDir;

use crate::document::Document;
use crate::error::{RagError, Result};

/// A source of documents for ingestion.
#[async_trait]
pub trait DocumentLoader: Send + Sync {
    /// Load every document in the corpus.
    ///
    /// An empty corpus is `Ok(vec![])`, not an error.
    async fn load(&self) -> Result<Vec<Document>>;
}

/// List the PDF files directly inside `dir`, sorted by path.
///
/// A missing directory yields an empty list. Symbolic links are followed;
/// entries that cannot be read, such as broken links, are logged and skipped.
///
/// # Errors
///
/// Returns [`RagError::LoaderError`] if `dir` exists but is not a directory.
pub fn discover_pdf_files(dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
    let dir = dir.as_ref();
    if !dir.exists() {
        return Ok(Vec::new());
    }
    if !dir.is_dir() {
        return Err(RagError::LoaderError {
            path: dir.display().to_string(),
            message: "not a directory".to_string(),
        });
    }

    let mut files = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                tracing::warn!(dir = %dir.display(), error = %e, "skipping unreadable entry");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            entry.path().extension().is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
        })
        .map(|entry| entry.into_path())
        .collect::<Vec<_>>();

    files.sort();
    Ok(files)
}

/// Loads every PDF in a directory, one [`Document`] per page.
#[cfg(feature = "pdf")]
#[derive(Debug, Clone)]
pub struct PdfDirectoryLoader {
    dir: PathBuf,
}

#[cfg(feature = "pdf")]
impl PdfDirectoryLoader {
    /// Create a loader for `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The corpus directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[cfg(feature = "pdf")]
#[async_trait]
impl DocumentLoader for PdfDirectoryLoader {
    async fn load(&self) -> Result<Vec<Document>> {
        let files = discover_pdf_files(&self.dir)?;
        if files.is_empty() {
            tracing::warn!(dir = %self.dir.display(), "no PDF files found");
            return Ok(Vec::new());
        }

        let mut documents = Vec::new();
        for path in files {
            let display = path.display().to_string();
            let pages = tokio::task::spawn_blocking(move || extract_pages(&path))
                .await
                .map_err(|e| RagError::LoaderError { path: display, message: e.to_string() })??;
            documents.extend(pages);
        }
        Ok(documents)
    }
}

/// Extract the text of every page of one PDF.
///
/// Pages whose text cannot be decoded are loaded as empty documents, which
/// chunk to nothing.
#[cfg(feature = "pdf")]
fn extract_pages(path: &Path) -> Result<Vec<Document>> {
    let pdf = lopdf::Document::load(path).map_err(|e| RagError::LoaderError {
        path: path.display().to_string(),
        message: e.to_string(),
    })?;
    let source_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    let mut documents = Vec::new();
    for &page_number in pdf.get_pages().keys() {
        let text = match pdf.extract_text(&[page_number]) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(file = %source_name, page = page_number, error = %e, "page text unreadable");
                String::new()
            }
        };
        documents.push(
            Document::new(source_name.clone(), text)
                .with_page(page_number)
                .with_metadata("path", path.display().to_string()),
        );
    }

    tracing::debug!(file = %source_name, pages = documents.len(), "loaded PDF");
    Ok(documents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn discovers_only_top_level_pdf_files_in_order() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path();
        fs::create_dir_all(root.join("nested")).unwrap();
        fs::write(root.join("b.pdf"), b"%PDF").unwrap();
        fs::write(root.join("a.PDF"), b"%PDF").unwrap();
        fs::write(root.join("notes.txt"), b"ignore").unwrap();
        fs::write(root.join("nested/c.pdf"), b"%PDF").unwrap();

        let files = discover_pdf_files(root).unwrap();
        let names: Vec<_> =
            files.iter().map(|p| p.file_name().unwrap().to_string_lossy().into_owned()).collect();
        assert_eq!(names, ["a.PDF", "b.pdf"]);
    }

    #[cfg(unix)]
    #[test]
    fn unreadable_entries_are_skipped() {
        let temp = tempfile::tempdir().unwrap();
        let root = temp.path();
        fs::write(root.join("a.pdf"), b"%PDF").unwrap();
        fs::write(root.join("target.pdf"), b"%PDF").unwrap();
        std::os::unix::fs::symlink(root.join("target.pdf"), root.join("linked.pdf")).unwrap();
        std::os::unix::fs::symlink(root.join("gone.pdf"), root.join("dangling.pdf")).unwrap();

        let files = discover_pdf_files(root).unwrap();
        let names: Vec<_> =
            files.iter().map(|p| p.file_name().unwrap().to_string_lossy().into_owned()).collect();
        assert_eq!(names, ["a.pdf", "linked.pdf", "target.pdf"]);
    }

    #[test]
    fn missing_directory_is_an_empty_corpus() {
        let temp = tempfile::tempdir().unwrap();
        assert!(discover_pdf_files(temp.path().join("docs")).unwrap().is_empty());
    }

    #[test]
    fn file_in_place_of_directory_is_rejected() {
        let temp = tempfile::tempdir().unwrap();
        let file = temp.path().join("docs");
        fs::write(&file, b"").unwrap();
        assert!(matches!(discover_pdf_files(&file), Err(RagError::LoaderError { .. })));
    }

    #[cfg(feature = "pdf")]
    #[tokio::test]
    async fn empty_directory_loads_no_documents() {
        let temp = tempfile::tempdir().unwrap();
        let loader = PdfDirectoryLoader::new(temp.path());
        assert!(loader.load().await.unwrap().is_empty());
    }

    #[cfg(feature = "pdf")]
    #[tokio::test]
    async fn unreadable_pdf_fails_the_load() {
        let temp = tempfile::tempdir().unwrap();
        fs::write(temp.path().join("broken.pdf"), b"not a pdf").unwrap();
        let loader = PdfDirectoryLoader::new(temp.path());
        let err = loader.load().await.unwrap_err();
        assert!(matches!(err, RagError::LoaderError { .. }));
        assert!(err.to_string().contains("broken.pdf"));
    }
}
