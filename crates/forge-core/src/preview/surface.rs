//! Render surfaces
//!
//! Where the router materializes documents. The surface is handed to the
//! router at construction; nothing looks one up by name.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::RenderError;

/// Target a preview document is written to
pub trait RenderSurface: Send + 'static {
    /// Replace the whole document
    fn write_document(&mut self, html: &str) -> Result<(), RenderError>;
}

/// Surface that keeps every document it was given
#[derive(Debug, Default)]
pub struct MemorySurface {
    documents: Vec<String>,
}

impl MemorySurface {
    pub fn new() -> Self {
        Self::default()
    }

    /// Document currently shown
    pub fn current(&self) -> Option<&str> {
        self.documents.last().map(String::as_str)
    }

    /// Every document written, oldest first
    pub fn history(&self) -> &[String] {
        &self.documents
    }
}

impl RenderSurface for MemorySurface {
    fn write_document(&mut self, html: &str) -> Result<(), RenderError> {
        self.documents.push(html.to_string());
        Ok(())
    }
}

/// Surface backed by an HTML file, replaced atomically on every write
#[derive(Debug, Clone)]
pub struct FileSurface {
    path: PathBuf,
    writes: usize,
}

impl FileSurface {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            writes: 0,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn writes(&self) -> usize {
        self.writes
    }
}

impl RenderSurface for FileSurface {
    fn write_document(&mut self, html: &str) -> Result<(), RenderError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        // Write to a sibling temp file so readers never see a half-written document
        let temp_path = self.path.with_extension("tmp");
        fs::write(&temp_path, html)?;
        fs::rename(&temp_path, &self.path)?;

        self.writes += 1;
        debug!("Preview written to {} ({} bytes)", self.path.display(), html.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_memory_surface_history() {
        let mut surface = MemorySurface::new();
        assert!(surface.current().is_none());
        surface.write_document("one").unwrap();
        surface.write_document("two").unwrap();
        assert_eq!(surface.current(), Some("two"));
        assert_eq!(surface.history().len(), 2);
    }

    #[test]
    fn test_file_surface_replaces_document() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out").join("preview.html");
        let mut surface = FileSurface::new(&path);

        surface.write_document("<p>first</p>").unwrap();
        surface.write_document("<p>second</p>").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "<p>second</p>");
        assert!(!path.with_extension("tmp").exists());
        assert_eq!(surface.writes(), 2);
    }

    #[test]
    fn test_file_surface_io_error() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("not-a-dir");
        fs::write(&blocker, "").unwrap();

        let mut surface = FileSurface::new(blocker.join("preview.html"));
        let err = surface.write_document("<p>x</p>").unwrap_err();
        assert!(matches!(err, RenderError::Io(_)));
    }
}
