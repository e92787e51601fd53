//! Transcript sources and script providers.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::document;
use crate::error::{Result, SyncError};

/// Append-only text the tracker polls.
#[async_trait]
pub trait TranscriptSource: Send + Sync {
    fn name(&self) -> &str;

    /// Current full transcript. Transient read failures are
    /// [`SyncError::SourceUnavailable`].
    async fn read_full(&self) -> Result<String>;
}

/// Supplies the reference script for a session.
#[async_trait]
pub trait ScriptProvider: Send + Sync {
    async fn load_script(&self) -> Result<String>;
}

/// In-memory transcript shared with the transport.
///
/// The transport appends each recognized fragment as its own line.
#[derive(Debug, Clone, Default)]
pub struct SharedTranscript {
    text: Arc<RwLock<String>>,
}

impl SharedTranscript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one recognized fragment followed by a line break. Blank
    /// fragments are ignored.
    pub async fn append_fragment(&self, fragment: &str) {
        let fragment = fragment.trim();
        if fragment.is_empty() {
            return;
        }
        let mut text = self.text.write().await;
        text.push_str(fragment);
        text.push('\n');
    }

    /// Clear the buffer. Only valid before a session starts.
    pub async fn reset(&self) {
        self.text.write().await.clear();
    }

    pub async fn len(&self) -> usize {
        self.text.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.text.read().await.is_empty()
    }
}

#[async_trait]
impl TranscriptSource for SharedTranscript {
    fn name(&self) -> &str {
        "shared"
    }

    async fn read_full(&self) -> Result<String> {
        Ok(self.text.read().await.clone())
    }
}

/// A transcript file re-read on every poll.
#[derive(Debug, Clone)]
pub struct FileTranscriptSource {
    path: PathBuf,
    origin: String,
}

impl FileTranscriptSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let origin = path.display().to_string();
        Self { path, origin }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl TranscriptSource for FileTranscriptSource {
    fn name(&self) -> &str {
        &self.origin
    }

    async fn read_full(&self) -> Result<String> {
        tokio::fs::read_to_string(&self.path)
            .await
            .map_err(|e| SyncError::source_unavailable(&self.origin, e.to_string()))
    }
}

/// A script held in memory.
#[derive(Debug, Clone)]
pub struct StaticScript(pub String);

impl StaticScript {
    pub fn new(text: impl Into<String>) -> Self {
        Self(text.into())
    }
}

#[async_trait]
impl ScriptProvider for StaticScript {
    async fn load_script(&self) -> Result<String> {
        if self.0.trim().is_empty() {
            return Err(SyncError::invalid_script("script is empty"));
        }
        Ok(self.0.clone())
    }
}

/// Script file extensions accepted by [`FileScript`].
pub const SCRIPT_EXTENSIONS: [&str; 4] = ["txt", "md", "docx", "pdf"];

/// A script read from a `.txt`/`.md`/`.docx`/`.pdf` file, or from the
/// first regular file (by name) in a directory.
///
/// Word documents yield one line per paragraph and PDFs one block per
/// page.
#[derive(Debug, Clone)]
pub struct FileScript {
    path: PathBuf,
}

impl FileScript {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    async fn resolve(&self) -> Result<PathBuf> {
        let meta = tokio::fs::metadata(&self.path).await.map_err(|e| {
            SyncError::invalid_script(format!("{}: {e}", self.path.display()))
        })?;
        if !meta.is_dir() {
            return Ok(self.path.clone());
        }

        let mut entries = tokio::fs::read_dir(&self.path).await?;
        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                files.push(entry.path());
            }
        }
        files.sort();
        let first = files.into_iter().next().ok_or_else(|| {
            SyncError::invalid_script(format!("{} contains no files", self.path.display()))
        })?;
        debug!(dir = %self.path.display(), file = %first.display(), "picked script from directory");
        Ok(first)
    }
}

#[async_trait]
impl ScriptProvider for FileScript {
    async fn load_script(&self) -> Result<String> {
        let path = self.resolve().await?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        if !SCRIPT_EXTENSIONS.contains(&ext.as_str()) {
            warn!(path = %path.display(), "unsupported script file type");
            return Err(SyncError::invalid_script(format!(
                "unsupported script file type: {}",
                path.display()
            )));
        }
        let text = match ext.as_str() {
            "docx" => extract_blocking(&path, document::docx_text).await?,
            "pdf" => extract_blocking(&path, document::pdf_text).await?,
            _ => tokio::fs::read_to_string(&path).await?,
        };
        if text.trim().is_empty() {
            return Err(SyncError::invalid_script(format!(
                "{} is empty",
                path.display()
            )));
        }
        Ok(text)
    }
}

/// Read `path` and run a CPU-bound text extractor off the async workers.
async fn extract_blocking(path: &Path, extract: fn(&[u8]) -> Result<String>) -> Result<String> {
    let bytes = tokio::fs::read(path).await?;
    let text = tokio::task::spawn_blocking(move || extract(&bytes))
        .await
        .map_err(|e| {
            SyncError::invalid_script(format!("{}: extraction aborted: {e}", path.display()))
        })??;
    debug!(path = %path.display(), chars = text.chars().count(), "extracted script text");
    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn shared_transcript_appends_lines() {
        let transcript = SharedTranscript::new();
        transcript.append_fragment("merhaba dünya").await;
        transcript.append_fragment("   ").await;
        transcript.append_fragment(" bugün hava güzel ").await;
        assert_eq!(
            transcript.read_full().await.unwrap(),
            "merhaba dünya\nbugün hava güzel\n"
        );

        let other = transcript.clone();
        other.reset().await;
        assert!(transcript.is_empty().await);
    }

    #[tokio::test]
    async fn file_transcript_reads_current_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("transcript.txt");
        let source = FileTranscriptSource::new(&path);

        let err = source.read_full().await.unwrap_err();
        assert!(matches!(err, SyncError::SourceUnavailable { .. }));
        assert!(err.is_recoverable());

        std::fs::write(&path, "merhaba dünya\n").unwrap();
        assert_eq!(source.read_full().await.unwrap(), "merhaba dünya\n");
    }

    #[tokio::test]
    async fn static_script_rejects_blank_text() {
        assert!(StaticScript::new("Merhaba.").load_script().await.is_ok());
        let err = StaticScript::new(" \n").load_script().await.unwrap_err();
        assert!(matches!(err, SyncError::InvalidScript { .. }));
    }

    #[tokio::test]
    async fn file_script_reads_text_and_markdown() {
        let dir = tempfile::tempdir().unwrap();
        let md = dir.path().join("script.MD");
        std::fs::write(&md, "Merhaba dünya.").unwrap();
        assert_eq!(FileScript::new(&md).load_script().await.unwrap(), "Merhaba dünya.");
    }

    #[tokio::test]
    async fn file_script_picks_first_file_in_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.txt"), "İkinci.").unwrap();
        std::fs::write(dir.path().join("a.txt"), "Birinci.").unwrap();
        std::fs::create_dir(dir.path().join("0-subdir")).unwrap();
        assert_eq!(
            FileScript::new(dir.path()).load_script().await.unwrap(),
            "Birinci."
        );
    }

    #[tokio::test]
    async fn file_script_rejects_bad_inputs() {
        let dir = tempfile::tempdir().unwrap();

        let empty_dir = FileScript::new(dir.path()).load_script().await.unwrap_err();
        assert!(matches!(empty_dir, SyncError::InvalidScript { .. }));

        let rtf = dir.path().join("script.rtf");
        std::fs::write(&rtf, "{\\rtf1 Merhaba}").unwrap();
        let err = FileScript::new(&rtf).load_script().await.unwrap_err();
        assert!(err.to_string().contains("unsupported script file type"), "got: {err}");

        let pdf = dir.path().join("broken.pdf");
        std::fs::write(&pdf, "%PDF").unwrap();
        let err = FileScript::new(&pdf).load_script().await.unwrap_err();
        assert!(matches!(err, SyncError::InvalidScript { .. }));

        let docx = dir.path().join("broken.docx");
        std::fs::write(&docx, "not a zip").unwrap();
        let err = FileScript::new(&docx).load_script().await.unwrap_err();
        assert!(matches!(err, SyncError::InvalidScript { .. }));

        let blank = dir.path().join("blank.txt");
        std::fs::write(&blank, "\n\n").unwrap();
        let err = FileScript::new(&blank).load_script().await.unwrap_err();
        assert!(matches!(err, SyncError::InvalidScript { .. }));

        let missing = FileScript::new(dir.path().join("nope.txt"));
        assert!(matches!(
            missing.load_script().await.unwrap_err(),
            SyncError::InvalidScript { .. }
        ));
    }

    fn write_docx(path: &Path, paragraphs: &[&str]) {
        use std::io::Write;

        let body: String = paragraphs
            .iter()
            .map(|p| format!("<w:p><w:r><w:t>{p}</w:t></w:r></w:p>"))
            .collect();
        let xml = format!(
            r#"<w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{body}</w:body></w:document>"#
        );
        let mut zip = zip::ZipWriter::new(std::fs::File::create(path).unwrap());
        zip.start_file("word/document.xml", zip::write::FileOptions::default())
            .unwrap();
        zip.write_all(xml.as_bytes()).unwrap();
        zip.finish().unwrap();
    }

    fn write_pdf(path: &Path, line: &str) {
        use lopdf::content::{Content, Operation};
        use lopdf::{Document, Object, Stream, dictionary};

        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Courier",
            "Encoding" => "WinAnsiEncoding",
        });
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
        });
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 24.into()]),
                Operation::new("Td", vec![72.into(), 700.into()]),
                Operation::new("Tj", vec![Object::string_literal(line)]),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        doc.save(path).unwrap();
    }

    #[tokio::test]
    async fn file_script_reads_docx_paragraphs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("talk.docx");
        write_docx(&path, &["Merhaba dünya.", "Bugün hava güzel."]);

        let text = FileScript::new(&path).load_script().await.unwrap();
        assert_eq!(text, "Merhaba dünya.\nBugün hava güzel.");
    }

    #[tokio::test]
    async fn directory_may_hold_a_docx_script() {
        let dir = tempfile::tempdir().unwrap();
        write_docx(&dir.path().join("a-talk.docx"), &["Görüşmek üzere."]);
        std::fs::write(dir.path().join("b-notes.txt"), "later").unwrap();

        let text = FileScript::new(dir.path()).load_script().await.unwrap();
        assert_eq!(text, "Görüşmek üzere.");
    }

    #[tokio::test]
    async fn file_script_reads_pdf_text() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("talk.pdf");
        write_pdf(&path, "Merhaba dunya.");

        let text = FileScript::new(&path).load_script().await.unwrap();
        assert!(text.contains("Merhaba"), "got: {text:?}");
        assert!(text.ends_with('\n'));
    }

    #[tokio::test]
    async fn docx_without_text_is_empty_script() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blank.docx");
        write_docx(&path, &[]);

        let err = FileScript::new(&path).load_script().await.unwrap_err();
        assert!(err.to_string().contains("is empty"), "got: {err}");
    }
}
