//! Registry of classifications files can be labelled with

use super::{ClassificationCriteria, ContentError, FileClassification, Result};
use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

/// Source of classification definitions
pub trait ClassificationRegistry: Send + Sync {
    fn list(&self) -> Result<Vec<FileClassification>>;
    fn get(&self, id: &str) -> Result<FileClassification>;
    fn save(&self, classification: FileClassification) -> Result<()>;
    /// Fails with `ProtectedClassification` for built-ins
    fn delete(&self, id: &str) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct MemoryClassificationRegistry {
    classifications: RwLock<BTreeMap<String, FileClassification>>,
}

impl MemoryClassificationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry seeded with the built-in classifications
    pub fn with_builtins() -> Self {
        let classifications =
            builtin_classifications().into_iter().map(|c| (c.id.clone(), c)).collect();
        Self {
            classifications: RwLock::new(classifications),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, BTreeMap<String, FileClassification>>> {
        self.classifications
            .read()
            .map_err(|_| ContentError::Storage("classification registry lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, BTreeMap<String, FileClassification>>> {
        self.classifications
            .write()
            .map_err(|_| ContentError::Storage("classification registry lock poisoned".to_string()))
    }
}

impl ClassificationRegistry for MemoryClassificationRegistry {
    fn list(&self) -> Result<Vec<FileClassification>> {
        Ok(self.read()?.values().cloned().collect())
    }

    fn get(&self, id: &str) -> Result<FileClassification> {
        self.read()?
            .get(id)
            .cloned()
            .ok_or_else(|| ContentError::ClassificationNotFound(id.to_string()))
    }

    fn save(&self, classification: FileClassification) -> Result<()> {
        if classification.id.trim().is_empty() {
            return Err(ContentError::InvalidOperation("classification ID is required".to_string()));
        }
        if !(0.0..=1.0).contains(&classification.confidence_threshold) {
            return Err(ContentError::InvalidOperation(format!(
                "confidence threshold {} is outside [0, 1]",
                classification.confidence_threshold
            )));
        }
        let mut classifications = self.write()?;
        if classifications.get(&classification.id).is_some_and(|existing| existing.system_defined) {
            return Err(ContentError::ProtectedClassification(classification.id));
        }
        debug!("Saving classification '{}'", classification.id);
        classifications.insert(classification.id.clone(), classification);
        Ok(())
    }

    fn delete(&self, id: &str) -> Result<()> {
        let mut classifications = self.write()?;
        match classifications.get(id) {
            None => Err(ContentError::ClassificationNotFound(id.to_string())),
            Some(c) if c.system_defined => {
                Err(ContentError::ProtectedClassification(id.to_string()))
            }
            Some(_) => {
                classifications.remove(id);
                Ok(())
            }
        }
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn builtin(
    id: &str,
    name: &str,
    description: &str,
    extensions: &[&str],
    mime_types: &[&str],
) -> FileClassification {
    FileClassification {
        id: id.to_string(),
        name: name.to_string(),
        description: description.to_string(),
        criteria: ClassificationCriteria {
            extensions: strings(extensions),
            mime_types: strings(mime_types),
            ..ClassificationCriteria::default()
        },
        confidence_threshold: 0.4,
        system_defined: true,
    }
}

/// Built-in classifications shipped with every registry
pub fn builtin_classifications() -> Vec<FileClassification> {
    vec![
        builtin(
            "documents",
            "Documents",
            "Text documents and PDFs",
            &["pdf", "doc", "docx", "odt", "rtf", "txt", "md"],
            &["application/pdf", "application/msword", "text/plain", "text/markdown"],
        ),
        builtin(
            "images",
            "Images",
            "Photos and graphics",
            &["jpg", "jpeg", "png", "gif", "bmp", "webp", "svg", "tif", "tiff", "heic"],
            &["image/*"],
        ),
        builtin(
            "audio",
            "Audio",
            "Music and recordings",
            &["mp3", "flac", "wav", "ogg", "m4a"],
            &["audio/*"],
        ),
        builtin(
            "video",
            "Video",
            "Movies and clips",
            &["mp4", "mkv", "mov", "avi", "webm"],
            &["video/*"],
        ),
        builtin(
            "archives",
            "Archives",
            "Compressed archives",
            &["zip", "gz", "tar", "7z", "rar"],
            &[
                "application/zip",
                "application/gzip",
                "application/x-tar",
                "application/x-7z-compressed",
            ],
        ),
        builtin(
            "source-code",
            "Source Code",
            "Program source files",
            &["rs", "py", "go", "java", "c", "h", "cpp", "hpp", "js", "ts", "sh"],
            &[
                "text/x-rust",
                "text/x-python",
                "text/x-go",
                "text/x-java",
                "text/x-c",
                "text/javascript",
            ],
        ),
        builtin(
            "spreadsheets",
            "Spreadsheets",
            "Tabular data",
            &["xls", "xlsx", "ods", "csv", "tsv"],
            &[
                "application/vnd.ms-excel",
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
                "text/csv",
            ],
        ),
        builtin(
            "presentations",
            "Presentations",
            "Slide decks",
            &["ppt", "pptx", "odp", "key"],
            &[
                "application/vnd.ms-powerpoint",
                "application/vnd.openxmlformats-officedocument.presentationml.presentation",
            ],
        ),
    ]
}
