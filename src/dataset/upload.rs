use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::types::{RetrievalResult, Source};

const TEXT_EXTENSIONS: [&str; 16] = [
    "txt", "md", "markdown", "json", "csv", "tsv", "log", "xml", "yaml", "yml", "toml", "html",
    "rs", "py", "ts", "js",
];

fn is_text_like(path: &Path) -> bool {
    match path.extension().and_then(|e| e.to_str()) {
        None => true,
        Some(ext) => TEXT_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()),
    }
}

/// Build a custom dataset from local files.
///
/// Non-text files are skipped with a warning, and so are files that cannot be
/// read as UTF-8. Every accepted file becomes one record with score 1.0.
pub async fn dataset_from_paths(paths: &[PathBuf]) -> Result<Vec<RetrievalResult>> {
    let mut records = Vec::with_capacity(paths.len());
    for path in paths {
        if !is_text_like(path) {
            tracing::warn!(path = %path.display(), "skipping non-text file");
            continue;
        }
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(err) => {
                tracing::warn!(path = %path.display(), error = %err, "skipping unreadable file");
                continue;
            }
        };
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        records.push(RetrievalResult::new(
            Source::new(file_name, path.display().to_string()),
            content,
            1.0,
        ));
    }
    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn reads_text_files_and_skips_binaries() {
        let dir = TempDir::new().unwrap();
        let notes = dir.path().join("notes.md");
        let image = dir.path().join("chart.png");
        let missing = dir.path().join("gone.txt");
        std::fs::write(&notes, "# Q3 notes").unwrap();
        std::fs::write(&image, [0u8, 159, 146, 150]).unwrap();

        let records = dataset_from_paths(&[notes.clone(), image, missing]).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].source.file_name, "notes.md");
        assert_eq!(records[0].content_snippet, "# Q3 notes");
        assert_eq!(records[0].score, 1.0);
    }
}
