//! File-level translation: read, translate, write.

use crate::Translator;
use crate::error::TranslateError;
use rayon::prelude::*;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Output path for `input`: same directory and stem, new extension.
pub fn output_path(input: &Path, extension: &str) -> PathBuf {
    input.with_extension(extension)
}

/// Read and translate one file without writing anything.
pub fn translate_to_string(input: &Path, translator: &Translator) -> Result<String, TranslateError> {
    let source = std::fs::read_to_string(input).map_err(|err| TranslateError::io(input, err))?;
    tracing::debug!(input = %input.display(), bytes = source.len(), "translating");
    translator.translate(&source)
}

/// Translate one file and write the result next to it.
///
/// On failure nothing is written, and an output file left by an earlier
/// run is removed so it cannot be mistaken for the current translation.
pub fn translate_file(input: &Path, translator: &Translator) -> Result<PathBuf, TranslateError> {
    let output = output_path(input, translator.extension());
    if output == input {
        return Err(TranslateError::io(
            input,
            std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "output path is the input file",
            ),
        ));
    }

    let berry = match translate_to_string(input, translator) {
        Ok(berry) => berry,
        Err(err) => {
            remove_stale(&output);
            return Err(err);
        }
    };

    std::fs::write(&output, berry).map_err(|err| TranslateError::io(&output, err))?;
    tracing::debug!(output = %output.display(), "written");
    Ok(output)
}

fn remove_stale(output: &Path) {
    if !output.is_file() {
        return;
    }
    match std::fs::remove_file(output) {
        Ok(()) => tracing::warn!(path = %output.display(), "removed stale output"),
        Err(err) => {
            tracing::warn!(path = %output.display(), error = %err, "cannot remove stale output")
        }
    }
}

/// Outcome of translating a single file.
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum FileOutcome {
    Ok { output: PathBuf },
    Error { kind: &'static str, message: String },
}

/// Per-file entry of a batch run.
#[derive(Debug, Serialize)]
pub struct FileReport {
    pub input: PathBuf,
    #[serde(flatten)]
    pub outcome: FileOutcome,
}

impl FileReport {
    fn new(input: PathBuf, result: Result<PathBuf, TranslateError>) -> Self {
        let outcome = match result {
            Ok(output) => FileOutcome::Ok { output },
            Err(err) => FileOutcome::Error {
                kind: err.kind(),
                message: err.to_string(),
            },
        };
        Self { input, outcome }
    }

    pub fn is_error(&self) -> bool {
        matches!(self.outcome, FileOutcome::Error { .. })
    }
}

/// Find `*.py` files below `root`, sorted, skipping hidden directories.
pub fn discover_sources(root: &Path) -> Result<Vec<PathBuf>, TranslateError> {
    let mut files = Vec::new();
    let walker = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !entry.file_name().to_string_lossy().starts_with('.'));

    for entry in walker {
        let entry = entry.map_err(|err| {
            let path = err.path().unwrap_or(root).to_path_buf();
            TranslateError::io(path, err.into())
        })?;
        if entry.file_type().is_file()
            && entry.path().extension().and_then(|ext| ext.to_str()) == Some("py")
        {
            files.push(entry.into_path());
        }
    }

    files.sort();
    Ok(files)
}

/// Translate a file, or every `*.py` file below a directory in parallel.
///
/// Files are independent: one failing does not stop the others. The outer
/// error is reserved for failures to enumerate the inputs.
pub fn translate_path(input: &Path, translator: &Translator) -> Result<Vec<FileReport>, TranslateError> {
    if !input.is_dir() {
        let result = translate_file(input, translator);
        return Ok(vec![FileReport::new(input.to_path_buf(), result)]);
    }

    let files = discover_sources(input)?;
    tracing::debug!(root = %input.display(), files = files.len(), "batch translation");

    Ok(files
        .into_par_iter()
        .map(|file| {
            let result = translate_file(&file, translator);
            FileReport::new(file, result)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_output_path() {
        assert_eq!(
            output_path(Path::new("scripts/autoexec.py"), "be"),
            PathBuf::from("scripts/autoexec.be")
        );
    }

    #[test]
    fn test_translate_file_writes_output() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("driver.py");
        std::fs::write(&input, "x = None\n").unwrap();

        let output = translate_file(&input, &Translator::default()).unwrap();
        assert_eq!(output, dir.path().join("driver.be"));
        assert_eq!(std::fs::read_to_string(output).unwrap(), "var x = nil\n");
    }

    #[test]
    fn test_failure_removes_stale_output() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("bad.py");
        let stale = dir.path().join("bad.be");
        std::fs::write(&input, "a, b = pair\n").unwrap();
        std::fs::write(&stale, "old\n").unwrap();

        let err = translate_file(&input, &Translator::default()).unwrap_err();
        assert_eq!(err.kind(), "malformed-target");
        assert!(!stale.exists());
    }

    #[test]
    fn test_input_with_output_extension_is_left_alone() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("script.be");
        std::fs::write(&input, "a, b = pair\n").unwrap();

        let err = translate_file(&input, &Translator::default()).unwrap_err();
        assert_eq!(err.kind(), "io");
        assert_eq!(std::fs::read_to_string(&input).unwrap(), "a, b = pair\n");
    }

    #[test]
    fn test_missing_input_is_io_error() {
        let dir = TempDir::new().unwrap();
        let err = translate_file(&dir.path().join("absent.py"), &Translator::default()).unwrap_err();
        assert_eq!(err.kind(), "io");
    }

    #[test]
    fn test_batch_reports_each_file() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::create_dir(dir.path().join(".hidden")).unwrap();
        std::fs::write(dir.path().join("good.py"), "x = 1\n").unwrap();
        std::fs::write(dir.path().join("sub/bad.py"), "with f:\n    pass\n").unwrap();
        std::fs::write(dir.path().join(".hidden/skip.py"), "x = 1\n").unwrap();
        std::fs::write(dir.path().join("notes.txt"), "x = 1\n").unwrap();

        let reports = translate_path(dir.path(), &Translator::default()).unwrap();
        assert_eq!(reports.len(), 2);

        let failed: Vec<_> = reports.iter().filter(|r| r.is_error()).collect();
        assert_eq!(failed.len(), 1);
        assert!(failed[0].input.ends_with("sub/bad.py"));
        assert!(dir.path().join("good.be").is_file());
        assert!(!dir.path().join("sub/bad.be").exists());
    }

    #[test]
    fn test_report_serialises_status() {
        let report = FileReport::new(
            PathBuf::from("a.py"),
            Err(TranslateError::malformed("tuple unpacking is not supported")),
        );
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"], "error");
        assert_eq!(json["kind"], "malformed-target");
        assert_eq!(json["input"], "a.py");
    }
}
