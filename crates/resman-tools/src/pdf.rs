use std::io::Write;
use std::path::PathBuf;
use std::process::Command;

/// Turns PDF bytes into plain text.
///
/// Full-text reading is only offered when an extractor is configured; with
/// none, callers get an explicit "unavailable" answer.
pub trait PdfTextExtractor {
    fn extract_text(&self, pdf: &[u8]) -> anyhow::Result<String>;
}

/// Extractor backed by poppler's `pdftotext` binary.
#[derive(Debug, Clone)]
pub struct PdftotextExtractor {
    pub bin: PathBuf,
}

impl Default for PdftotextExtractor {
    fn default() -> Self {
        Self {
            bin: PathBuf::from("pdftotext"),
        }
    }
}

impl PdfTextExtractor for PdftotextExtractor {
    fn extract_text(&self, pdf: &[u8]) -> anyhow::Result<String> {
        let mut tmp = tempfile::Builder::new().suffix(".pdf").tempfile()?;
        tmp.write_all(pdf)?;
        tmp.flush()?;

        let output = Command::new(&self.bin)
            .arg("-enc")
            .arg("UTF-8")
            .arg(tmp.path())
            .arg("-")
            .output()
            .map_err(|e| anyhow::anyhow!("cannot run {}: {e}", self.bin.display()))?;
        if !output.status.success() {
            anyhow::bail!(
                "{} exited with {}: {}",
                self.bin.display(),
                output.status.code().unwrap_or(-1),
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
