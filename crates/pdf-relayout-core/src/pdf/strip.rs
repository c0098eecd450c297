//! Removing the original text layer with Ghostscript.

use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, info};

use crate::error::{Error, Result};

use super::traits::BackgroundStripper;

/// Runs `gs -sDEVICE=pdfwrite -dFILTERTEXT`, which drops all text while
/// keeping vector graphics and images.
#[derive(Debug, Clone)]
pub struct GhostscriptStripper {
    program: PathBuf,
}

impl Default for GhostscriptStripper {
    fn default() -> Self {
        Self::new("gs")
    }
}

impl GhostscriptStripper {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn command(&self, input: &Path, output: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.arg("-q")
            .arg("-o")
            .arg(output)
            .arg("-sDEVICE=pdfwrite")
            .arg("-dFILTERTEXT")
            .arg(input);
        cmd
    }
}

impl BackgroundStripper for GhostscriptStripper {
    fn strip(&self, input: &Path, output: &Path) -> Result<()> {
        info!("Stripping text from {} with Ghostscript", input.display());
        let result = self.command(input, output).output().map_err(|e| {
            Error::PdfStrip(format!("Failed to run {}: {e}", self.program.display()))
        })?;

        if !result.status.success() {
            return Err(Error::PdfStrip(format!(
                "{} exited with {}: {}",
                self.program.display(),
                result.status,
                String::from_utf8_lossy(&result.stderr).trim()
            )));
        }

        let written = std::fs::metadata(output).map(|m| m.len()).unwrap_or(0);
        if written == 0 {
            return Err(Error::PdfStrip("Ghostscript produced an empty background".to_string()));
        }
        debug!("Background written to {} ({} bytes)", output.display(), written);
        Ok(())
    }
}
