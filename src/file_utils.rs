use anyhow::{Result, Context};
use log::warn;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use walkdir::WalkDir;

// @module: File and directory utilities

// @struct: File operations utility
pub struct FileManager;

impl FileManager {
    // @checks: File existence
    pub fn file_exists<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref().exists() && path.as_ref().is_file()
    }

    // @checks: Directory existence
    pub fn dir_exists<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref().exists() && path.as_ref().is_dir()
    }

    // @creates: Directory and parents if needed
    pub fn ensure_dir<P: AsRef<Path>>(path: P) -> Result<()> {
        let path = path.as_ref();
        if !path.exists() {
            fs::create_dir_all(path)?;
        }
        Ok(())
    }

    // @generates: Output path for a translated subtitle, same directory,
    // suffix appended to the stem: movie.srt -> movie_vi.srt
    pub fn output_path_for<P: AsRef<Path>>(input: P, suffix: &str) -> PathBuf {
        let input = input.as_ref();
        let stem = input.file_stem().unwrap_or_default().to_string_lossy();
        input.with_file_name(format!("{}{}.srt", stem, suffix))
    }

    // @checks: Whether a path already carries the output suffix in its stem
    pub fn has_output_suffix<P: AsRef<Path>>(path: P, suffix: &str) -> bool {
        path.as_ref()
            .file_stem()
            .map(|stem| stem.to_string_lossy().ends_with(suffix))
            .unwrap_or(false)
    }

    /// Recursively find `.srt` files that are translation inputs: already
    /// suffixed outputs are excluded so a rerun over the same tree only
    /// sees the originals. Sorted for a stable processing order.
    pub fn find_srt_inputs<P: AsRef<Path>>(dir: P, output_suffix: &str) -> Result<Vec<PathBuf>> {
        let mut result = Vec::new();

        for entry in WalkDir::new(dir.as_ref()).follow_links(true) {
            let entry = entry.context("Failed to read directory entry")?;
            let path = entry.path();

            if !path.is_file() {
                continue;
            }
            let is_srt = path
                .extension()
                .map(|ext| ext.to_string_lossy().eq_ignore_ascii_case("srt"))
                .unwrap_or(false);
            if is_srt && !Self::has_output_suffix(path, output_suffix) {
                result.push(path.to_path_buf());
            }
        }

        result.sort();
        Ok(result)
    }

    /// Read a subtitle file as text: UTF-8 first, Latin-1 as the fallback
    /// for the pre-Unicode subtitle files still in circulation.
    pub fn read_subtitle_text<P: AsRef<Path>>(path: P) -> Result<String> {
        let bytes = fs::read(&path)
            .with_context(|| format!("Failed to read file: {:?}", path.as_ref()))?;

        match String::from_utf8(bytes) {
            Ok(text) => Ok(text),
            Err(e) => {
                warn!(
                    "File {:?} is not valid UTF-8, decoding as Latin-1",
                    path.as_ref()
                );
                // Latin-1 maps every byte to the code point of the same value
                Ok(e.into_bytes().iter().map(|&b| b as char).collect())
            }
        }
    }

    /// Write a string to a file atomically: temp file in the same directory,
    /// then rename over the target. Readers never observe a partial file.
    pub fn write_atomic<P: AsRef<Path>>(path: P, content: &str) -> Result<()> {
        let path = path.as_ref();
        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        Self::ensure_dir(parent)?;

        let mut tmp = NamedTempFile::new_in(parent)
            .with_context(|| format!("Failed to create temp file next to {:?}", path))?;
        tmp.write_all(content.as_bytes())
            .with_context(|| format!("Failed to write temp file for {:?}", path))?;
        tmp.persist(path)
            .with_context(|| format!("Failed to move temp file into place at {:?}", path))?;

        Ok(())
    }
}
