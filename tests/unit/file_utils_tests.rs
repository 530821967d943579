/*!
 * Tests for file utility functions
 */

use anyhow::Result;
use std::fs;
use std::path::Path;
use sublate::file_utils::FileManager;

use crate::common;

/// Test that file_exists returns true for existing files
#[test]
fn test_file_exists_withExistingFile_shouldReturnTrue() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let test_file = common::create_test_file(temp_dir.path(), "present.srt", "1\n")?;

    assert!(FileManager::file_exists(&test_file));
    Ok(())
}

/// Test that file_exists returns false for missing paths and directories
#[test]
fn test_file_exists_withNonExistentFile_shouldReturnFalse() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;

    assert!(!FileManager::file_exists(temp_dir.path().join("absent.srt")));
    assert!(!FileManager::file_exists(temp_dir.path()));
    Ok(())
}

/// Test directory existence checks
#[test]
fn test_dir_exists_withDirAndFile_shouldDistinguishThem() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let test_file = common::create_test_file(temp_dir.path(), "file.srt", "1\n")?;

    assert!(FileManager::dir_exists(temp_dir.path()));
    assert!(!FileManager::dir_exists(&test_file));
    assert!(!FileManager::dir_exists(temp_dir.path().join("missing")));
    Ok(())
}

/// Test that ensure_dir creates nested directories
#[test]
fn test_ensure_dir_withNestedPath_shouldCreateAllLevels() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let nested = temp_dir.path().join("season_01").join("extras");

    FileManager::ensure_dir(&nested)?;
    assert!(nested.is_dir());

    // Idempotent on an existing directory
    FileManager::ensure_dir(&nested)?;
    Ok(())
}

/// Test output path derivation keeps the directory and re-suffixes the stem
#[test]
fn test_output_path_for_withSrtInput_shouldAppendSuffixToStem() {
    let output = FileManager::output_path_for(Path::new("/films/night/movie.srt"), "_vi");
    assert_eq!(output, Path::new("/films/night/movie_vi.srt"));

    let output = FileManager::output_path_for(Path::new("episode.01.srt"), "_fr");
    assert_eq!(output, Path::new("episode.01_fr.srt"));
}

/// Test suffix detection on stems
#[test]
fn test_has_output_suffix_withSuffixedAndPlainStems_shouldDetectSuffix() {
    assert!(FileManager::has_output_suffix(Path::new("movie_vi.srt"), "_vi"));
    assert!(FileManager::has_output_suffix(
        Path::new("/tmp/show/episode_vi.srt"),
        "_vi"
    ));
    assert!(!FileManager::has_output_suffix(Path::new("movie.srt"), "_vi"));
    assert!(!FileManager::has_output_suffix(Path::new("movie_fr.srt"), "_vi"));
}

/// Test that input discovery recurses, skips outputs and sorts
#[test]
fn test_find_srt_inputs_withMixedTree_shouldReturnSortedOriginals() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let root = temp_dir.path();

    common::create_test_file(root, "b_movie.srt", "1\n")?;
    common::create_test_file(root, "a_movie.srt", "1\n")?;
    common::create_test_file(root, "a_movie_vi.srt", "1\n")?;
    common::create_test_file(root, "notes.txt", "not a subtitle")?;

    let nested = root.join("season_01");
    FileManager::ensure_dir(&nested)?;
    common::create_test_file(&nested, "episode.SRT", "1\n")?;

    let inputs = FileManager::find_srt_inputs(root, "_vi")?;
    assert_eq!(
        inputs,
        vec![
            root.join("a_movie.srt"),
            root.join("b_movie.srt"),
            nested.join("episode.SRT"),
        ]
    );
    Ok(())
}

/// Test reading a UTF-8 subtitle file
#[test]
fn test_read_subtitle_text_withUtf8File_shouldReturnContent() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let content = "1\n00:00:01,000 --> 00:00:02,000\ncafé\n";
    let test_file = common::create_test_file(temp_dir.path(), "utf8.srt", content)?;

    let text = FileManager::read_subtitle_text(&test_file)?;
    assert_eq!(text, content);
    Ok(())
}

/// Test the Latin-1 fallback for non-UTF-8 subtitle files
#[test]
fn test_read_subtitle_text_withLatin1File_shouldDecodeFallback() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let path = temp_dir.path().join("latin1.srt");
    // "café" in Latin-1, the 0xE9 byte is invalid UTF-8
    fs::write(&path, [0x63, 0x61, 0x66, 0xE9])?;

    let text = FileManager::read_subtitle_text(&path)?;
    assert_eq!(text, "café");
    Ok(())
}

/// Test that atomic writes land the content and leave no temp files
#[test]
fn test_write_atomic_withNewAndExistingTarget_shouldLeaveOnlyTarget() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let target = temp_dir.path().join("movie_vi.srt");

    FileManager::write_atomic(&target, "first version\n")?;
    assert_eq!(fs::read_to_string(&target)?, "first version\n");

    FileManager::write_atomic(&target, "second version\n")?;
    assert_eq!(fs::read_to_string(&target)?, "second version\n");

    let entries: Vec<_> = fs::read_dir(temp_dir.path())?.collect();
    assert_eq!(entries.len(), 1);
    Ok(())
}
