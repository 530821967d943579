/*!
 * Integration tests for the subtitle translation pipeline
 */

use std::fs;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use sublate::app_config::Config;
use sublate::errors::{ErrorKind, TranslationError};
use sublate::file_utils::FileManager;
use sublate::pipeline::{FileOutcome, SubtitlePipeline};
use sublate::provider_manager::ProviderManager;
use sublate::providers::TranslationProvider;
use sublate::providers::mock::MockProvider;
use sublate::subtitle_processor::SubtitleTrack;

use crate::common;

/// Pipeline over mock providers with the default configuration
fn pipeline_with(providers: Vec<Box<dyn TranslationProvider>>) -> SubtitlePipeline {
    SubtitlePipeline::new(ProviderManager::from_providers(providers), &Config::default())
}

/// Test the happy path from SRT input to written translation
#[tokio::test]
async fn test_translateFile_withWorkingProvider_shouldWriteTranslatedOutput() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_subtitle(temp_dir.path(), "movie.srt")?;

    let pipeline = pipeline_with(vec![Box::new(MockProvider::working())]);
    let outcome = pipeline.translate_file(&input).await?;

    match outcome {
        FileOutcome::Translated { provider, model, usage, .. } => {
            assert_eq!(provider, "mock");
            assert_eq!(model, "mock-model");
            assert!(usage.total_tokens > 0);
        }
        other => panic!("expected a translation, got {:?}", other),
    }

    let output = temp_dir.path().join("movie_vi.srt");
    assert!(output.exists());

    let translated = SubtitleTrack::from_srt_string(&fs::read_to_string(&output)?, output)?;
    assert_eq!(translated.len(), 3);
    assert_eq!(translated.entries[0].text, "[VI] This is a test subtitle.");
    assert_eq!(translated.entries[0].start_time_ms, 1000);
    assert_eq!(translated.entries[0].end_time_ms, 4000);
    assert_eq!(translated.entries[2].text, "[VI] For testing purposes.");
    Ok(())
}

/// Test that an existing output short-circuits the provider entirely
#[tokio::test]
async fn test_translateFile_withExistingOutput_shouldSkip() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_subtitle(temp_dir.path(), "movie.srt")?;

    let provider = MockProvider::working();
    let probe = provider.clone();
    let pipeline = pipeline_with(vec![Box::new(provider)]);

    assert!(matches!(
        pipeline.translate_file(&input).await?,
        FileOutcome::Translated { .. }
    ));
    let output = temp_dir.path().join("movie_vi.srt");
    let first_pass = fs::read_to_string(&output)?;

    assert!(matches!(
        pipeline.translate_file(&input).await?,
        FileOutcome::Skipped
    ));
    assert_eq!(probe.call_count(), 1);
    assert_eq!(fs::read_to_string(&output)?, first_pass);
    Ok(())
}

/// Test that force mode re-translates over an existing output
#[tokio::test]
async fn test_translateFile_withForce_shouldRetranslate() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_subtitle(temp_dir.path(), "movie.srt")?;
    let output = FileManager::output_path_for(&input, "_vi");
    fs::write(&output, "stale content")?;

    let provider = MockProvider::working();
    let probe = provider.clone();
    let pipeline = pipeline_with(vec![Box::new(provider)]).with_force(true);

    assert!(matches!(
        pipeline.translate_file(&input).await?,
        FileOutcome::Translated { .. }
    ));
    assert_eq!(probe.call_count(), 1);
    assert!(fs::read_to_string(&output)?.contains("[VI]"));
    Ok(())
}

/// Test that a missing input folds into a failed outcome
#[tokio::test]
async fn test_translateFile_withMissingInput_shouldFoldIntoFailed() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let absent = temp_dir.path().join("absent.srt");

    let pipeline = pipeline_with(vec![Box::new(MockProvider::working())]);
    match pipeline.translate_file(&absent).await? {
        FileOutcome::Failed { error } => {
            assert_eq!(error.kind(), ErrorKind::Translation);
        }
        other => panic!("expected a failure, got {:?}", other),
    }
    Ok(())
}

/// Test that a structurally broken reply fails validation for that provider
#[tokio::test]
async fn test_translateFile_withMalformedReply_shouldFailValidation() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_subtitle(temp_dir.path(), "movie.srt")?;

    let pipeline = pipeline_with(vec![Box::new(MockProvider::malformed())]);
    match pipeline.translate_file(&input).await? {
        FileOutcome::Failed { error } => {
            assert_eq!(error.kind(), ErrorKind::Validation);
            assert_eq!(error.provider(), Some("mock"));
        }
        other => panic!("expected a failure, got {:?}", other),
    }
    assert!(!temp_dir.path().join("movie_vi.srt").exists());
    Ok(())
}

/// Test that a provider rejecting the document falls back to the next one
#[tokio::test]
async fn test_translateFile_withRejectingPrimary_shouldFallBack() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_subtitle(temp_dir.path(), "movie.srt")?;

    let strict = MockProvider::rejecting().with_name("strict").with_priority(1);
    let backup = MockProvider::working().with_name("backup").with_priority(2);
    let pipeline = pipeline_with(vec![Box::new(strict), Box::new(backup)]);

    match pipeline.translate_file(&input).await? {
        FileOutcome::Translated { provider, .. } => assert_eq!(provider, "backup"),
        other => panic!("expected a translation, got {:?}", other),
    }
    Ok(())
}

/// Test that having no providers at all aborts instead of folding
#[tokio::test]
async fn test_translateFile_withEmptyManager_shouldPropagateNoProviders() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let input = common::create_test_subtitle(temp_dir.path(), "movie.srt")?;

    let pipeline = pipeline_with(Vec::new());
    let error = pipeline.translate_file(&input).await.unwrap_err();
    assert!(matches!(error, TranslationError::NoAvailableProviders));
    Ok(())
}

/// Test directory accounting across translated and skipped files
#[tokio::test]
async fn test_translateDirectory_withMixedTree_shouldAccountEachFile() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let root = temp_dir.path();
    common::create_test_subtitle(root, "one.srt")?;
    common::create_test_subtitle(root, "two.srt")?;
    common::create_test_subtitle(root, "three.srt")?;
    fs::write(root.join("one_vi.srt"), "already translated")?;

    let pipeline = pipeline_with(vec![Box::new(MockProvider::working())]);
    assert_eq!(pipeline.discover_inputs(root)?.len(), 3);

    let summary = pipeline.translate_directory(root).await?;
    assert_eq!(summary.total, 3);
    assert_eq!(summary.translated, 2);
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.failed, 0);
    assert!(summary.is_clean());
    assert!(summary.prompt_tokens > 0);
    assert!(summary.completion_tokens > 0);

    assert!(root.join("two_vi.srt").exists());
    assert!(root.join("three_vi.srt").exists());
    Ok(())
}

/// Test that one credential rejection does not cost more than one call
#[tokio::test]
async fn test_translateDirectory_withAuthFallback_shouldDisableOnce() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let root = temp_dir.path();
    common::create_test_subtitle(root, "one.srt")?;
    common::create_test_subtitle(root, "two.srt")?;

    let broken = MockProvider::auth_failing().with_name("broken").with_priority(1);
    let backup = MockProvider::working().with_name("backup").with_priority(2);
    let broken_probe = broken.clone();
    let pipeline = pipeline_with(vec![Box::new(broken), Box::new(backup)]);

    let summary = pipeline.translate_directory(root).await?;
    assert_eq!(summary.translated, 2);
    assert_eq!(summary.failed, 0);
    assert_eq!(broken_probe.call_count(), 1);
    Ok(())
}

/// Test that per-file failures keep the run going and are counted
#[tokio::test]
async fn test_translateDirectory_withAllProvidersFailing_shouldCountFailures() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let root = temp_dir.path();
    common::create_test_subtitle(root, "one.srt")?;
    common::create_test_subtitle(root, "two.srt")?;

    let broken = MockProvider::auth_failing().with_name("broken").with_priority(1);
    let flaky = MockProvider::connection_failing().with_name("offline").with_priority(2);
    let pipeline = pipeline_with(vec![Box::new(broken), Box::new(flaky)]);

    let summary = pipeline.translate_directory(root).await?;
    assert_eq!(summary.total, 2);
    assert_eq!(summary.failed, 2);
    assert!(!summary.is_clean());
    assert!(!root.join("one_vi.srt").exists());
    assert!(!root.join("two_vi.srt").exists());
    Ok(())
}

/// Test that losing the last provider mid-run aborts the run
#[tokio::test]
async fn test_translateDirectory_withLastProviderDisabled_shouldAbortRun() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let root = temp_dir.path();
    common::create_test_subtitle(root, "one.srt")?;
    common::create_test_subtitle(root, "two.srt")?;

    // The only provider gets disabled on the first file, the second file
    // then has nobody left to ask
    let pipeline = pipeline_with(vec![Box::new(MockProvider::auth_failing())]);
    let error = pipeline.translate_directory(root).await.unwrap_err();
    assert!(matches!(error, TranslationError::NoAvailableProviders));
    Ok(())
}

/// Test that a pre-set cancel flag stops the run before any work
#[tokio::test]
async fn test_translateDirectory_withCancelFlagSet_shouldStopBeforeWork() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let root = temp_dir.path();
    common::create_test_subtitle(root, "one.srt")?;
    common::create_test_subtitle(root, "two.srt")?;

    let provider = MockProvider::working();
    let probe = provider.clone();
    let pipeline = pipeline_with(vec![Box::new(provider)]);
    pipeline.cancel_flag().store(true, Ordering::SeqCst);

    let summary = pipeline.translate_directory(root).await?;
    assert_eq!(summary.total, 2);
    assert_eq!(summary.translated, 0);
    assert_eq!(probe.call_count(), 0);
    Ok(())
}

/// Test that the progress callback sees every file in order
#[tokio::test]
async fn test_translateDirectory_withProgressCallback_shouldReportEachFile() -> Result<()> {
    let temp_dir = common::create_temp_dir()?;
    let root = temp_dir.path();
    common::create_test_subtitle(root, "one.srt")?;
    common::create_test_subtitle(root, "two.srt")?;

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let pipeline = pipeline_with(vec![Box::new(MockProvider::working())])
        .with_progress(move |done, total| sink.lock().unwrap().push((done, total)));

    pipeline.translate_directory(root).await?;
    assert_eq!(*seen.lock().unwrap(), vec![(1, 2), (2, 2)]);
    Ok(())
}
