/*!
 * Subtitle translation pipeline.
 *
 * File and directory orchestration: read the SRT, wrap it into block wire
 * form, push it through the provider manager, unwrap the reply onto the
 * original timing, and write the output atomically next to the input.
 * Directory runs are sequential and cooperatively cancellable between files.
 */

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};

use crate::app_config::Config;
use crate::block_codec::BlockCodec;
use crate::errors::{ErrorKind, TranslationError};
use crate::file_utils::FileManager;
use crate::provider_manager::ProviderManager;
use crate::rate_limiter::TokenUsage;
use crate::subtitle_processor::SubtitleTrack;

/// Outcome of one file
#[derive(Debug)]
pub enum FileOutcome {
    /// File was translated and written
    Translated {
        /// Provider that produced the translation
        provider: String,
        /// Model that produced the translation
        model: String,
        /// Wall-clock time for the whole file
        elapsed: Duration,
        /// Token usage reported by the server
        usage: TokenUsage,
    },
    /// The output file already existed
    Skipped,
    /// Translation or I/O failed; a directory run continues past this
    Failed {
        /// What went wrong
        error: TranslationError,
    },
}

/// Counters for a directory run
#[derive(Debug, Default, Clone)]
pub struct RunSummary {
    /// Files enumerated
    pub total: usize,
    /// Files translated and written
    pub translated: usize,
    /// Files whose output already existed
    pub skipped: usize,
    /// Files that failed
    pub failed: usize,
    /// Cumulative prompt tokens across translated files
    pub prompt_tokens: u64,
    /// Cumulative completion tokens across translated files
    pub completion_tokens: u64,
}

impl RunSummary {
    /// True when no file failed.
    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }
}

type ProgressFn = Box<dyn Fn(usize, usize) + Send + Sync>;

/// File and directory translation driver
pub struct SubtitlePipeline {
    /// Fallback dispatcher over the configured providers
    manager: ProviderManager,
    /// Wire codec with the configured grouping budget
    codec: BlockCodec,
    /// Suffix appended to output stems
    output_suffix: String,
    /// Re-translate even when the output exists
    force: bool,
    /// Non-blocking progress callback (done, total)
    progress: Option<ProgressFn>,
    /// Cooperative cancellation flag checked between files
    cancel: Arc<AtomicBool>,
}

impl SubtitlePipeline {
    /// Create a pipeline over an already-built manager.
    pub fn new(manager: ProviderManager, config: &Config) -> Self {
        let codec = if config.block_char_budget > 0 {
            BlockCodec::with_char_budget(config.block_char_budget)
        } else {
            BlockCodec::new()
        };
        Self {
            manager,
            codec,
            output_suffix: config.output_suffix.clone(),
            force: false,
            progress: None,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Re-translate files whose output already exists
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Install a progress callback, invoked after every file of a
    /// directory run. Must not block.
    pub fn with_progress(mut self, progress: impl Fn(usize, usize) + Send + Sync + 'static) -> Self {
        self.progress = Some(Box::new(progress));
        self
    }

    /// Handle the caller can flip to stop between files.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    /// The manager driving this pipeline.
    pub fn manager(&self) -> &ProviderManager {
        &self.manager
    }

    /// Translate one file.
    ///
    /// Returns `Err` only for kinds that abort a whole run (configuration,
    /// no available providers); everything else is folded into the outcome
    /// so a directory pass can keep going.
    pub async fn translate_file(&self, path: &Path) -> Result<FileOutcome, TranslationError> {
        let output_path = FileManager::output_path_for(path, &self.output_suffix);
        if !self.force && FileManager::file_exists(&output_path) {
            info!(
                "Skipping {}, translation already exists",
                path.display()
            );
            return Ok(FileOutcome::Skipped);
        }

        match self.translate_into(path, &output_path).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => match e.kind() {
                ErrorKind::Configuration | ErrorKind::NoAvailableProviders => Err(e),
                _ => {
                    error!("Failed to translate {}: {}", path.display(), e);
                    Ok(FileOutcome::Failed { error: e })
                }
            },
        }
    }

    async fn translate_into(
        &self,
        path: &Path,
        output_path: &Path,
    ) -> Result<FileOutcome, TranslationError> {
        let started = Instant::now();

        let content = FileManager::read_subtitle_text(path)
            .map_err(|e| TranslationError::File(e.to_string()))?;
        let track = SubtitleTrack::from_srt_string(&content, path.to_path_buf())
            .map_err(|e| TranslationError::File(e.to_string()))?;

        let document = self.codec.encode(&track.entries);
        debug!(
            "Encoded {} entries of {} into {} blocks",
            track.len(),
            path.display(),
            document.block_count()
        );

        let response = self.manager.translate(&document.to_wire()).await?;

        let entries = self
            .codec
            .decode(&response.text, &track.entries)
            .map_err(|e| TranslationError::Validation {
                provider: response.provider.clone(),
                detail: e.to_string(),
            })?;
        let translated = SubtitleTrack {
            source_file: path.to_path_buf(),
            entries,
        };

        FileManager::write_atomic(output_path, &translated.to_srt_string())
            .map_err(|e| TranslationError::File(e.to_string()))?;

        let elapsed = started.elapsed();
        info!(
            "Translated {} via {} ({}) in {:.1}s, {} tokens",
            path.display(),
            response.provider,
            response.model,
            elapsed.as_secs_f64(),
            response.usage.total_tokens
        );

        Ok(FileOutcome::Translated {
            provider: response.provider,
            model: response.model,
            elapsed,
            usage: response.usage,
        })
    }

    /// Translate every `.srt` file under `root`, sequentially.
    ///
    /// Files already carrying the output suffix are not inputs, which is
    /// what keeps a second run over the same tree all-skips.
    pub async fn translate_directory(&self, root: &Path) -> Result<RunSummary, TranslationError> {
        let inputs = FileManager::find_srt_inputs(root, &self.output_suffix)
            .map_err(|e| TranslationError::File(e.to_string()))?;

        let mut summary = RunSummary {
            total: inputs.len(),
            ..RunSummary::default()
        };
        info!("Found {} subtitle file(s) under {}", inputs.len(), root.display());

        for (index, input) in inputs.iter().enumerate() {
            if self.cancel.load(Ordering::SeqCst) {
                warn!(
                    "Cancelled after {} of {} file(s)",
                    index,
                    inputs.len()
                );
                break;
            }

            match self.translate_file(input).await? {
                FileOutcome::Translated { usage, .. } => {
                    summary.translated += 1;
                    summary.prompt_tokens += usage.prompt_tokens;
                    summary.completion_tokens += usage.completion_tokens;
                }
                FileOutcome::Skipped => summary.skipped += 1,
                FileOutcome::Failed { .. } => summary.failed += 1,
            }

            if let Some(progress) = &self.progress {
                progress(index + 1, inputs.len());
            }
        }

        info!(
            "Directory run complete: {} translated, {} skipped, {} failed of {} file(s), {} prompt + {} completion tokens",
            summary.translated,
            summary.skipped,
            summary.failed,
            summary.total,
            summary.prompt_tokens,
            summary.completion_tokens
        );

        Ok(summary)
    }

    /// List the `.srt` inputs a directory run would process.
    pub fn discover_inputs(&self, root: &Path) -> Result<Vec<PathBuf>, TranslationError> {
        FileManager::find_srt_inputs(root, &self.output_suffix)
            .map_err(|e| TranslationError::File(e.to_string()))
    }
}

impl std::fmt::Debug for SubtitlePipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubtitlePipeline")
            .field("manager", &self.manager)
            .field("output_suffix", &self.output_suffix)
            .field("force", &self.force)
            .finish_non_exhaustive()
    }
}
