/*!
 * Block wire codec for the LLM round-trip.
 *
 * Subtitle entries are wrapped into numbered blocks before being sent to a
 * provider and unwrapped afterwards. The wire shape is
 * `---BLOCK k---` / body / `---END BLOCK k---` with tags dense from 1.
 * Timing and numbering never cross the wire; only block bodies are trusted
 * on the way back and they are re-attached to the original entries.
 */

use anyhow::{anyhow, Result};
use log::warn;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::subtitle_processor::SubtitleEntry;

static BLOCK_OPEN_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^---BLOCK (\d+)---$").unwrap()
});

static BLOCK_CLOSE_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^---END BLOCK (\d+)---$").unwrap()
});

/// One numbered translation unit on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Block {
    /// Tag, dense from 1
    pub tag: usize,
    /// Body text; bundled entries are separated by one blank line
    pub text: String,
}

/// An encoded subtitle track: ordered blocks plus the entry grouping that
/// produced them, kept so the translated bodies can be split back up.
#[derive(Debug, Clone)]
pub struct BlockDocument {
    /// Blocks in wire order
    pub blocks: Vec<Block>,
    /// How many consecutive entries each block bundles
    entries_per_block: Vec<usize>,
}

impl BlockDocument {
    /// Number of blocks.
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Serialize to the wire form sent to the provider.
    pub fn to_wire(&self) -> String {
        render_wire(&self.blocks)
    }
}

/// Serialize blocks to wire form.
pub fn render_wire(blocks: &[Block]) -> String {
    let mut out = String::new();
    for (i, block) in blocks.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        out.push_str(&format!("---BLOCK {}---\n", block.tag));
        out.push_str(&block.text);
        out.push('\n');
        out.push_str(&format!("---END BLOCK {}---", block.tag));
    }
    out
}

/// Stateless encoder/decoder between subtitle entries and block wire text.
///
/// The grouping is deterministic: with a zero character budget every entry
/// gets its own block; otherwise consecutive entries are bundled while their
/// combined text stays within the budget (an oversized entry still gets a
/// block of its own). Same input and budget always produce the same blocks,
/// which is what lets `decode` recompute the grouping from the original
/// entries instead of carrying state.
#[derive(Debug, Clone, Copy)]
pub struct BlockCodec {
    max_block_chars: usize,
}

impl BlockCodec {
    /// Codec with the default one-entry-per-block grouping.
    pub fn new() -> Self {
        BlockCodec { max_block_chars: 0 }
    }

    /// Codec bundling consecutive entries up to `max_chars` combined text.
    pub fn with_char_budget(max_chars: usize) -> Self {
        BlockCodec {
            max_block_chars: max_chars,
        }
    }

    /// Partition entries into consecutive groups per the configured budget.
    fn partition(&self, entries: &[SubtitleEntry]) -> Vec<usize> {
        if self.max_block_chars == 0 {
            return vec![1; entries.len()];
        }

        let mut groups = Vec::new();
        let mut current_len = 0usize;
        let mut current_count = 0usize;

        for entry in entries {
            let entry_len = entry.text.chars().count();
            if current_count > 0 && current_len + entry_len > self.max_block_chars {
                groups.push(current_count);
                current_count = 0;
                current_len = 0;
            }
            current_count += 1;
            current_len += entry_len;
        }
        if current_count > 0 {
            groups.push(current_count);
        }

        groups
    }

    /// Encode entries into a block document ready for the wire.
    pub fn encode(&self, entries: &[SubtitleEntry]) -> BlockDocument {
        let grouping = self.partition(entries);
        let mut blocks = Vec::with_capacity(grouping.len());
        let mut cursor = 0usize;

        for (i, &count) in grouping.iter().enumerate() {
            let group = &entries[cursor..cursor + count];
            let text = group
                .iter()
                .map(|e| e.text.as_str())
                .collect::<Vec<_>>()
                .join("\n\n");
            blocks.push(Block { tag: i + 1, text });
            cursor += count;
        }

        BlockDocument {
            blocks,
            entries_per_block: grouping,
        }
    }

    /// Parse wire text into blocks.
    ///
    /// Rejects: no blocks, a tag sequence that is not dense from 1, a close
    /// tag that does not match its open tag, an unclosed block, an empty
    /// body. Content outside any block (chatter before the first tag or
    /// between blocks) is ignored with a warning; block bodies are the only
    /// part of the response that is trusted anyway.
    pub fn parse_wire(text: &str) -> Result<Vec<Block>> {
        let mut blocks: Vec<Block> = Vec::new();
        let mut open_tag: Option<usize> = None;
        let mut body_lines: Vec<&str> = Vec::new();

        for raw_line in text.lines() {
            let line = raw_line.trim();

            if let Some(caps) = BLOCK_OPEN_REGEX.captures(line) {
                if let Some(tag) = open_tag {
                    return Err(anyhow!(
                        "Block {} reopened before block {} was closed",
                        &caps[1],
                        tag
                    ));
                }
                let tag: usize = caps[1].parse()?;
                let expected = blocks.len() + 1;
                if tag != expected {
                    return Err(anyhow!(
                        "Block tag {} out of sequence, expected {}",
                        tag,
                        expected
                    ));
                }
                open_tag = Some(tag);
                body_lines.clear();
                continue;
            }

            if let Some(caps) = BLOCK_CLOSE_REGEX.captures(line) {
                let close_tag: usize = caps[1].parse()?;
                match open_tag {
                    Some(tag) if tag == close_tag => {
                        let text = body_lines.join("\n").trim().to_string();
                        if text.is_empty() {
                            return Err(anyhow!("Block {} has an empty body", tag));
                        }
                        blocks.push(Block { tag, text });
                        open_tag = None;
                    }
                    Some(tag) => {
                        return Err(anyhow!(
                            "Close tag {} does not match open block {}",
                            close_tag,
                            tag
                        ));
                    }
                    None => {
                        return Err(anyhow!("Close tag {} without an open block", close_tag));
                    }
                }
                continue;
            }

            if open_tag.is_some() {
                body_lines.push(raw_line.trim_end_matches('\r'));
            } else if !line.is_empty() {
                warn!("Ignoring content outside block delimiters: {}", line);
            }
        }

        if let Some(tag) = open_tag {
            return Err(anyhow!("Block {} was never closed", tag));
        }
        if blocks.is_empty() {
            return Err(anyhow!("No blocks found in text"));
        }

        Ok(blocks)
    }

    /// Decode a translated wire response back onto the original entries.
    ///
    /// The grouping is recomputed from `original` (same codec, same budget),
    /// the candidate is parsed, counts are asserted, and each translated
    /// body is split back into per-entry texts. Numbering and timing are
    /// taken from `original` untouched.
    pub fn decode(
        &self,
        candidate_wire: &str,
        original: &[SubtitleEntry],
    ) -> Result<Vec<SubtitleEntry>> {
        let grouping = self.partition(original);
        let blocks = Self::parse_wire(candidate_wire)?;

        if blocks.len() != grouping.len() {
            return Err(anyhow!(
                "Block count mismatch: response has {}, input had {}",
                blocks.len(),
                grouping.len()
            ));
        }

        let mut translated = Vec::with_capacity(original.len());
        let mut cursor = 0usize;

        for (block, &count) in blocks.iter().zip(grouping.iter()) {
            let group = &original[cursor..cursor + count];
            if count == 1 {
                translated.push(group[0].with_text(block.text.clone()));
            } else {
                let segments: Vec<&str> = block
                    .text
                    .split("\n\n")
                    .map(|s| s.trim())
                    .filter(|s| !s.is_empty())
                    .collect();
                if segments.len() != count {
                    return Err(anyhow!(
                        "Block {} bundles {} entries but the response has {} segments",
                        block.tag,
                        count,
                        segments.len()
                    ));
                }
                for (entry, segment) in group.iter().zip(segments.iter()) {
                    translated.push(entry.with_text(segment.to_string()));
                }
            }
            cursor += count;
        }

        Ok(translated)
    }

    /// True iff both texts parse, the tag sequences are identical and every
    /// candidate block has a non-empty body.
    pub fn validate_structure(&self, original_wire: &str, candidate_wire: &str) -> bool {
        self.structure_mismatch(original_wire, candidate_wire).is_none()
    }

    /// Why `candidate_wire` does not structurally match `original_wire`,
    /// or None when it does. Used to build validation diagnostics.
    pub fn structure_mismatch(
        &self,
        original_wire: &str,
        candidate_wire: &str,
    ) -> Option<String> {
        let original = match Self::parse_wire(original_wire) {
            Ok(blocks) => blocks,
            Err(e) => return Some(format!("input does not parse: {}", e)),
        };
        let candidate = match Self::parse_wire(candidate_wire) {
            Ok(blocks) => blocks,
            Err(e) => return Some(format!("response does not parse: {}", e)),
        };

        if original.len() != candidate.len() {
            return Some(format!(
                "block count mismatch: input {}, response {}",
                original.len(),
                candidate.len()
            ));
        }

        for (ours, theirs) in original.iter().zip(candidate.iter()) {
            if ours.tag != theirs.tag {
                return Some(format!(
                    "tag mismatch: input block {}, response block {}",
                    ours.tag, theirs.tag
                ));
            }
        }

        None
    }
}

impl Default for BlockCodec {
    fn default() -> Self {
        Self::new()
    }
}
