/*!
 * Tests for the block wire codec
 */

use anyhow::Result;
use sublate::block_codec::{render_wire, Block, BlockCodec};
use sublate::subtitle_processor::SubtitleEntry;
use crate::common;

fn entries_with_texts(texts: &[&str]) -> Vec<SubtitleEntry> {
    texts
        .iter()
        .enumerate()
        .map(|(i, text)| {
            let start = (i as u64 + 1) * 1000;
            SubtitleEntry::new(i + 1, start, start + 800, text.to_string())
        })
        .collect()
}

/// Test that the default codec gives every entry its own block
#[test]
fn test_encode_withDefaultCodec_shouldMakeOneBlockPerEntry() {
    let entries = entries_with_texts(&["First", "Second", "Third"]);
    let document = BlockCodec::new().encode(&entries);

    assert_eq!(document.block_count(), 3);
    let tags: Vec<usize> = document.blocks.iter().map(|b| b.tag).collect();
    assert_eq!(tags, vec![1, 2, 3]);
    assert_eq!(document.blocks[0].text, "First");
    assert_eq!(document.blocks[2].text, "Third");
}

/// Test the exact wire shape for a single entry
#[test]
fn test_to_wire_withSingleEntry_shouldRenderDelimiters() {
    let entries = entries_with_texts(&["Hello"]);
    let wire = BlockCodec::new().encode(&entries).to_wire();

    assert_eq!(wire, "---BLOCK 1---\nHello\n---END BLOCK 1---");
}

/// Test deterministic bundling under a character budget
#[test]
fn test_encode_withCharBudget_shouldBundleConsecutiveEntries() {
    // 10 chars each; a 25-char budget fits two per block
    let entries = entries_with_texts(&["aaaaaaaaaa", "bbbbbbbbbb", "cccccccccc"]);
    let codec = BlockCodec::with_char_budget(25);

    let document = codec.encode(&entries);
    assert_eq!(document.block_count(), 2);
    assert_eq!(document.blocks[0].text, "aaaaaaaaaa\n\nbbbbbbbbbb");
    assert_eq!(document.blocks[1].text, "cccccccccc");

    // Same input and budget, same grouping
    let again = codec.encode(&entries);
    assert_eq!(again.block_count(), 2);
    assert_eq!(again.blocks[0].text, document.blocks[0].text);
}

/// Test that an oversized entry still gets a block of its own
#[test]
fn test_encode_withOversizedEntry_shouldNotSplitIt() {
    let entries = entries_with_texts(&["this text is far longer than the budget", "ok"]);
    let document = BlockCodec::with_char_budget(10).encode(&entries);

    assert_eq!(document.block_count(), 2);
    assert_eq!(document.blocks[0].text, "this text is far longer than the budget");
}

/// Test parsing a well-formed response
#[test]
fn test_parse_wire_withValidText_shouldReturnBlocks() -> Result<()> {
    let blocks = BlockCodec::parse_wire(common::SAMPLE_WIRE)?;

    assert_eq!(blocks.len(), 2);
    assert_eq!(blocks[0].tag, 1);
    assert_eq!(blocks[0].text, "Hello there.");
    assert_eq!(blocks[1].text, "General Kenobi!");
    Ok(())
}

/// Test that commentary outside block delimiters is ignored
#[test]
fn test_parse_wire_withChatterAroundBlocks_shouldIgnoreIt() -> Result<()> {
    let text = "Sure, here is the translation:\n---BLOCK 1---\nHello\n---END BLOCK 1---\nLet me know if you need more!";
    let blocks = BlockCodec::parse_wire(text)?;

    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0].text, "Hello");
    Ok(())
}

/// Test rejection of out-of-sequence tags
#[test]
fn test_parse_wire_withTagOutOfSequence_shouldFail() {
    let text = "---BLOCK 2---\nHello\n---END BLOCK 2---";
    let err = BlockCodec::parse_wire(text).unwrap_err();
    assert!(err.to_string().contains("out of sequence"));
}

/// Test rejection of a close tag that does not match its open tag
#[test]
fn test_parse_wire_withMismatchedCloseTag_shouldFail() {
    let text = "---BLOCK 1---\nHello\n---END BLOCK 2---";
    let err = BlockCodec::parse_wire(text).unwrap_err();
    assert!(err.to_string().contains("does not match"));
}

/// Test rejection of an unclosed block
#[test]
fn test_parse_wire_withMissingEnd_shouldFail() {
    let text = "---BLOCK 1---\nHello";
    let err = BlockCodec::parse_wire(text).unwrap_err();
    assert!(err.to_string().contains("never closed"));
}

/// Test rejection of an empty block body
#[test]
fn test_parse_wire_withEmptyBody_shouldFail() {
    let text = "---BLOCK 1---\n\n---END BLOCK 1---";
    let err = BlockCodec::parse_wire(text).unwrap_err();
    assert!(err.to_string().contains("empty body"));
}

/// Test rejection of text with no blocks at all
#[test]
fn test_parse_wire_withNoBlocks_shouldFail() {
    assert!(BlockCodec::parse_wire("nothing here").is_err());
    assert!(BlockCodec::parse_wire("").is_err());
}

/// Test that decode keeps numbering and timing from the original entries
#[test]
fn test_decode_withValidResponse_shouldPreserveTiming() -> Result<()> {
    let entries = entries_with_texts(&["First", "Second"]);
    let codec = BlockCodec::new();

    let candidate = "---BLOCK 1---\nPremier\n---END BLOCK 1---\n---BLOCK 2---\nDeuxième\n---END BLOCK 2---";
    let decoded = codec.decode(candidate, &entries)?;

    assert_eq!(decoded.len(), 2);
    assert_eq!(decoded[0].text, "Premier");
    assert_eq!(decoded[1].text, "Deuxième");
    for (original, translated) in entries.iter().zip(decoded.iter()) {
        assert_eq!(original.seq_num, translated.seq_num);
        assert_eq!(original.start_time_ms, translated.start_time_ms);
        assert_eq!(original.end_time_ms, translated.end_time_ms);
    }
    Ok(())
}

/// Test decoding bundled entries from blank-line separated segments
#[test]
fn test_decode_withBundledBlock_shouldSplitSegments() -> Result<()> {
    let entries = entries_with_texts(&["aaaaaaaaaa", "bbbbbbbbbb", "cccccccccc"]);
    let codec = BlockCodec::with_char_budget(25);

    let candidate = "---BLOCK 1---\nUn\n\nDeux\n---END BLOCK 1---\n---BLOCK 2---\nTrois\n---END BLOCK 2---";
    let decoded = codec.decode(candidate, &entries)?;

    let texts: Vec<&str> = decoded.iter().map(|e| e.text.as_str()).collect();
    assert_eq!(texts, vec!["Un", "Deux", "Trois"]);
    assert_eq!(decoded[1].start_time_ms, entries[1].start_time_ms);
    Ok(())
}

/// Test that a wrong segment count inside a bundled block is rejected
#[test]
fn test_decode_withSegmentCountMismatch_shouldFail() {
    let entries = entries_with_texts(&["aaaaaaaaaa", "bbbbbbbbbb"]);
    let codec = BlockCodec::with_char_budget(25);

    // Two entries bundled into block 1, but only one segment came back
    let candidate = "---BLOCK 1---\nMerged into one\n---END BLOCK 1---";
    let err = codec.decode(candidate, &entries).unwrap_err();
    assert!(err.to_string().contains("segments"));
}

/// Test that a block count mismatch is rejected
#[test]
fn test_decode_withBlockCountMismatch_shouldFail() {
    let entries = entries_with_texts(&["First", "Second"]);
    let candidate = "---BLOCK 1---\nOnly one\n---END BLOCK 1---";

    let err = BlockCodec::new().decode(candidate, &entries).unwrap_err();
    assert!(err.to_string().contains("count mismatch"));
}

/// Test that multi-line entry text survives a single-entry block
#[test]
fn test_decode_withMultiLineBody_shouldKeepInternalNewlines() -> Result<()> {
    let entries = entries_with_texts(&["one entry"]);
    let candidate = "---BLOCK 1---\nline one\nline two\n---END BLOCK 1---";

    let decoded = BlockCodec::new().decode(candidate, &entries)?;
    assert_eq!(decoded[0].text, "line one\nline two");
    Ok(())
}

/// Test the structural validation verdicts
#[test]
fn test_validate_structure_withVariedCandidates_shouldJudgeCorrectly() {
    let codec = BlockCodec::new();
    let entries = entries_with_texts(&["First", "Second"]);
    let wire = codec.encode(&entries).to_wire();

    // Identical structure, different bodies: valid
    let translated = "---BLOCK 1---\nUne\n---END BLOCK 1---\n---BLOCK 2---\nDeux\n---END BLOCK 2---";
    assert!(codec.validate_structure(&wire, translated));

    // Dropped block: invalid
    let short = "---BLOCK 1---\nUne\n---END BLOCK 1---";
    assert!(!codec.validate_structure(&wire, short));

    // Unparseable candidate: invalid
    assert!(!codec.validate_structure(&wire, "no delimiters at all"));

    // Unparseable original: invalid
    assert!(!codec.validate_structure("garbage", translated));
}

/// Test that structure_mismatch names the problem
#[test]
fn test_structure_mismatch_withDroppedBlock_shouldExplain() {
    let codec = BlockCodec::new();
    let entries = entries_with_texts(&["First", "Second"]);
    let wire = codec.encode(&entries).to_wire();

    let reason = codec
        .structure_mismatch(&wire, "---BLOCK 1---\nUne\n---END BLOCK 1---")
        .unwrap();
    assert!(reason.contains("block count mismatch"));

    let reason = codec.structure_mismatch(&wire, "not wire text").unwrap();
    assert!(reason.contains("response does not parse"));
}

/// Test render_wire on hand-built blocks
#[test]
fn test_render_wire_withTwoBlocks_shouldMatchParseInput() -> Result<()> {
    let blocks = vec![
        Block { tag: 1, text: "Hello there.".to_string() },
        Block { tag: 2, text: "General Kenobi!".to_string() },
    ];

    let wire = render_wire(&blocks);
    assert_eq!(wire, common::SAMPLE_WIRE);

    let reparsed = BlockCodec::parse_wire(&wire)?;
    assert_eq!(reparsed, blocks);
    Ok(())
}

/// Round-trip a generated track through encode and decode at several budgets
#[test]
fn test_codec_roundTrip_withGeneratedTrack_shouldPreserveEveryEntry() -> Result<()> {
    let texts: Vec<String> = (0..50)
        .map(|i| format!("Generated subtitle line number {} with some padding", i))
        .collect();
    let text_refs: Vec<&str> = texts.iter().map(|s| s.as_str()).collect();
    let entries = entries_with_texts(&text_refs);

    for budget in [0usize, 80, 500, 10_000] {
        let codec = if budget == 0 {
            BlockCodec::new()
        } else {
            BlockCodec::with_char_budget(budget)
        };

        let document = codec.encode(&entries);
        // A fake translation that keeps the structure: uppercase each block body
        let translated_blocks: Vec<Block> = document
            .blocks
            .iter()
            .map(|b| Block { tag: b.tag, text: b.text.to_uppercase() })
            .collect();
        let candidate = render_wire(&translated_blocks);

        let decoded = codec.decode(&candidate, &entries)?;
        assert_eq!(decoded.len(), entries.len());
        for (original, translated) in entries.iter().zip(decoded.iter()) {
            assert_eq!(translated.text, original.text.to_uppercase());
            assert_eq!(translated.start_time_ms, original.start_time_ms);
            assert_eq!(translated.seq_num, original.seq_num);
        }
    }
    Ok(())
}
