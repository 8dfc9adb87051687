#![forbid(unsafe_code)]

//! Conversion between message text and 512-byte data blocks.
//!
//! Text is stored block after block, followed by the terminator byte and
//! zero padding. A message whose text ends exactly on a block boundary is
//! stored without a terminator, unless its final block already contains a
//! terminator byte of its own; then one extra block carrying just the
//! terminator is added so the text reads back unchanged.

use crate::types::{BLOCK_SIZE, TERMINATOR};

/// Lays `text` out as zero-padded blocks, terminator included.
///
/// The result is never empty and its length is a multiple of [`BLOCK_SIZE`].
pub fn encode_message(text: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(text.len() + BLOCK_SIZE);
    buf.extend_from_slice(text);
    if needs_terminator(text) {
        buf.push(TERMINATOR);
    }
    pad_to_block(&mut buf);
    buf
}

/// Number of blocks `encode_message(text)` occupies.
pub fn blocks_needed(text: &[u8]) -> usize {
    let stored = text.len() + usize::from(needs_terminator(text));
    stored.div_ceil(BLOCK_SIZE).max(1)
}

fn needs_terminator(text: &[u8]) -> bool {
    if text.is_empty() || text.len() % BLOCK_SIZE != 0 {
        return true;
    }
    text[text.len() - BLOCK_SIZE..].contains(&TERMINATOR)
}

fn pad_to_block(buf: &mut Vec<u8>) {
    let padded = buf.len().div_ceil(BLOCK_SIZE).max(1) * BLOCK_SIZE;
    buf.resize(padded, 0);
}

/// Strips the terminator and padding from the concatenated blocks of a chain.
///
/// Only a terminator inside the final block counts; terminator bytes earlier
/// in the text are kept.
pub fn decode_message(mut raw: Vec<u8>) -> Vec<u8> {
    let final_start = raw.len().saturating_sub(BLOCK_SIZE);
    if let Some(pos) = raw[final_start..].iter().rposition(|&b| b == TERMINATOR) {
        raw.truncate(final_start + pos);
    }
    raw
}

/// Formats one appended line: the text, CRLF and the terminator.
pub fn format_line(line: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(line.len() + 3);
    out.extend_from_slice(line);
    out.extend_from_slice(b"\r\n");
    out.push(TERMINATOR);
    out
}

/// Offset inside a tail block where appended text goes.
///
/// That is the last terminator, or the end of the block when it has none: a
/// block-aligned text is stored without terminator and every byte of its
/// tail block, trailing NULs included, belongs to the text.
pub fn splice_offset(tail: &[u8]) -> usize {
    tail.iter()
        .rposition(|&b| b == TERMINATOR)
        .unwrap_or(tail.len())
}

/// Splices a formatted line into a tail block.
///
/// Returns the rewritten tail block followed by any overflow blocks, each
/// exactly [`BLOCK_SIZE`] bytes.
pub fn splice_line(tail: &[u8], formatted: &[u8]) -> Vec<u8> {
    let at = splice_offset(tail);
    let mut buf = Vec::with_capacity(at + formatted.len() + BLOCK_SIZE);
    buf.extend_from_slice(&tail[..at]);
    buf.extend_from_slice(formatted);
    pad_to_block(&mut buf);
    buf
}
