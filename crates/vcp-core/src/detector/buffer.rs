//! Stream buffer: accumulates text deltas and extracts complete blocks

use std::collections::HashSet;
use std::sync::Arc;

use crate::logging::Logger;
use crate::protocol::{find_block_start, partial_marker_suffix, scan_blocks, BlockScan, BLOCK_END};
use crate::types::{RawSpan, ToolRequest};

/// What remains of a buffer at stream end
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Finalized {
    /// Prose not yet released
    pub visible: String,
    /// Unterminated block text that was dropped
    pub discarded: Option<String>,
}

/// Growing buffer of not-yet-finalized model text
///
/// Holds zero or more complete blocks followed by at most one partial block.
/// Text outside matched spans is never altered or reordered.
pub struct StreamBuffer {
    text: String,
    /// Offset past the last drained block; blocks before it are never drained again
    drained_upto: usize,
    /// Spans drained but not yet stripped
    processed: Vec<RawSpan>,
    /// Raw text of every block run since the last reset
    seen: HashSet<String>,
    /// Released text so far ends a line (or nothing was released yet)
    released_line_start: bool,
    /// A stripped block ended the buffer; swallow the line break that follows
    absorb_newline: bool,
    id_prefix: String,
    next_id: usize,
    logger: Arc<dyn Logger>,
}

impl StreamBuffer {
    /// Create an empty buffer
    pub fn new(logger: Arc<dyn Logger>) -> Self {
        Self {
            text: String::new(),
            drained_upto: 0,
            processed: Vec::new(),
            seen: HashSet::new(),
            released_line_start: true,
            absorb_newline: false,
            id_prefix: "vcp".to_string(),
            next_id: 0,
            logger,
        }
    }

    /// Prefix for generated request ids (`<prefix>-<n>`)
    pub fn with_id_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.id_prefix = prefix.into();
        self
    }

    /// Switch to a new id prefix; numbering restarts at 1
    pub fn set_id_prefix(&mut self, prefix: impl Into<String>) {
        self.id_prefix = prefix.into();
        self.next_id = 0;
    }

    /// Current buffered text
    pub fn as_str(&self) -> &str {
        &self.text
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// Append a text delta
    pub fn append(&mut self, delta: &str) {
        if delta.is_empty() {
            return;
        }
        let delta = if std::mem::take(&mut self.absorb_newline) {
            strip_line_break(delta)
        } else {
            delta
        };
        self.text.push_str(delta);
    }

    /// Whether at least one undrained complete block is present
    pub fn has_complete_block(&self) -> bool {
        let pending = &self.text[self.drained_upto..];
        if !pending.contains(BLOCK_END) {
            return false;
        }
        scan_blocks(&self.text, self.drained_upto)
            .iter()
            .any(|scan| matches!(scan, BlockScan::Complete { .. }))
    }

    /// Parse every complete block not drained before, in document order
    ///
    /// Malformed blocks (no usable `tool_name`) and byte-identical repeats
    /// of a block already run since the last reset are marked for stripping
    /// but produce no request.
    pub fn drain_complete_blocks(&mut self) -> Vec<ToolRequest> {
        let mut requests = Vec::new();

        for scan in scan_blocks(&self.text, self.drained_upto) {
            let BlockScan::Complete { span, fields } = scan else {
                break;
            };
            self.processed.push(span);
            self.drained_upto = span.end;

            let raw = self.text[span.start..span.end].to_string();
            let Some(tool_name) = fields.valid_tool_name().map(str::to_string) else {
                self.logger.warn(&format!(
                    "[StreamBuffer] Discarding tool request without tool_name at {}..{}",
                    span.start, span.end
                ));
                continue;
            };
            if !self.seen.insert(raw) {
                self.logger.debug(&format!(
                    "[StreamBuffer] Skipping duplicate block for {} at {}..{}",
                    tool_name, span.start, span.end
                ));
                continue;
            }
            self.next_id += 1;
            let id = format!("{}-{}", self.id_prefix, self.next_id);
            requests.push(ToolRequest::textual(id, tool_name, fields.params, span));
        }

        if !requests.is_empty() {
            self.logger.debug(&format!(
                "[StreamBuffer] Drained {} tool request(s)",
                requests.len()
            ));
        }
        requests
    }

    /// Remove exactly the drained spans, keeping surrounding prose contiguous
    ///
    /// A block that occupies whole lines also takes its trailing line break,
    /// so no blank line is left where it stood.
    pub fn strip_processed(&mut self) {
        if self.processed.is_empty() {
            return;
        }

        let mut kept = String::with_capacity(self.text.len());
        let mut cursor = 0;
        for span in &self.processed {
            kept.push_str(&self.text[cursor..span.start]);
            cursor = span.end;

            let at_line_start = if kept.is_empty() {
                self.released_line_start
            } else {
                kept.ends_with('\n')
            };
            if at_line_start {
                let rest = &self.text[cursor..];
                if rest.is_empty() {
                    self.absorb_newline = true;
                } else {
                    cursor += rest.len() - strip_line_break(rest).len();
                }
            }
        }
        self.drained_upto = kept.len();
        kept.push_str(&self.text[cursor..]);

        self.text = kept;
        self.processed.clear();
    }

    /// Release prose that can no longer be part of a block
    ///
    /// Everything before the first opening marker is released, except a
    /// trailing fragment that may still grow into a marker. Returns an empty
    /// string while drained spans await stripping.
    pub fn take_visible(&mut self) -> String {
        if !self.processed.is_empty() {
            return String::new();
        }

        let cut = match find_block_start(&self.text, 0) {
            Some(start) => start,
            None => self.text.len() - partial_marker_suffix(&self.text),
        };
        let visible: String = self.text.drain(..cut).collect();
        self.drained_upto = self.drained_upto.saturating_sub(cut);
        if !visible.is_empty() {
            self.released_line_start = visible.ends_with('\n');
        }
        visible
    }

    /// Flush at stream end
    ///
    /// Call after the last drain. An unterminated block is dropped with a
    /// warning; all other text is returned for display.
    pub fn finalize(&mut self) -> Finalized {
        self.strip_processed();

        let incomplete = scan_blocks(&self.text, self.drained_upto)
            .into_iter()
            .find_map(|scan| match scan {
                BlockScan::Incomplete { start } => Some(start),
                BlockScan::Complete { .. } => None,
            });

        let text = std::mem::take(&mut self.text);
        self.drained_upto = 0;

        match incomplete {
            Some(start) => {
                let discarded = text[start..].to_string();
                self.logger.warn(&format!(
                    "[StreamBuffer] Discarding unterminated tool request ({} bytes) at stream end",
                    discarded.len()
                ));
                Finalized {
                    visible: text[..start].to_string(),
                    discarded: Some(discarded),
                }
            }
            None => Finalized {
                visible: text,
                discarded: None,
            },
        }
    }

    /// Clear all state for a new turn
    pub fn reset(&mut self) {
        self.text.clear();
        self.drained_upto = 0;
        self.processed.clear();
        self.seen.clear();
        self.released_line_start = true;
        self.absorb_newline = false;
        self.next_id = 0;
    }
}

fn strip_line_break(text: &str) -> &str {
    text.strip_prefix("\r\n")
        .or_else(|| text.strip_prefix('\n'))
        .unwrap_or(text)
}

impl std::fmt::Debug for StreamBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamBuffer")
            .field("len", &self.text.len())
            .field("drained_upto", &self.drained_upto)
            .field("processed", &self.processed.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::{LogLevel, MemoryLogger, NoOpLogger};
    use crate::protocol::{BLOCK_START, VALUE_END, VALUE_START};

    const EXAMPLE: &str = "Weather is nice.\n<<<[TOOL_REQUEST]>>>\ntool_name:「始」GetTime「末」\n<<<[END_TOOL_REQUEST]>>>\nSee you.";

    fn buffer() -> StreamBuffer {
        StreamBuffer::new(Arc::new(NoOpLogger))
    }

    fn block(name: &str) -> String {
        format!("<<<[TOOL_REQUEST]>>>\ntool_name:「始」{}「末」\n<<<[END_TOOL_REQUEST]>>>", name)
    }

    /// Feed chunks the way the engine does and collect visible text + requests
    fn run(chunks: &[&str]) -> (String, Vec<ToolRequest>) {
        let mut buf = buffer();
        let mut visible = String::new();
        let mut requests = Vec::new();
        for chunk in chunks {
            buf.append(chunk);
            visible.push_str(&buf.take_visible());
            if buf.has_complete_block() {
                requests.extend(buf.drain_complete_blocks());
                buf.strip_processed();
                visible.push_str(&buf.take_visible());
            }
        }
        visible.push_str(&buf.finalize().visible);
        (visible, requests)
    }

    #[test]
    fn test_worked_example() {
        let (visible, requests) = run(&[EXAMPLE]);
        assert_eq!(visible, "Weather is nice.\nSee you.");
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].tool_name, "GetTime");
        assert!(requests[0].params.is_empty());
    }

    #[test]
    fn test_strip_keeps_prose_contiguous() {
        let mut buf = buffer();
        buf.append(EXAMPLE);
        let requests = buf.drain_complete_blocks();
        buf.strip_processed();

        assert_eq!(requests.len(), 1);
        assert_eq!(buf.as_str(), "Weather is nice.\nSee you.");
    }

    #[test]
    fn test_order_preservation() {
        let text = format!("A {} {} C", block("First"), block("Second"));
        let mut buf = buffer();
        buf.append(&text);
        let names: Vec<_> = buf
            .drain_complete_blocks()
            .into_iter()
            .map(|r| r.tool_name)
            .collect();
        buf.strip_processed();

        assert_eq!(names, vec!["First", "Second"]);
        assert_eq!(buf.as_str(), "A   C");
    }

    #[test]
    fn test_drain_is_idempotent_without_strip() {
        let mut buf = buffer();
        buf.append(&block("Once"));
        assert!(buf.has_complete_block());
        assert_eq!(buf.drain_complete_blocks().len(), 1);
        assert!(!buf.has_complete_block());
        assert!(buf.drain_complete_blocks().is_empty());

        buf.strip_processed();
        assert!(buf.is_empty());
    }

    #[test]
    fn test_identical_blocks_in_one_pass_execute_once() {
        let text = format!("{}{}", block("Same"), block("Same"));
        let mut buf = buffer();
        buf.append(&text);
        let requests = buf.drain_complete_blocks();
        buf.strip_processed();

        assert_eq!(requests.len(), 1);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_same_block_in_later_pass_is_skipped() {
        let mut buf = buffer();
        buf.append(&format!("a {}", block("Again")));
        assert_eq!(buf.drain_complete_blocks().len(), 1);
        buf.strip_processed();

        buf.append(&format!(" b {} c", block("Again")));
        assert!(buf.has_complete_block());
        assert!(buf.drain_complete_blocks().is_empty());
        buf.strip_processed();
        assert_eq!(buf.as_str(), "a  b  c");

        buf.append(&block("Other"));
        let other = buf.drain_complete_blocks();
        assert_eq!(other.len(), 1);
        assert_eq!(other[0].id, "vcp-2");
    }

    #[test]
    fn test_reset_forgets_seen_blocks() {
        let mut buf = buffer();
        buf.append(&block("Again"));
        assert_eq!(buf.drain_complete_blocks().len(), 1);

        buf.reset();
        buf.append(&block("Again"));
        assert_eq!(buf.drain_complete_blocks().len(), 1);
    }

    fn assert_split_invariant(text: &str) -> String {
        let (whole_visible, whole) = run(&[text]);
        let expected: Vec<_> = whole.iter().map(|r| (&r.tool_name, &r.params)).collect();

        for (at, _) in text.char_indices().skip(1) {
            let (visible, requests) = run(&[&text[..at], &text[at..]]);
            assert_eq!(visible, whole_visible, "split at {}", at);
            let got: Vec<_> = requests.iter().map(|r| (&r.tool_name, &r.params)).collect();
            assert_eq!(got, expected, "split at {}", at);
        }

        let pieces: Vec<String> = text.chars().map(|c| c.to_string()).collect();
        let refs: Vec<&str> = pieces.iter().map(String::as_str).collect();
        let (visible, requests) = run(&refs);
        assert_eq!(visible, whole_visible, "char by char");
        assert_eq!(requests.len(), whole.len());

        whole_visible
    }

    #[test]
    fn test_partial_chunk_invariance() {
        let write = format!(
            "{}\ntool_name:{}Write{},\nbody:{}x, y\nz{}\n<<<[END_TOOL_REQUEST]>>>",
            BLOCK_START, VALUE_START, VALUE_END, VALUE_START, VALUE_END
        );
        let text = format!("Intro {} mid {} outro", write, block("Read"));
        assert_eq!(assert_split_invariant(&text), "Intro  mid  outro");

        assert_eq!(assert_split_invariant(EXAMPLE), "Weather is nice.\nSee you.");

        let stacked = format!("Steps:\n{}\n{}\nDone", block("A"), block("B"));
        assert_eq!(assert_split_invariant(&stacked), "Steps:\nDone");

        let twice = format!("x {}{} y", block("Same"), block("Same"));
        assert_eq!(assert_split_invariant(&twice), "x  y");
        assert_eq!(run(&[&twice]).1.len(), 1);
    }

    #[test]
    fn test_inline_block_keeps_line_break() {
        let (visible, requests) = run(&[&format!("Call {}\nnext", block("X"))]);
        assert_eq!(requests.len(), 1);
        assert_eq!(visible, "Call \nnext");
    }

    #[test]
    fn test_partial_marker_held_back() {
        let mut buf = buffer();
        buf.append("Hello <<<[TOOL_");
        assert_eq!(buf.take_visible(), "Hello ");
        buf.append("REQ");
        assert_eq!(buf.take_visible(), "");
        buf.append("UIRES more");
        assert_eq!(buf.take_visible(), "<<<[TOOL_REQUIRES more");
    }

    #[test]
    fn test_malformed_block_is_stripped_and_logged() {
        let logger = Arc::new(MemoryLogger::new());
        let mut buf = StreamBuffer::new(logger.clone());
        buf.append("x <<<[TOOL_REQUEST]>>>\ncity:「始」Paris「末」\n<<<[END_TOOL_REQUEST]>>> y");

        assert!(buf.has_complete_block());
        assert!(buf.drain_complete_blocks().is_empty());
        buf.strip_processed();

        assert_eq!(buf.as_str(), "x  y");
        assert!(logger.contains(LogLevel::Warn, "without tool_name"));
    }

    #[test]
    fn test_finalize_discards_unterminated_block() {
        let logger = Arc::new(MemoryLogger::new());
        let mut buf = StreamBuffer::new(logger.clone());
        buf.append("Done. <<<[TOOL_REQUEST]>>>\ntool_name:「始」Cut");

        assert_eq!(buf.take_visible(), "Done. ");
        let finalized = buf.finalize();
        assert_eq!(finalized.visible, "");
        assert!(finalized.discarded.unwrap().starts_with(BLOCK_START));
        assert!(logger.contains(LogLevel::Warn, "unterminated"));
        assert!(buf.is_empty());
    }

    #[test]
    fn test_finalize_releases_partial_marker_as_text() {
        let mut buf = buffer();
        buf.append("ends with <<<");
        assert_eq!(buf.take_visible(), "ends with ");
        let finalized = buf.finalize();
        assert_eq!(finalized.visible, "<<<");
        assert!(finalized.discarded.is_none());
    }

    #[test]
    fn test_id_prefix_and_reset() {
        let mut buf = buffer().with_id_prefix("vcp-3");
        buf.append(&block("A"));
        assert_eq!(buf.drain_complete_blocks()[0].id, "vcp-3-1");

        buf.reset();
        assert!(buf.is_empty());
        buf.append(&block("B"));
        assert_eq!(buf.drain_complete_blocks()[0].id, "vcp-3-1");
    }

    #[test]
    fn test_raw_span_points_at_block() {
        let mut buf = buffer();
        buf.append(EXAMPLE);
        let request = buf.drain_complete_blocks().remove(0);
        let span = request.raw_span.unwrap();
        assert!(EXAMPLE[span.start..span.end].starts_with(BLOCK_START));
        assert!(EXAMPLE[span.start..span.end].ends_with("<<<[END_TOOL_REQUEST]>>>"));
    }
}
