//! VCP block grammar
//!
//! ```text
//! <<<[TOOL_REQUEST]>>>
//! tool_name:「始」GetTime「末」,
//! city:「始」Paris「末」
//! <<<[END_TOOL_REQUEST]>>>
//! ```
//!
//! Values are wrapped in sentinel glyphs instead of quotes, so nothing inside
//! `「始」...「末」` is ever interpreted: commas, newlines and even the block
//! markers pass through verbatim. The scanner is field-aware for that reason;
//! it only looks for the closing marker between fields.

use crate::types::{RawSpan, ToolParams};

/// Opening block marker
pub const BLOCK_START: &str = "<<<[TOOL_REQUEST]>>>";
/// Closing block marker
pub const BLOCK_END: &str = "<<<[END_TOOL_REQUEST]>>>";
/// Opening value sentinel
pub const VALUE_START: &str = "「始」";
/// Closing value sentinel
pub const VALUE_END: &str = "「末」";
/// Reserved key holding the tool name
pub const TOOL_NAME_KEY: &str = "tool_name";

/// Fields decoded from one block body
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockFields {
    /// Trimmed `tool_name` value, if present
    pub tool_name: Option<String>,
    /// All other fields, verbatim
    pub params: ToolParams,
}

impl BlockFields {
    fn insert(&mut self, key: &str, value: &str) {
        if key == TOOL_NAME_KEY {
            self.tool_name = Some(value.trim().to_string());
        } else {
            self.params.insert(key.to_string(), value.to_string());
        }
    }

    /// Tool name when present and non-empty
    pub fn valid_tool_name(&self) -> Option<&str> {
        self.tool_name.as_deref().filter(|name| !name.is_empty())
    }
}

/// One block located by [`scan_blocks`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlockScan {
    /// Opening and closing markers both present
    Complete { span: RawSpan, fields: BlockFields },
    /// Opening marker found, body still open; always the last item of a scan
    Incomplete { start: usize },
}

/// A complete block with a usable tool name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedBlock {
    pub span: RawSpan,
    pub tool_name: String,
    pub params: ToolParams,
}

enum Body {
    Closed { end: usize, fields: BlockFields },
    Open,
}

/// Locate every block in `text` starting at byte offset `from`
///
/// Scanning stops at the first incomplete block: everything after an open
/// block may still belong to it.
pub fn scan_blocks(text: &str, from: usize) -> Vec<BlockScan> {
    let mut blocks = Vec::new();
    let mut pos = from;

    while let Some(start) = find_block_start(text, pos) {
        match parse_body(text, start + BLOCK_START.len()) {
            Body::Closed { end, fields } => {
                blocks.push(BlockScan::Complete {
                    span: RawSpan::new(start, end),
                    fields,
                });
                pos = end;
            }
            Body::Open => {
                blocks.push(BlockScan::Incomplete { start });
                break;
            }
        }
    }

    blocks
}

/// Parse all complete, well-formed blocks in `text`
pub fn parse_blocks(text: &str) -> Vec<ParsedBlock> {
    scan_blocks(text, 0)
        .into_iter()
        .filter_map(|scan| match scan {
            BlockScan::Complete { span, fields } => {
                let tool_name = fields.valid_tool_name()?.to_string();
                Some(ParsedBlock {
                    span,
                    tool_name,
                    params: fields.params,
                })
            }
            BlockScan::Incomplete { .. } => None,
        })
        .collect()
}

/// Byte offset of the next opening marker at or after `from`
pub fn find_block_start(text: &str, from: usize) -> Option<usize> {
    text.get(from..)?.find(BLOCK_START).map(|i| from + i)
}

/// Length of a trailing fragment of `text` that could still grow into an
/// opening marker
pub fn partial_marker_suffix(text: &str) -> usize {
    // The marker is ASCII, so every candidate suffix starts on a char boundary.
    (1..BLOCK_START.len())
        .rev()
        .find(|&len| text.ends_with(&BLOCK_START[..len]))
        .unwrap_or(0)
}

fn parse_body(text: &str, body_start: usize) -> Body {
    let mut fields = BlockFields::default();
    let mut pos = body_start;

    loop {
        let rest = &text[pos..];
        let close = rest.find(BLOCK_END);
        let value = rest.find(VALUE_START);

        match value {
            Some(v) if close.map_or(true, |c| v < c) => {
                let value_start = pos + v + VALUE_START.len();
                let Some(len) = text[value_start..].find(VALUE_END) else {
                    return Body::Open;
                };
                if let Some(key) = field_key(&rest[..v]) {
                    fields.insert(key, &text[value_start..value_start + len]);
                }
                pos = value_start + len + VALUE_END.len();
            }
            _ => {
                return match close {
                    Some(c) => Body::Closed {
                        end: pos + c + BLOCK_END.len(),
                        fields,
                    },
                    None => Body::Open,
                };
            }
        }
    }
}

/// Extract the key preceding a value: the run of key characters right before
/// the colon. Separators and stray text in front of it are ignored.
fn field_key(segment: &str) -> Option<&str> {
    let segment = segment.trim_end();
    let segment = segment
        .strip_suffix(':')
        .or_else(|| segment.strip_suffix('：'))?
        .trim_end();

    let start = segment
        .char_indices()
        .rev()
        .take_while(|(_, c)| is_key_char(*c))
        .last()
        .map(|(i, _)| i)?;

    Some(&segment[start..])
}

fn is_key_char(c: char) -> bool {
    c.is_alphanumeric() || matches!(c, '_' | '-' | '.')
}

/// Render a request in canonical wire format
pub fn encode_request(tool_name: &str, params: &ToolParams) -> String {
    let mut fields = Vec::with_capacity(params.len() + 1);
    fields.push(encode_field(TOOL_NAME_KEY, tool_name));
    fields.extend(params.iter().map(|(k, v)| encode_field(k, v)));

    format!("{}\n{}\n{}", BLOCK_START, fields.join(",\n"), BLOCK_END)
}

fn encode_field(key: &str, value: &str) -> String {
    format!("{}:{}{}{}", key, VALUE_START, value, VALUE_END)
}
