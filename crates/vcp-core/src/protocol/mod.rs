//! VCP wire protocol: grammar, escaping and prompt instructions

mod grammar;
mod instructions;

pub use grammar::{
    encode_request, find_block_start, parse_blocks, partial_marker_suffix, scan_blocks,
    BlockFields, BlockScan, ParsedBlock, BLOCK_END, BLOCK_START, TOOL_NAME_KEY, VALUE_END,
    VALUE_START,
};
pub use instructions::{build_protocol_instructions, ParamDescriptor, ToolDescriptor};
