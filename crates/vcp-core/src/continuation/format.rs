//! Renders tool results as the context block sent back to the model

use crate::protocol::{VALUE_END, VALUE_START};
use crate::types::{ToolOutcome, ToolResult};

pub const RESULT_START: &str = "<<<[TOOL_RESULT]>>>";
pub const RESULT_END: &str = "<<<[END_TOOL_RESULT]>>>";

/// Format results in execution order, one block per result
///
/// ```
/// use vcp_core::continuation::format_tool_results;
/// use vcp_core::types::ToolResult;
///
/// let text = format_tool_results(&[ToolResult::success("vcp-0-1", "GetTime", "12:00")]);
/// assert!(text.contains("tool_name:「始」GetTime「末」"));
/// assert!(text.contains("status:「始」success「末」"));
/// ```
pub fn format_tool_results(results: &[ToolResult]) -> String {
    results
        .iter()
        .map(format_tool_result)
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn format_tool_result(result: &ToolResult) -> String {
    let (status, key, body) = match &result.outcome {
        ToolOutcome::Success { output } => ("success", "output", output),
        ToolOutcome::Failure { error } => ("error", "error", error),
    };

    format!(
        "{start}\ntool_name:{vs}{name}{ve},\nstatus:{vs}{status}{ve},\n{key}:{vs}{body}{ve}\n{end}",
        start = RESULT_START,
        end = RESULT_END,
        vs = VALUE_START,
        ve = VALUE_END,
        name = result.tool_name,
    )
}
