use crate::ResolveError;
use std::process::Command;

/// Run a command to completion and capture stdout as UTF-8 text.
///
/// Any non-zero exit or spawn failure is fatal; stderr is folded into
/// the error message.
pub(crate) fn capture(label: &str, cmd: &mut Command) -> Result<String, ResolveError> {
    let output = cmd.output().map_err(|e| ResolveError::Tool {
        tool: label.to_owned(),
        reason: e.to_string(),
    })?;
    if !output.status.success() {
        return Err(ResolveError::Tool {
            tool: label.to_owned(),
            reason: format!(
                "exit {}: {}",
                output.status.code().unwrap_or(-1),
                String::from_utf8_lossy(&output.stderr).trim()
            ),
        });
    }
    String::from_utf8(output.stdout).map_err(|_| ResolveError::Tool {
        tool: label.to_owned(),
        reason: "stdout is not valid UTF-8".to_owned(),
    })
}

/// Run a command for its side effects only.
pub(crate) fn run(label: &str, cmd: &mut Command) -> Result<(), ResolveError> {
    capture(label, cmd).map(|_| ())
}

/// Collapse all whitespace runs to single spaces and trim, matching
/// how subprocess output lines are normalized before comparison.
pub(crate) fn inline(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
