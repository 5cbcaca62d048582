use crate::ResolveError;
use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

/// Seam for evaluating small JavaScript expressions in the ecosystem's
/// own runtime. The yarn lockfile reference parser and the ripgrep
/// version probe both go through this; tests substitute a canned
/// implementation.
pub trait NodeRuntime {
    /// Evaluate `script` with `node -e`, optionally feeding `stdin`,
    /// and return trimmed stdout.
    fn eval(
        &self,
        script: &str,
        stdin: Option<&str>,
        cwd: Option<&Path>,
    ) -> Result<String, ResolveError>;
}

/// Shells out to the `node` binary on PATH.
#[derive(Debug, Default)]
pub struct SystemNode;

impl NodeRuntime for SystemNode {
    fn eval(
        &self,
        script: &str,
        stdin: Option<&str>,
        cwd: Option<&Path>,
    ) -> Result<String, ResolveError> {
        let mut cmd = Command::new("node");
        cmd.arg("-e").arg(script);
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }
        cmd.stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        });
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|e| ResolveError::Tool {
            tool: "node".to_owned(),
            reason: e.to_string(),
        })?;
        if let Some(input) = stdin {
            // Taking stdin drops the pipe when the write is done, so
            // node sees EOF.
            if let Some(mut pipe) = child.stdin.take() {
                pipe.write_all(input.as_bytes())
                    .map_err(|e| ResolveError::Tool {
                        tool: "node".to_owned(),
                        reason: format!("writing stdin: {e}"),
                    })?;
            }
        }
        let output = child.wait_with_output().map_err(|e| ResolveError::Tool {
            tool: "node".to_owned(),
            reason: e.to_string(),
        })?;
        if !output.status.success() {
            return Err(ResolveError::Tool {
                tool: "node".to_owned(),
                reason: format!(
                    "exit {}: {}",
                    output.status.code().unwrap_or(-1),
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }
        let stdout = String::from_utf8(output.stdout).map_err(|_| ResolveError::Tool {
            tool: "node".to_owned(),
            reason: "stdout is not valid UTF-8".to_owned(),
        })?;
        Ok(stdout.trim().to_owned())
    }
}
