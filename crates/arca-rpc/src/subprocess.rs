use std::io;
use std::process::Stdio;

use tokio::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command};

use crate::types::{RpcBridgeConfig, RpcError};

/// Live MCP subprocess with all three stdio pipes detached so the bridge can
/// hand them to its writer and reader tasks. Dropping the handle without an
/// explicit shutdown still terminates the child.
pub struct SubprocessHandle {
    pub child: Child,
    pub stdin: ChildStdin,
    pub stdout: ChildStdout,
    pub stderr: ChildStderr,
}

pub fn spawn_subprocess(config: &RpcBridgeConfig) -> Result<SubprocessHandle, RpcError> {
    let mut command = Command::new(&config.program);
    command.args(&config.args);
    command.stdin(Stdio::piped());
    command.stdout(Stdio::piped());
    command.stderr(Stdio::piped());
    command.kill_on_drop(true);
    for (key, value) in &config.envs {
        command.env(key, value);
    }

    let mut child = command.spawn().map_err(RpcError::Spawn)?;
    let stdin = child.stdin.take().ok_or_else(|| missing_pipe("stdin"))?;
    let stdout = child.stdout.take().ok_or_else(|| missing_pipe("stdout"))?;
    let stderr = child.stderr.take().ok_or_else(|| missing_pipe("stderr"))?;

    Ok(SubprocessHandle {
        child,
        stdin,
        stdout,
        stderr,
    })
}

fn missing_pipe(name: &str) -> RpcError {
    RpcError::Spawn(io::Error::new(
        io::ErrorKind::BrokenPipe,
        format!("subprocess {name} pipe was not captured"),
    ))
}
