/*!
 * Subprocess execution for the blueutil backend
 */

use std::io;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub success: bool,
    /// Exit status as printed, e.g. "exit status: 1".
    pub status: String,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(&self, program: &str, args: &[String]) -> io::Result<CommandOutput>;
}

/// Runs real processes. Dropping the future kills the child.
pub struct TokioRunner;

#[async_trait]
impl CommandRunner for TokioRunner {
    async fn run(&self, program: &str, args: &[String]) -> io::Result<CommandOutput> {
        let mut std_command = std::process::Command::new(program);
        std_command.args(args).stdin(Stdio::null());
        // Own process group, so terminal signals aimed at us do not hit the child.
        #[cfg(unix)]
        std::os::unix::process::CommandExt::process_group(&mut std_command, 0);

        let mut command = Command::from(std_command);
        command.kill_on_drop(true);

        let output = command.output().await?;
        Ok(CommandOutput {
            success: output.status.success(),
            status: output.status.to_string(),
            stdout: output.stdout,
            stderr: output.stderr,
        })
    }
}
