//! Remote command execution

use crate::error::{DeployError, Result};
use ssh2::{Channel, ExtendedData, Session};
use std::io::{self, Read};
use tracing::debug;

/// A single-use exec channel on an open connection
pub struct CommandSession {
    session: Session,
}

impl CommandSession {
    pub(crate) fn new(session: Session) -> Self {
        Self { session }
    }

    /// Run `command` through the remote shell and wait for it to exit.
    ///
    /// Returns stdout and stderr interleaved as the server sent them.
    /// Consumes the session: run another command on a new one.
    pub fn run(self, command: &str) -> Result<Vec<u8>> {
        let mut channel = self
            .session
            .channel_session()
            .map_err(|e| session_error(command, e.into()))?;
        channel
            .handle_extended_data(ExtendedData::Merge)
            .map_err(|e| session_error(command, e.into()))?;

        run_on(&mut channel, command)
    }
}

/// What a command run needs from an exec channel
pub(crate) trait ExecChannel: Read {
    fn exec(&mut self, command: &str) -> io::Result<()>;
    fn wait_close(&mut self) -> io::Result<()>;
    fn exit_status(&self) -> io::Result<i32>;
}

impl ExecChannel for Channel {
    fn exec(&mut self, command: &str) -> io::Result<()> {
        Ok(Channel::exec(self, command)?)
    }

    fn wait_close(&mut self) -> io::Result<()> {
        Ok(Channel::wait_close(self)?)
    }

    fn exit_status(&self) -> io::Result<i32> {
        Ok(Channel::exit_status(self)?)
    }
}

/// Exec `command`, drain the channel and check the exit status
pub(crate) fn run_on<C: ExecChannel>(channel: &mut C, command: &str) -> Result<Vec<u8>> {
    debug!(command = %command, "Executing remote command");
    channel
        .exec(command)
        .map_err(|e| session_error(command, e))?;

    let mut output = Vec::new();
    channel
        .read_to_end(&mut output)
        .map_err(|e| session_error(command, e))?;

    channel
        .wait_close()
        .map_err(|e| session_error(command, e))?;
    let status = channel
        .exit_status()
        .map_err(|e| session_error(command, e))?;
    debug!(command = %command, status, bytes = output.len(), "Remote command finished");

    if status != 0 {
        return Err(DeployError::RemoteExec {
            command: command.to_string(),
            status,
            output: String::from_utf8_lossy(&output).into_owned(),
        });
    }

    Ok(output)
}

fn session_error(command: &str, source: io::Error) -> DeployError {
    DeployError::ExecSession {
        command: command.to_string(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    struct FakeChannel {
        output: Cursor<Vec<u8>>,
        status: i32,
        refuse_exec: bool,
        broken_read: bool,
        executed: Option<String>,
        closed: bool,
    }

    impl FakeChannel {
        fn new(output: &[u8], status: i32) -> Self {
            Self {
                output: Cursor::new(output.to_vec()),
                status,
                refuse_exec: false,
                broken_read: false,
                executed: None,
                closed: false,
            }
        }
    }

    impl Read for FakeChannel {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.broken_read {
                return Err(io::Error::new(io::ErrorKind::ConnectionReset, "channel reset"));
            }
            self.output.read(buf)
        }
    }

    impl ExecChannel for FakeChannel {
        fn exec(&mut self, command: &str) -> io::Result<()> {
            if self.refuse_exec {
                return Err(io::Error::new(io::ErrorKind::Other, "channel request denied"));
            }
            self.executed = Some(command.to_string());
            Ok(())
        }

        fn wait_close(&mut self) -> io::Result<()> {
            self.closed = true;
            Ok(())
        }

        fn exit_status(&self) -> io::Result<i32> {
            Ok(self.status)
        }
    }

    #[test]
    fn test_success_returns_combined_output() {
        let mut channel = FakeChannel::new(b"Building backend\nwarning: cache miss\n", 0);
        let output = run_on(&mut channel, "cd /saas && docker-compose up -d").unwrap();

        assert_eq!(output, b"Building backend\nwarning: cache miss\n");
        assert_eq!(channel.executed.as_deref(), Some("cd /saas && docker-compose up -d"));
        assert!(channel.closed);
    }

    #[test]
    fn test_empty_output() {
        let mut channel = FakeChannel::new(b"", 0);
        assert!(run_on(&mut channel, "true").unwrap().is_empty());
    }

    #[test]
    fn test_nonzero_exit_carries_status_and_output() {
        let mut channel = FakeChannel::new(b"ERROR: service backend failed to build\n", 17);
        let err = run_on(&mut channel, "docker-compose up").unwrap_err();

        assert_eq!(err.kind(), "RemoteExecError");
        assert_eq!(
            err.remote_output(),
            Some("ERROR: service backend failed to build\n")
        );
        match err {
            DeployError::RemoteExec { command, status, .. } => {
                assert_eq!(command, "docker-compose up");
                assert_eq!(status, 17);
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_exec_refused_is_session_error() {
        let mut channel = FakeChannel::new(b"", 0);
        channel.refuse_exec = true;

        let err = run_on(&mut channel, "uptime").unwrap_err();
        assert_eq!(err.kind(), "ExecSessionError");
        assert!(err.to_string().contains("uptime"));
        assert!(!channel.closed);
    }

    #[test]
    fn test_read_failure_is_session_error() {
        let mut channel = FakeChannel::new(b"partial", 0);
        channel.broken_read = true;

        let err = run_on(&mut channel, "uptime").unwrap_err();
        assert_eq!(err.kind(), "ExecSessionError");
    }
}
