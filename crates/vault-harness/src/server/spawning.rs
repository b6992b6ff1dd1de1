//! Server process spawning.
//!
//! The service is launched as `<binary> <server_arguments...> -config=<path>...`
//! with stdout and stderr piped. Each stream is drained on its own thread and
//! forwarded line by line to `tracing`, so the child never blocks on a full
//! pipe.

use std::io::{BufRead, BufReader, Read};
use std::process::{Child, Command, Stdio};
use std::thread::{self, JoinHandle};

use camino::Utf8PathBuf;
use tracing::{debug, info, warn};

use super::SERVER_TARGET;
use super::error::ServerError;

/// Launch parameters for the service binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchCommand {
    binary: String,
    arguments: Vec<String>,
    config_paths: Vec<Utf8PathBuf>,
}

impl LaunchCommand {
    /// Builds a launch command for `binary`.
    #[must_use]
    pub fn new(
        binary: impl Into<String>,
        arguments: Vec<String>,
        config_paths: Vec<Utf8PathBuf>,
    ) -> Self {
        Self {
            binary: binary.into(),
            arguments,
            config_paths,
        }
    }

    /// Binary name or path.
    #[must_use]
    pub fn binary(&self) -> &str {
        &self.binary
    }

    /// Full argument vector passed to the binary.
    #[must_use]
    pub fn argv(&self) -> Vec<String> {
        self.arguments
            .iter()
            .cloned()
            .chain(
                self.config_paths
                    .iter()
                    .map(|path| format!("-config={path}")),
            )
            .collect()
    }
}

/// A spawned service process and its output drain threads.
#[derive(Debug)]
pub(crate) struct ServerProcess {
    child: Child,
    drains: Vec<JoinHandle<()>>,
}

impl ServerProcess {
    /// Spawns the service.
    pub(crate) fn spawn(command: &LaunchCommand) -> Result<Self, ServerError> {
        let argv = command.argv();
        info!(
            target: SERVER_TARGET,
            binary = command.binary(),
            args = ?argv,
            "launching server"
        );
        let mut child = Command::new(command.binary())
            .args(&argv)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| ServerError::Launch {
                binary: command.binary().to_owned(),
                source,
            })?;

        let mut drains = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            drains.push(spawn_drain("stdout", stdout));
        }
        if let Some(stderr) = child.stderr.take() {
            drains.push(spawn_drain("stderr", stderr));
        }
        debug!(target: SERVER_TARGET, pid = child.id(), "server spawned");
        Ok(Self { child, drains })
    }

    pub(crate) fn id(&self) -> u32 {
        self.child.id()
    }

    pub(crate) fn child_mut(&mut self) -> &mut Child {
        &mut self.child
    }

    /// Joins the drain threads. Call only after the child has been reaped,
    /// when both pipes have reached end of file.
    pub(crate) fn join_drains(&mut self) {
        for drain in self.drains.drain(..) {
            if drain.join().is_err() {
                warn!(target: SERVER_TARGET, "output drain thread panicked");
            }
        }
    }
}

fn spawn_drain<R>(stream: &'static str, reader: R) -> JoinHandle<()>
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        for line in BufReader::new(reader).lines() {
            match line {
                Ok(line) => debug!(target: SERVER_TARGET, stream, "{line}"),
                Err(error) => {
                    debug!(target: SERVER_TARGET, stream, %error, "output drain stopped");
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn argv_appends_one_config_flag_per_path() {
        let command = LaunchCommand::new(
            "vault",
            vec![String::from("server")],
            vec![
                Utf8PathBuf::from("/cfg/vault-tls.hcl"),
                Utf8PathBuf::from("/cfg/extra.hcl"),
            ],
        );
        assert_eq!(
            command.argv(),
            vec![
                "server",
                "-config=/cfg/vault-tls.hcl",
                "-config=/cfg/extra.hcl"
            ]
        );
    }

    #[test]
    fn missing_binary_reports_launch_error() {
        let command = LaunchCommand::new("/nonexistent/vault", Vec::new(), Vec::new());
        let error = ServerProcess::spawn(&command).expect_err("launch should fail");
        match error {
            ServerError::Launch { binary, .. } => assert_eq!(binary, "/nonexistent/vault"),
            other => panic!("expected Launch, got: {other:?}"),
        }
    }

    #[cfg(unix)]
    #[test]
    fn drains_finish_once_child_exits() {
        let command = LaunchCommand::new(
            "sh",
            vec![String::from("-c"), String::from("echo out; echo err >&2")],
            Vec::new(),
        );
        let mut process = ServerProcess::spawn(&command).expect("spawn sh");
        let status = process.child_mut().wait().expect("wait");
        assert!(status.success());
        process.join_drains();
    }
}
