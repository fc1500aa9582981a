//! Process pipeline for packaging payloads.
//!
//! A [`Pipeline`] chains external processes (a producer such as `drush
//! sql-dump` or `tar`, optionally followed by a compressor) into a single
//! readable byte stream. Stages are started in producer→consumer order before
//! any read happens, stdout of one stage feeds stdin of the next, and stderr
//! of every stage goes straight to the operator's terminal so diagnostics
//! never mix into the payload.

use std::env;
use std::io;
use std::process::{Child, ChildStdout, Command, Stdio};

use tracing::debug;

/// Explicit gzip/pigz level so output is deterministic across machines.
pub const DEFAULT_COMPRESSION_LEVEL: u8 = 6;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("failed to start {command}: {source}")]
    ProducerStart {
        command: String,
        source: io::Error,
    },
    #[error("{command} failed: {detail}")]
    ProducerExit { command: String, detail: String },
    #[error("failed to start compressor {command}: {source}")]
    CompressorStart {
        command: String,
        source: io::Error,
    },
    #[error("compressor {command} failed: {detail}")]
    CompressorExit { command: String, detail: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StageRole {
    Producer,
    Compressor,
}

/// One external process participating in the chain.
#[derive(Debug)]
struct Stage {
    role: StageRole,
    command: String,
    child: Child,
}

/// An owned chain of running stages plus the stdout of the last one.
///
/// The caller drains the reader to completion, then calls [`Pipeline::wait`].
/// Waiting happens in reverse order (consumer first) so no wait call can
/// block behind an unread, full OS pipe buffer.
#[derive(Debug)]
pub struct Pipeline {
    stages: Vec<Stage>,
}

impl Pipeline {
    /// Starts the producer and, if given, the compressor, wired together.
    ///
    /// Returns the running pipeline and the combined output stream. With no
    /// compressor the producer's stdout is the combined stream; the chain
    /// shape is the same either way.
    pub fn spawn(
        mut producer: Command,
        compressor: Option<Command>,
    ) -> Result<(Self, ChildStdout), PipelineError> {
        let producer_name = command_name(&producer);
        producer.stdout(Stdio::piped()).stderr(Stdio::inherit());

        let mut producer_child = producer.spawn().map_err(|source| {
            PipelineError::ProducerStart {
                command: producer_name.clone(),
                source,
            }
        })?;
        let producer_out = producer_child
            .stdout
            .take()
            .expect("producer stdout was piped");
        debug!(command = %producer_name, "started producer stage");

        let mut stages = vec![Stage {
            role: StageRole::Producer,
            command: producer_name,
            child: producer_child,
        }];

        let output = match compressor {
            None => producer_out,
            Some(mut compressor) => {
                let compressor_name = command_name(&compressor);
                compressor
                    .stdin(Stdio::from(producer_out))
                    .stdout(Stdio::piped())
                    .stderr(Stdio::inherit());

                let mut compressor_child = match compressor.spawn() {
                    Ok(child) => child,
                    Err(source) => {
                        // Reap the already-running producer before surfacing.
                        let producer = &mut stages[0].child;
                        let _ = producer.kill();
                        let _ = producer.wait();
                        return Err(PipelineError::CompressorStart {
                            command: compressor_name,
                            source,
                        });
                    }
                };
                let compressed_out = compressor_child
                    .stdout
                    .take()
                    .expect("compressor stdout was piped");
                debug!(command = %compressor_name, "started compressor stage");

                stages.push(Stage {
                    role: StageRole::Compressor,
                    command: compressor_name,
                    child: compressor_child,
                });
                compressed_out
            }
        };

        Ok((Self { stages }, output))
    }

    /// Waits on every stage, consumer first, and returns the first stage
    /// error while still reaping the remaining processes.
    pub fn wait(mut self) -> Result<(), PipelineError> {
        let mut first_err = None;

        for stage in self.stages.iter_mut().rev() {
            let result = match stage.child.wait() {
                Ok(status) if status.success() => Ok(()),
                Ok(status) => Err(stage_error(stage.role, &stage.command, format!("{status}"))),
                Err(e) => Err(stage_error(
                    stage.role,
                    &stage.command,
                    format!("wait failed: {e}"),
                )),
            };
            if let Err(e) = result {
                debug!(command = %stage.command, error = %e, "pipeline stage failed");
                first_err.get_or_insert(e);
            }
        }

        match first_err {
            None => Ok(()),
            Some(e) => Err(e),
        }
    }
}

fn stage_error(role: StageRole, command: &str, detail: String) -> PipelineError {
    match role {
        StageRole::Producer => PipelineError::ProducerExit {
            command: command.to_string(),
            detail,
        },
        StageRole::Compressor => PipelineError::CompressorExit {
            command: command.to_string(),
            detail,
        },
    }
}

fn command_name(command: &Command) -> String {
    command.get_program().to_string_lossy().into_owned()
}

/// True if `name` resolves to a file somewhere on `PATH`.
pub fn binary_on_path(name: &str) -> bool {
    let Some(path) = env::var_os("PATH") else {
        return false;
    };
    env::split_paths(&path).any(|dir| dir.join(name).is_file())
}

/// Builds the compressor stage: `pigz` when available (multi-core), `gzip`
/// otherwise, both with an explicit level and writing to stdout.
pub fn gzip_compressor(level: u8) -> (&'static str, Command) {
    compressor_command(binary_on_path("pigz"), level)
}

fn compressor_command(pigz_available: bool, level: u8) -> (&'static str, Command) {
    let name = if pigz_available { "pigz" } else { "gzip" };
    let mut cmd = Command::new(name);
    cmd.arg(format!("-{level}")).arg("-c");
    (name, cmd)
}
