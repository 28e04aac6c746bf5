//! Opens a matched picture with an external program.

use std::path::Path;
use std::process::Command;

#[derive(thiserror::Error, Debug)]
pub enum ViewerError {
    #[error("viewer command is empty")]
    EmptyCommand,

    #[error("failed to run '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{program}' exited with {status}")]
    Failed {
        program: String,
        status: std::process::ExitStatus,
    },
}

#[cfg(target_os = "macos")]
pub const DEFAULT_COMMAND: &str = "open";
#[cfg(not(target_os = "macos"))]
pub const DEFAULT_COMMAND: &str = "xdg-open";

pub struct Viewer {
    program: String,
    args: Vec<String>,
}

impl Viewer {
    /// `command` may carry extra arguments, e.g. `"feh --scale-down"`.
    /// Falls back to the platform opener when unset.
    pub fn new(command: Option<&str>) -> Result<Self, ViewerError> {
        let command = command.unwrap_or(DEFAULT_COMMAND);
        let mut parts = command.split_whitespace().map(str::to_string);
        let program = parts.next().ok_or(ViewerError::EmptyCommand)?;

        Ok(Self {
            program,
            args: parts.collect(),
        })
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn command_for(&self, path: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).arg(path);
        cmd
    }

    pub fn open(&self, path: &Path) -> Result<(), ViewerError> {
        log::debug!("opening {} with {}", path.display(), self.program);

        let status = self
            .command_for(path)
            .status()
            .map_err(|source| ViewerError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        if !status.success() {
            return Err(ViewerError::Failed {
                program: self.program.clone(),
                status,
            });
        }
        Ok(())
    }
}
