use std::path::Path;
use subprocess::{self, Exec, Redirection};

use crate::config::{Compression, Config};

#[derive(Debug, Fail)]
pub enum PackError {
    #[fail(display = "{} command failed to execute: {}", cmd, why)]
    Command { cmd: String, why: subprocess::PopenError },
    #[fail(display = "{} exited with {:?}: {}", cmd, status, stderr)]
    Build { cmd: String, status: subprocess::ExitStatus, stdout: String, stderr: String },
}

/// What the packaging tool printed while building a package successfully.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PackOutput {
    pub stdout: String,
    pub stderr: String,
}

/// Builds a package archive from a staging directory laid out like the target filesystem.
pub trait Packager {
    /// Blocks until the archive at `output` has been written.
    fn build(&self, staging: &Path, output: &Path) -> Result<PackOutput, PackError>;
}

impl<'a, P: Packager + ?Sized> Packager for &'a P {
    fn build(&self, staging: &Path, output: &Path) -> Result<PackOutput, PackError> {
        (**self).build(staging, output)
    }
}

/// `dpkg-deb --build`, optionally run under `fakeroot`.
#[derive(Debug, Clone, PartialEq)]
pub struct DpkgDeb {
    pub compression: Compression,
    pub fakeroot: bool,
}

impl DpkgDeb {
    pub fn new(config: &Config) -> Self {
        DpkgDeb { compression: config.compression, fakeroot: config.fakeroot }
    }

    pub fn command(&self, staging: &Path, output: &Path) -> Exec {
        let command = if self.fakeroot {
            Exec::cmd("fakeroot").arg("dpkg-deb")
        } else {
            Exec::cmd("dpkg-deb")
        };

        command
            .arg(["-Z", self.compression.as_str()].concat())
            .arg("--build")
            .arg(staging)
            .arg(output)
    }
}

impl Packager for DpkgDeb {
    fn build(&self, staging: &Path, output: &Path) -> Result<PackOutput, PackError> {
        let command = self.command(staging, output);
        let cmd = command.to_cmdline_lossy();
        info!("executing {}", cmd);

        let capture = command
            .stdout(Redirection::Pipe)
            .stderr(Redirection::Pipe)
            .capture()
            .map_err(|why| PackError::Command { cmd: cmd.clone(), why })?;

        let stdout = capture.stdout_str();
        let stderr = capture.stderr_str();
        if capture.exit_status.success() {
            Ok(PackOutput { stdout, stderr })
        } else {
            Err(PackError::Build { cmd, status: capture.exit_status, stdout, stderr })
        }
    }
}
