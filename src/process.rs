//! Runs the backend.
//!
//! The backend is spawned directly, never through a shell.  Only the
//! channels that are asked for are connected.  Everything else is
//! attached to the null device, or to a file.

use std::ffi::OsString;
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStderr, ChildStdin, ChildStdout, Command,
                   ExitStatus, Stdio};
use std::rc::Rc;

use anyhow::{Context, Result};
use tempfile::NamedTempFile;

use crate::error::Error;
use crate::template::{Operation, TemplateParams, Templates};

const TRACE: bool = false;

/// How a standard stream of the child is connected.
#[derive(Debug)]
pub enum Channel {
    /// A pipe to the parent.
    Pipe,
    /// The null device.
    Null,
    /// An open file.
    File(File),
}

impl Channel {
    /// Redirects to a (re-opened) temporary file.
    pub fn temp(file: &NamedTempFile) -> Result<Self> {
        Ok(Channel::File(file.reopen()?))
    }

    fn into_stdio(self) -> Stdio {
        match self {
            Channel::Pipe => Stdio::piped(),
            Channel::Null => Stdio::null(),
            Channel::File(f) => Stdio::from(f),
        }
    }
}

/// The connections of the three standard streams.
#[derive(Debug)]
pub struct Channels {
    pub stdin: Channel,
    pub stdout: Channel,
    pub stderr: Channel,
}

impl Default for Channels {
    fn default() -> Self {
        Channels {
            stdin: Channel::Null,
            stdout: Channel::Null,
            stderr: Channel::Null,
        }
    }
}

impl Channels {
    pub fn stdin(mut self, c: Channel) -> Self {
        self.stdin = c;
        self
    }

    pub fn stdout(mut self, c: Channel) -> Self {
        self.stdout = c;
        self
    }

    pub fn stderr(mut self, c: Channel) -> Self {
        self.stderr = c;
        self
    }
}

/// A running backend process.
///
/// The pipe ends that were asked for are available as `stdin`,
/// `stdout`, and `stderr`.  The caller closes stdin by dropping it,
/// or by calling [`Invocation::wait`].
///
/// If an invocation is dropped before it is waited for, the child is
/// killed and reaped.
pub struct Invocation {
    argv: Vec<OsString>,
    child: Child,
    pub stdin: Option<ChildStdin>,
    pub stdout: Option<ChildStdout>,
    pub stderr: Option<ChildStderr>,
    status: Option<ExitStatus>,
}

impl Invocation {
    /// Returns the expanded argument vector.
    pub fn argv(&self) -> &[OsString] {
        &self.argv
    }

    /// Returns the process identifier.
    pub fn id(&self) -> u32 {
        self.child.id()
    }

    /// Returns the pipe to the child's stdin.
    pub fn stdin(&mut self) -> Result<&mut ChildStdin> {
        let program = self.program();
        self.stdin.as_mut().ok_or_else(
            || anyhow::anyhow!("stdin of {} is not a pipe", program))
    }

    /// Returns the pipe from the child's stdout.
    pub fn stdout(&mut self) -> Result<&mut ChildStdout> {
        let program = self.program();
        self.stdout.as_mut().ok_or_else(
            || anyhow::anyhow!("stdout of {} is not a pipe", program))
    }

    /// Returns the pipe from the child's stderr.
    pub fn stderr(&mut self) -> Result<&mut ChildStderr> {
        let program = self.program();
        self.stderr.as_mut().ok_or_else(
            || anyhow::anyhow!("stderr of {} is not a pipe", program))
    }

    fn program(&self) -> String {
        self.argv.first()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Closes the pipes and waits for the child to exit.
    ///
    /// Read everything you need from the child before calling this.
    pub fn wait(&mut self) -> Result<ExitStatus> {
        tracer!(TRACE, "Invocation::wait");

        if let Some(status) = self.status {
            return Ok(status);
        }

        self.stdin = None;
        self.stdout = None;
        self.stderr = None;
        let status = self.child.wait()
            .with_context(|| format!("Waiting for {} failed", self.program()))?;
        t!("{} exited with {}", self.program(), status);
        self.status = Some(status);
        Ok(status)
    }

    /// Returns the exit status, if the child has been waited for.
    pub fn status(&self) -> Option<ExitStatus> {
        self.status
    }
}

impl Drop for Invocation {
    fn drop(&mut self) {
        if self.status.is_none() {
            self.stdin = None;
            self.stdout = None;
            self.stderr = None;
            let _ = self.child.kill();
            let _ = self.child.wait();
        }
    }
}

/// The captured output of a completed invocation.
#[derive(Debug)]
pub struct Captured {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
}

/// A private directory for temporary files.
///
/// The directory is only accessible to the user.  Files are created
/// exclusively, so they can't be substituted by a concurrent local
/// process.  Everything is removed when dropped.
#[derive(Debug)]
pub struct Scratch {
    dir: tempfile::TempDir,
}

impl Scratch {
    pub fn new() -> Result<Self> {
        let dir = tempfile::Builder::new()
            .prefix("pgp-classic-")
            .tempdir()
            .context("Creating a private temporary directory failed")?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(dir.path(),
                                     std::fs::Permissions::from_mode(0o700))
                .with_context(|| format!("Restricting access to {} failed",
                                         dir.path().display()))?;
        }

        Ok(Scratch { dir })
    }

    /// Returns the directory's path.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Creates an empty file.
    pub fn file(&self, prefix: &str) -> Result<NamedTempFile> {
        tempfile::Builder::new()
            .prefix(prefix)
            .tempfile_in(self.dir.path())
            .with_context(|| format!("Creating a temporary file in {} failed",
                                     self.dir.path().display()))
    }

    /// Creates a file holding `data`.
    pub fn file_with(&self, prefix: &str, data: &[u8]) -> Result<NamedTempFile> {
        let mut file = self.file(prefix)?;
        file.write_all(data)?;
        file.flush()?;
        Ok(file)
    }
}

/// Reads a temporary file from the start.
pub fn read_back(file: &NamedTempFile) -> Result<Vec<u8>> {
    let mut data = Vec::new();
    file.reopen()?.read_to_end(&mut data)?;
    Ok(data)
}

/// Renders an argument vector for humans.
pub fn display_argv(argv: &[OsString]) -> String {
    argv.iter()
        .map(|a| {
            let a = a.to_string_lossy();
            if a.is_empty() || a.contains(char::is_whitespace) {
                format!("{:?}", a)
            } else {
                a.into_owned()
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Spawns backend processes.
///
/// Cloning is cheap, clones share the templates and the scratch
/// directory.
#[derive(Clone)]
pub struct ProcessInvoker {
    templates: Rc<Templates>,
    keyring: Option<PathBuf>,
    scratch: Rc<Scratch>,
    verbose: bool,
}

impl ProcessInvoker {
    pub fn new(templates: Templates, keyring: Option<PathBuf>, verbose: bool)
               -> Result<Self>
    {
        Ok(ProcessInvoker {
            templates: Rc::new(templates),
            keyring,
            scratch: Rc::new(Scratch::new()?),
            verbose,
        })
    }

    /// Returns the scratch directory.
    pub fn scratch(&self) -> &Scratch {
        &self.scratch
    }

    /// Returns whether the operation has a template.
    pub fn is_enabled(&self, op: Operation) -> bool {
        ! self.templates.get(op).is_disabled()
    }

    /// Spawns the backend for `op`.
    ///
    /// The configured keyring is used unless `params` names one.
    pub fn invoke(&self, op: Operation, params: &TemplateParams,
                  channels: Channels)
                  -> Result<Invocation>
    {
        tracer!(TRACE, "ProcessInvoker::invoke");

        let template = self.templates.get(op);
        if template.is_disabled() {
            return Err(anyhow::anyhow!(
                "No command is configured for the {} operation", op));
        }

        let params = TemplateParams {
            keyring: params.keyring.or(self.keyring.as_deref()),
            ..params.clone()
        };
        let argv = template.expand(&params)
            .with_context(|| format!("Expanding the {} command failed", op))?;
        let (program, args) = argv.split_first()
            .ok_or_else(|| anyhow::anyhow!("The {} command is empty", op))?;

        t!("{}: {}", op, display_argv(&argv));
        if self.verbose {
            weprintln!("Running {}", display_argv(&argv));
        }

        let mut child = Command::new(program)
            .args(args)
            .stdin(channels.stdin.into_stdio())
            .stdout(channels.stdout.into_stdio())
            .stderr(channels.stderr.into_stdio())
            .spawn()
            .map_err(|e| Error::SpawnFailure(PathBuf::from(program),
                                             e.to_string()))?;

        Ok(Invocation {
            stdin: child.stdin.take(),
            stdout: child.stdout.take(),
            stderr: child.stderr.take(),
            child,
            argv,
            status: None,
        })
    }

    /// Runs `op` to completion, collecting its output.
    ///
    /// stdin is the null device.  stderr is collected in a temporary
    /// file so that the child can't block on it while we read stdout.
    pub fn capture(&self, op: Operation, params: &TemplateParams)
                   -> Result<Captured>
    {
        let errors = self.scratch.file("stderr-")?;
        let mut invocation = self.invoke(
            op, params,
            Channels::default()
                .stdout(Channel::Pipe)
                .stderr(Channel::temp(&errors)?))?;

        let mut stdout = Vec::new();
        invocation.stdout()?.read_to_end(&mut stdout)?;
        let status = invocation.wait()?;

        Ok(Captured {
            status,
            stdout,
            stderr: read_back(&errors)?,
        })
    }
}

/// Writes `data` to the child's stdin, ignoring a child that exited
/// early.
pub fn feed(stdin: &mut dyn Write, data: &[u8]) -> Result<()> {
    match stdin.write_all(data) {
        Err(e) if e.kind() == io::ErrorKind::BrokenPipe => Ok(()),
        r => Ok(r?),
    }
}
