//! Common types for arguments.

use std::fmt::Display;
use std::fmt::Formatter;
use std::fs::OpenOptions;
use std::io::Write;
use std::io::stdin;
use std::io::stdout;
use std::path::PathBuf;
use std::str::FromStr;

use anyhow::Context;
use anyhow::Result;

use buffered_reader::BufferedReader;
use buffered_reader::File;
use buffered_reader::Generic;

/// A trait to provide const &str for clap annotations for custom structs
pub trait ClapData {
    /// The clap value name
    const VALUE_NAME: &'static str;
    /// The clap help text
    const HELP: &'static str;
}

/// A type wrapping an optional PathBuf to use as stdin or file input
///
/// When creating `FileOrStdin` from `&str`, providing a `"-"` is interpreted
/// as `None`, i.e. read from stdin. Providing other strings is interpreted as
/// `Some(PathBuf)`, i.e. read from file.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct FileOrStdin(Option<PathBuf>);

impl ClapData for FileOrStdin {
    const VALUE_NAME: &'static str = "FILE";
    const HELP: &'static str = "Read from FILE or stdin if omitted";
}

impl FileOrStdin {
    pub fn new(path: Option<PathBuf>) -> Self {
        FileOrStdin(path)
    }

    /// Return a reference to the inner type
    pub fn inner(&self) -> Option<&PathBuf> {
        self.0.as_ref()
    }

    /// Get a boxed BufferedReader for the FileOrStdin
    ///
    /// Opens a file if there is Some(PathBuf), else opens stdin.
    pub fn open(&self) -> Result<Box<dyn BufferedReader<()>>> {
        if let Some(path) = self.inner() {
            Ok(Box::new(
                File::open(path)
                .with_context(|| format!("Failed to open {}", self))?))
        } else {
            Ok(Box::new(Generic::new(stdin(), None)))
        }
    }

    /// Reads everything.
    pub fn read_all(&self) -> Result<Vec<u8>> {
        let mut reader = self.open()?;
        let data = reader.data_eof()
            .with_context(|| format!("Failed to read {}", self))?;
        Ok(data.to_vec())
    }
}

impl From<PathBuf> for FileOrStdin {
    fn from(value: PathBuf) -> Self {
        if value == PathBuf::from("-") {
            FileOrStdin::default()
        } else {
            FileOrStdin::new(Some(value))
        }
    }
}

impl FromStr for FileOrStdin {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        if "-" == s {
            Ok(FileOrStdin(None))
        } else {
            Ok(FileOrStdin(Some(PathBuf::from(s))))
        }
    }
}

impl Display for FileOrStdin {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match &self.0 {
            Some(path) => write!(f, "{}", path.display()),
            None => write!(f, "-"),
        }
    }
}

/// A type wrapping an optional PathBuf to use as stdout or file output
///
/// When creating `FileOrStdout` from `&str`, providing a `"-"` is
/// interpreted as `None`, i.e. output to stdout. Providing other
/// strings is interpreted as `Some(PathBuf)`, i.e. output to file.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct FileOrStdout(Option<PathBuf>);

impl ClapData for FileOrStdout {
    const VALUE_NAME: &'static str = "FILE";
    const HELP: &'static str = "Write to FILE or stdout if omitted";
}

impl FileOrStdout {
    pub fn new(path: Option<PathBuf>) -> Self {
        FileOrStdout(path)
    }

    /// Return a reference to the optional PathBuf
    pub fn path(&self) -> Option<&PathBuf> {
        self.0.as_ref()
    }

    /// Opens the file (or stdout) for writing.
    ///
    /// An existing file is only overwritten if `force` is set.
    pub fn create(&self, force: bool) -> Result<Box<dyn Write + Sync + Send>> {
        if let Some(path) = self.path() {
            if !path.exists() || force {
                Ok(Box::new(
                    OpenOptions::new()
                        .write(true)
                        .truncate(true)
                        .create(true)
                        .open(path)
                        .context("Failed to create output file")?,
                ))
            } else {
                Err(anyhow::anyhow!(
                    "File {} exists, use \"pgp-classic --force ...\" to overwrite",
                    path.display(),
                ))
            }
        } else {
            Ok(Box::new(stdout()))
        }
    }
}

impl From<PathBuf> for FileOrStdout {
    fn from(value: PathBuf) -> Self {
        if value == PathBuf::from("-") {
            FileOrStdout::default()
        } else {
            FileOrStdout::new(Some(value))
        }
    }
}

impl FromStr for FileOrStdout {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        if "-" == s {
            Ok(FileOrStdout::default())
        } else {
            Ok(FileOrStdout::new(Some(PathBuf::from(s))))
        }
    }
}

impl Display for FileOrStdout {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self.path() {
            Some(path) => write!(f, "{}", path.display()),
            None => write!(f, "-"),
        }
    }
}

/// The recipients of a message.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct Recipients {
    #[clap(
        long = "to",
        value_name = "ADDRESS",
        help = "Encrypt to the primary recipient ADDRESS",
    )]
    pub to: Vec<String>,

    #[clap(
        long = "cc",
        value_name = "ADDRESS",
        help = "Encrypt to the carbon-copy recipient ADDRESS",
    )]
    pub cc: Vec<String>,

    #[clap(
        long = "bcc",
        value_name = "ADDRESS",
        help = "Encrypt to the blind carbon-copy recipient ADDRESS",
    )]
    pub bcc: Vec<String>,
}

impl Recipients {
    pub fn is_empty(&self) -> bool {
        self.to.is_empty() && self.cc.is_empty() && self.bcc.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn dash_is_standard_stream() {
        assert_eq!("-".parse::<FileOrStdin>().unwrap(), FileOrStdin::default());
        assert_eq!("-".parse::<FileOrStdout>().unwrap(), FileOrStdout::default());
        assert_eq!(FileOrStdout::from(PathBuf::from("out.eml")).to_string(),
                   "out.eml");
        assert_eq!(FileOrStdin::default().to_string(), "-");
    }

    #[test]
    fn existing_files_are_kept() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("out");
        std::fs::write(&path, b"old").unwrap();

        let output = FileOrStdout::from(path.clone());
        assert!(output.create(false).is_err());
        output.create(true).unwrap().write_all(b"new").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"new");

        let input = FileOrStdin::from(path);
        assert_eq!(input.read_all().unwrap(), b"new");
    }
}
