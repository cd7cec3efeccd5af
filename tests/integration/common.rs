use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::process::Output;
use std::sync::atomic::{AtomicUsize, Ordering};

use assert_cmd::Command;
use tempfile::TempDir;

/// A plain text message.
pub const MESSAGE: &str = "\
Content-Type: text/plain; charset=us-ascii

Hello, Bob!
";

/// The backend's keyring.
const PUBRING: &str = "\
tru::1:1700000000:0:3:1:5
pub:f:3072:1:AAAA1111AAAA1111:1600000000:::u:::escESC::::::23::0:
fpr:::::::::0123456789ABCDEF0123456789ABCDEFAAAA1111:
uid:f::::1600000000::HASH::Alice Example <alice@example.org>::::::::::0:
";

/// A stand-in for gpg.
///
/// The first argument names the operation.  Passphrases are read from
/// stdin, and must be `secret`.
const BACKEND: &str = r#"#!/bin/sh
DIR='@DIR@'
op="$1"
shift
case "$op" in
sign)
    read -r pw
    if [ "$pw" != secret ]; then
        echo 'gpg: signing failed: Bad passphrase' >&2
        exit 2
    fi
    echo '-----BEGIN PGP SIGNATURE-----'
    echo 'signed-by-alice'
    echo '-----END PGP SIGNATURE-----'
    ;;
verify)
    if grep -q signed-by-alice "$2"; then
        echo 'gpg: Good signature from "Alice Example <alice@example.org>"' >&2
    else
        echo 'gpg: BAD signature from "Alice Example <alice@example.org>"' >&2
        exit 1
    fi
    ;;
encrypt-only|encrypt-sign)
    mode=plain
    if [ "$op" = encrypt-sign ]; then
        read -r pw
        [ "$pw" = secret ] || exit 2
        mode=signed
    fi
    input="$1"
    shift
    echo '-----BEGIN PGP MESSAGE-----'
    echo "$mode to: $*"
    cat "$input"
    echo
    echo '-----END PGP MESSAGE-----'
    ;;
decrypt|decode)
    read -r pw
    if [ "$pw" != secret ]; then
        echo 'gpg: decryption failed: Bad passphrase' >&2
        exit 2
    fi
    if sed -n 2p "$1" | grep -q '^signed'; then
        echo 'gpg: Good signature from "Alice Example <alice@example.org>"' >&2
    fi
    sed '1,2d;$d' "$1"
    ;;
import)
    cat "$1" >> "$DIR/imported"
    echo 'gpg: key AAAA1111AAAA1111: public key imported' >&2
    ;;
export)
    echo '-----BEGIN PGP PUBLIC KEY BLOCK-----'
    echo "key: $*"
    echo '-----END PGP PUBLIC KEY BLOCK-----'
    ;;
list-pubring)
    if [ $# -eq 0 ]; then
        cat "$DIR/pubring"
        exit 0
    fi
    for hint in "$@"; do
        if grep -qiF -- "${hint#0x}" "$DIR/pubring"; then
            cat "$DIR/pubring"
            exit 0
        fi
    done
    exit 2
    ;;
list-secring)
    sed 's/^pub:/sec:/' "$DIR/pubring"
    ;;
verify-key)
    echo "pub $*"
    ;;
*)
    echo "unknown operation $op" >&2
    exit 2
    ;;
esac
"#;

/// Returns the configuration running `backend` for every operation.
fn configuration(backend: &Path) -> String {
    let program = format!("{:?}", backend.display().to_string());
    let command = |op: &str, args: &[&str]| {
        let args = args.iter().map(|a| format!("{:?}", a))
            .collect::<Vec<_>>();
        format!("{} = [{}, {:?}{}{}]\n", op, program, op,
                if args.is_empty() { "" } else { ", " }, args.join(", "))
    };

    let mut config = String::from("\
[passphrase]
use-agent = false

[commands]
get-keys = []
");
    config.push_str(&command("decode", &["%f"]));
    config.push_str(&command("verify", &["%f", "%s"]));
    config.push_str(&command("decrypt", &["%f"]));
    config.push_str(&command("sign", &["%f"]));
    config.push_str(&command("clearsign", &["%f"]));
    config.push_str(&command("encrypt-only", &["%f", "%r"]));
    config.push_str(&command("encrypt-sign", &["%f", "%r"]));
    config.push_str(&command("import", &["%f"]));
    config.push_str(&command("export", &["%r"]));
    config.push_str(&command("verify-key", &["%r"]));
    config.push_str(&command("list-pubring", &["%r"]));
    config.push_str(&command("list-secring", &["%r"]));
    config
}

/// A scratch directory with a fake backend and a configuration
/// using it.
pub struct Backend {
    base: TempDir,
    config: PathBuf,
    passphrase: PathBuf,
    scratch: AtomicUsize,
}

impl Backend {
    pub fn new() -> Self {
        let base = TempDir::new()
            .expect("can create a temporary directory");

        let backend = base.path().join("backend");
        std::fs::write(&backend,
                       BACKEND.replace("@DIR@", &base.path().display().to_string()))
            .expect("can write backend");
        std::fs::set_permissions(&backend, std::fs::Permissions::from_mode(0o755))
            .expect("can make backend executable");

        std::fs::write(base.path().join("pubring"), PUBRING)
            .expect("can write keyring");

        let config = base.path().join("config.toml");
        std::fs::write(&config, configuration(&backend))
            .expect("can write configuration");

        let passphrase = base.path().join("passphrase");
        std::fs::write(&passphrase, "secret\n")
            .expect("can write passphrase");

        Backend {
            base,
            config,
            passphrase,
            scratch: 0.into(),
        }
    }

    /// Replaces the passphrase handed to the backend.
    pub fn set_passphrase(&self, passphrase: &str) {
        std::fs::write(&self.passphrase, passphrase)
            .expect("can write passphrase");
    }

    /// Returns what the backend imported.
    pub fn imported(&self) -> String {
        std::fs::read_to_string(self.base.path().join("imported"))
            .unwrap_or_default()
    }

    /// Returns a new scratch file.
    ///
    /// The file is guaranteed to not exist, but it isn't actually
    /// created.
    pub fn scratch_file(&self, name: &str) -> PathBuf {
        loop {
            let i = self.scratch.fetch_add(1, Ordering::Relaxed);
            let file = self.base.path().join(format!("{}-{}", i, name));
            if ! file.exists() {
                return file;
            }
        }
    }

    /// Writes `data` to a new scratch file.
    pub fn write(&self, name: &str, data: &str) -> PathBuf {
        let file = self.scratch_file(name);
        std::fs::write(&file, data).expect("can write scratch file");
        file
    }

    /// Returns a command that is set to run `pgp-classic` against
    /// the fake backend, without prompting.
    pub fn command(&self) -> Command {
        self.command_with_config(&self.config)
    }

    /// Like [`Backend::command`], but reads the configuration from
    /// `config`.
    pub fn command_with_config(&self, config: &Path) -> Command {
        let mut cmd = Command::cargo_bin("pgp-classic")
            .expect("can run pgp-classic");
        cmd.env_remove("PGP_CLASSIC_CONFIG");
        cmd.arg("--batch");
        cmd.arg("--config").arg(config);
        cmd.arg("--passphrase-file").arg(&self.passphrase);
        cmd
    }

    /// Runs the command.  If `expect` is `Some`, asserts that the
    /// command succeeds or fails as per the boolean.
    pub fn run<E>(&self, mut cmd: Command, expect: E) -> Output
        where E: Into<Option<bool>>
    {
        eprintln!("Running: {:?}", cmd);
        let output = cmd.output().expect("can run command");
        let expect = expect.into();
        match (output.status.success(), expect) {
            (true, Some(true)) | (false, Some(false)) | (_, None) => {
                eprintln!("stdout: {}", String::from_utf8_lossy(&output.stdout));
                eprintln!("stderr: {}", String::from_utf8_lossy(&output.stderr));
            }
            (got, Some(expected)) => {
                panic!(
                    "Running {:?}: {}, but should have {}:\n\
                     stdout: {}\n\
                     stderr: {}",
                    cmd,
                    if got { "succeeded" } else { "failed" },
                    if expected { "succeeded" } else { "failed" },
                    &String::from_utf8_lossy(&output.stdout),
                    &String::from_utf8_lossy(&output.stderr));
            }
        }
        output
    }

    /// Signs `message`, and returns the signed message.
    pub fn sign(&self, message: &str) -> String {
        let input = self.write("message", message);
        let mut cmd = self.command();
        cmd.arg("sign").arg(&input);
        let output = self.run(cmd, true);
        String::from_utf8(output.stdout).expect("valid UTF-8")
    }
}
