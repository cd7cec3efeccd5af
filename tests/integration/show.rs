use predicates::prelude::*;

use super::common::{Backend, MESSAGE};

#[test]
fn signed() {
    let backend = Backend::new();

    let signed = backend.sign(MESSAGE);
    let input = backend.write("signed", &signed);

    let mut cmd = backend.command();
    cmd.arg("show").arg(&input);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains(
            "[-- The following data is signed --]\n\nHello, Bob!\n"))
        .stdout(predicate::str::contains("[-- End of signed data --]"))
        .stderr(predicate::str::contains("Good signature."));
}

#[test]
fn tampered() {
    let backend = Backend::new();

    let signed = backend.sign(MESSAGE)
        .replace("signed-by-alice", "signed-by-mallory");
    let input = backend.write("signed", &signed);

    let mut cmd = backend.command();
    cmd.arg("show").arg(&input);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Hello, Bob!"))
        .stderr(predicate::str::contains("Warning: bad signature."));
}

#[test]
fn encrypted() {
    let backend = Backend::new();

    let input = backend.write("message", MESSAGE);
    let mut cmd = backend.command();
    cmd.arg("encrypt").arg("--to").arg("alice@example.org").arg(&input);
    let output = backend.run(cmd, true);
    let input = backend.write("encrypted",
                              &String::from_utf8(output.stdout).unwrap());

    let mut cmd = backend.command();
    cmd.arg("show").arg(&input);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains(
            "[-- The following data is PGP/MIME encrypted --]"))
        .stdout(predicate::str::contains("Hello, Bob!"));
}

#[test]
fn check_finds_inline_pgp() {
    let backend = Backend::new();

    let input = backend.write("inline", "\
Content-Type: text/plain; charset=us-ascii

-----BEGIN PGP MESSAGE-----
plain to: 0xAAAA1111
Content-Type: text/plain

Hi
-----END PGP MESSAGE-----
");
    let mut cmd = backend.command();
    cmd.arg("check").arg(&input);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("x-action=pgp-encrypted"));

    let input = backend.write("plain", MESSAGE);
    let mut cmd = backend.command();
    cmd.arg("check").arg(&input);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("No inline PGP found"));
}
