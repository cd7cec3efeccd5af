use predicates::prelude::*;

use super::common::{Backend, MESSAGE};

#[test]
fn sign_and_verify() {
    let backend = Backend::new();

    let signed = backend.sign(MESSAGE);
    assert!(signed.contains("multipart/signed"));
    assert!(signed.contains("application/pgp-signature"));
    assert!(signed.contains("-----BEGIN PGP SIGNATURE-----"));
    assert!(signed.contains("Hello, Bob!"));

    let input = backend.write("signed", &signed);
    let mut cmd = backend.command();
    cmd.arg("verify").arg(&input);
    cmd.assert()
        .success()
        .stderr(predicate::str::contains("Good signature from"))
        .stderr(predicate::str::contains("Good signature."));
}

#[test]
fn tampered_signature() {
    let backend = Backend::new();

    let signed = backend.sign(MESSAGE)
        .replace("signed-by-alice", "signed-by-mallory");
    let input = backend.write("signed", &signed);

    let mut cmd = backend.command();
    cmd.arg("verify").arg(&input);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("BAD signature"))
        .stderr(predicate::str::contains("Bad signature"));
}

#[test]
fn wrong_passphrase() {
    let backend = Backend::new();
    backend.set_passphrase("hunter2\n");

    let input = backend.write("message", MESSAGE);
    let mut cmd = backend.command();
    cmd.arg("sign").arg(&input);
    let output = backend.run(cmd, false);
    assert!(output.stdout.is_empty());
}

#[test]
fn detached() {
    let backend = Backend::new();

    let input = backend.write("message", MESSAGE);
    let mut cmd = backend.command();
    cmd.arg("sign").arg("--detached").arg(&input);
    cmd.assert()
        .success()
        .stdout(predicate::str::starts_with("-----BEGIN PGP SIGNATURE-----"))
        .stdout(predicate::str::contains("multipart").not());
}

#[test]
fn output_is_not_overwritten() {
    let backend = Backend::new();

    let input = backend.write("message", MESSAGE);
    let output = backend.write("output", "precious");

    let mut cmd = backend.command();
    cmd.arg("sign").arg(&input).arg("--output").arg(&output);
    backend.run(cmd, false);
    assert_eq!(std::fs::read_to_string(&output).unwrap(), "precious");

    let mut cmd = backend.command();
    cmd.arg("--force").arg("sign").arg(&input).arg("--output").arg(&output);
    backend.run(cmd, true);
    assert!(std::fs::read_to_string(&output).unwrap()
            .contains("multipart/signed"));
}
