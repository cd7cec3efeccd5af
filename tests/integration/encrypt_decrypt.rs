use predicates::prelude::*;

use super::common::{Backend, MESSAGE};

/// Encrypts `MESSAGE` to Alice.
fn encrypt(backend: &Backend, args: &[&str]) -> String {
    let input = backend.write("message", MESSAGE);
    let mut cmd = backend.command();
    cmd.arg("encrypt").arg("--to").arg("Alice <alice@example.org>")
        .args(args).arg(&input);
    let output = backend.run(cmd, true);
    String::from_utf8(output.stdout).expect("valid UTF-8")
}

#[test]
fn encrypt_and_decrypt() {
    let backend = Backend::new();

    let encrypted = encrypt(&backend, &[]);
    assert!(encrypted.contains("multipart/encrypted"));
    assert!(encrypted.contains("application/pgp-encrypted"));
    assert!(encrypted.contains("plain to: 0xAAAA1111"));

    let input = backend.write("encrypted", &encrypted);
    let mut cmd = backend.command();
    cmd.arg("decrypt").arg(&input);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Hello, Bob!"))
        .stderr(predicate::str::contains("Good signature.").not());
}

#[test]
fn encrypt_signed() {
    let backend = Backend::new();

    let encrypted = encrypt(&backend, &["--sign"]);
    assert!(encrypted.contains("signed to: 0xAAAA1111"));

    let input = backend.write("encrypted", &encrypted);
    let mut cmd = backend.command();
    cmd.arg("decrypt").arg(&input);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Hello, Bob!"))
        .stderr(predicate::str::contains("Good signature."));
}

#[test]
fn unknown_recipient() {
    let backend = Backend::new();

    let input = backend.write("message", MESSAGE);
    let mut cmd = backend.command();
    cmd.arg("encrypt").arg("--to").arg("carol@example.org").arg(&input);
    let output = backend.run(cmd, false);
    assert!(output.stdout.is_empty());
}

#[test]
fn no_recipients() {
    let backend = Backend::new();

    let input = backend.write("message", MESSAGE);
    let mut cmd = backend.command();
    cmd.arg("encrypt").arg(&input);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("No recipients given"));
}

#[test]
fn decrypt_with_wrong_passphrase() {
    let backend = Backend::new();

    let encrypted = encrypt(&backend, &[]);
    let input = backend.write("encrypted", &encrypted);

    backend.set_passphrase("hunter2");
    let mut cmd = backend.command();
    cmd.arg("decrypt").arg(&input);
    cmd.assert()
        .failure()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("Bad passphrase"));
}

#[test]
fn inline() {
    let backend = Backend::new();

    let input = backend.write("message", MESSAGE);
    let mut cmd = backend.command();
    cmd.arg("inline").arg("--encrypt").arg("--to").arg("alice@example.org")
        .arg(&input);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("-----BEGIN PGP MESSAGE-----"))
        .stdout(predicate::str::contains("multipart").not());
}
