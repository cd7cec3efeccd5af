use predicates::prelude::*;

use super::common::Backend;

#[test]
fn list() {
    let backend = Backend::new();

    let mut cmd = backend.command();
    cmd.args(["keys", "list"]);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("0xAAAA1111"))
        .stdout(predicate::str::contains("Alice Example <alice@example.org>"));
}

#[test]
fn list_nothing() {
    let backend = Backend::new();

    let mut cmd = backend.command();
    cmd.args(["keys", "list", "nobody@example.org"]);
    cmd.assert()
        .success()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("keys import FILE"));
}

#[test]
fn find_and_search() {
    let backend = Backend::new();

    let mut cmd = backend.command();
    cmd.args(["keys", "find", "--to", "Alice <alice@example.org>"]);
    cmd.assert()
        .success()
        .stdout("0xAAAA1111\n");

    let mut cmd = backend.command();
    cmd.args(["keys", "search", "--can-encrypt", "alice"]);
    cmd.assert()
        .success()
        .stdout("0xAAAA1111 Alice Example <alice@example.org>\n");
}

#[test]
fn import() {
    let backend = Backend::new();
    let key = "\
-----BEGIN PGP PUBLIC KEY BLOCK-----
bob
-----END PGP PUBLIC KEY BLOCK-----
";
    let input = backend.write("bob.asc", key);

    let mut cmd = backend.command();
    cmd.args(["keys", "import"]).arg(&input);
    cmd.assert()
        .success()
        .stderr(predicate::str::contains("public key imported"));
    assert_eq!(backend.imported(), key);
}

#[test]
fn extract() {
    let backend = Backend::new();
    let input = backend.write("body", "\
Hi,

here is my key:

-----BEGIN PGP PUBLIC KEY BLOCK-----
bob
-----END PGP PUBLIC KEY BLOCK-----
");

    let mut cmd = backend.command();
    cmd.args(["keys", "extract"]).arg(&input);
    backend.run(cmd, true);
    assert!(backend.imported().contains("bob"));
}

#[test]
fn export() {
    let backend = Backend::new();

    let mut cmd = backend.command();
    cmd.args(["keys", "export", "0xAAAA1111"]);
    cmd.assert()
        .success()
        .stdout(predicate::str::starts_with(
            "-----BEGIN PGP PUBLIC KEY BLOCK-----"))
        .stdout(predicate::str::contains("key: 0xAAAA1111"));

    let mut cmd = backend.command();
    cmd.args(["keys", "export", "--attachment", "0xAAAA1111"]);
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("application/pgp-keys"))
        .stdout(predicate::str::contains("PGP Key 0xAAAA1111"));
}

#[test]
fn export_needs_a_key_in_batch_mode() {
    let backend = Backend::new();

    let mut cmd = backend.command();
    cmd.args(["keys", "export"]);
    cmd.assert()
        .failure()
        .stdout(predicate::str::is_empty());
}
