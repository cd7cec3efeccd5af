use predicates::prelude::*;

use super::common::Backend;

#[test]
fn template_is_valid() {
    let backend = Backend::new();

    let template = backend.scratch_file("template.toml");
    let mut cmd = backend.command();
    cmd.args(["config", "template", "--output"]).arg(&template);
    backend.run(cmd, true);
    assert!(std::fs::read_to_string(&template).unwrap()
            .contains("[commands]"));

    let mut cmd = backend.command_with_config(&template);
    cmd.args(["config", "verify"]);
    backend.run(cmd, true);
}

#[test]
fn verify() {
    let backend = Backend::new();

    let mut cmd = backend.command();
    cmd.args(["config", "verify"]);
    backend.run(cmd, true);

    let broken = backend.write("broken.toml", "[keys]\nsort = \"sideways\"\n");
    let mut cmd = backend.command_with_config(&broken);
    cmd.args(["config", "verify"]);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Invalid configuration"));
}

#[test]
fn broken_configuration_is_reported() {
    let backend = Backend::new();
    let broken = backend.write("broken.toml", "[commands]\nshred = [\"shred\"]\n");

    let mut cmd = backend.command_with_config(&broken);
    cmd.args(["keys", "list"]);
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Invalid configuration"));
}
