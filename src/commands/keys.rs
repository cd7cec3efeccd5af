//! Finds, lists, imports, and exports keys.

use std::collections::BTreeSet;
use std::io::Write;

use anyhow::Result;

use crate::cli::keys::{
    Command, ExportCommand, ExtractCommand, FindCommand, ImportCommand,
    ListCommand, SearchCommand, Subcommands,
};
use crate::entry;
use crate::keys::{self, KeyFlags, Keyring};
use crate::output::hint::Hint;
use crate::output::pluralize::Pluralize;
use crate::output::sanitize::Safe;
use crate::pgp::Pgp;
use crate::pipeline;
use crate::resolve;

use super::Context;

const TRACE: bool = false;

pub fn dispatch(ctx: &mut Context, cmd: Command) -> Result<()> {
    match cmd.subcommand {
        Subcommands::Find(cmd) => find(ctx, cmd),
        Subcommands::Search(cmd) => search(ctx, cmd),
        Subcommands::List(cmd) => list(ctx, cmd),
        Subcommands::Import(cmd) => import(ctx, cmd),
        Subcommands::Export(cmd) => export(ctx, cmd),
        Subcommands::Extract(cmd) => extract(ctx, cmd),
    }
}

fn ring(secret: bool) -> Keyring {
    if secret {
        Keyring::Secret
    } else {
        Keyring::Public
    }
}

fn find(ctx: &mut Context, cmd: FindCommand) -> Result<()> {
    let keylist = super::recipients(&ctx.pgp, &cmd.recipients)?;
    println!("{}", keylist);
    Ok(())
}

/// Picks a key, and returns the line describing it.
fn search_line(pgp: &Pgp, cmd: &SearchCommand) -> Result<String> {
    let mut abilities = KeyFlags::EMPTY;
    if cmd.can_sign {
        abilities |= KeyFlags::CAN_SIGN;
    }
    if cmd.can_encrypt {
        abilities |= KeyFlags::CAN_ENCRYPT;
    }

    let key = resolve::key_by_string(pgp, &cmd.query, abilities,
                                     ring(cmd.secret))?;
    let config = pgp.config();
    Ok(format!("0x{} {}",
               key.keyid(config.long_ids, config.ignore_subkeys),
               Safe(key.identity())))
}

fn search(ctx: &mut Context, cmd: SearchCommand) -> Result<()> {
    println!("{}", search_line(&ctx.pgp, &cmd)?);
    Ok(())
}

/// Returns the formatted entries, and the number of keys they
/// describe.
fn list_entries(pgp: &Pgp, patterns: &[String], ring: Keyring)
                -> Result<(Vec<String>, usize)>
{
    tracer!(TRACE, "list_entries");

    let mut hints = Vec::new();
    for pattern in patterns {
        keys::add_hints(&mut hints, pattern);
    }
    t!("Hints: {:?}", hints);

    let forest = pgp.keys().query(&hints, ring)?;
    let candidates = pgp.selector().candidates(&forest, KeyFlags::EMPTY);
    let config = pgp.config();
    let entries = candidates.iter().enumerate()
        .map(|(i, c)| Safe(entry::format_entry(
            &config.entry_format, i + 1, &forest, c, config.long_ids).as_str())
             .to_string())
        .collect();
    let keys = candidates.iter().map(|c| c.key).collect::<BTreeSet<_>>().len();
    Ok((entries, keys))
}

fn list(ctx: &mut Context, cmd: ListCommand) -> Result<()> {
    let (entries, keys) =
        list_entries(&ctx.pgp, &cmd.patterns, ring(cmd.secret))?;

    for entry in &entries {
        println!("{}", entry);
    }
    qprintln!(quiet=ctx.quiet, "Listed {}.", keys.of("key"));

    if keys == 0 {
        Hint::new(ctx.quiet)
            .hint(format_args!("Keys can be imported using:"))
            .command()
            .arg("keys").arg("import").arg("FILE")
            .done();
    }
    Ok(())
}

fn import(ctx: &mut Context, cmd: ImportCommand) -> Result<()> {
    let data = cmd.input.read_all()?;
    if ! pipeline::import_keys(&ctx.pgp, &data)? {
        return Err(anyhow::anyhow!("Importing the keys in {} failed",
                                   cmd.input));
    }
    Ok(())
}

fn export(ctx: &mut Context, cmd: ExportCommand) -> Result<()> {
    let part = pipeline::make_key_attachment(&ctx.pgp, cmd.keyid.as_deref())?;

    let mut sink = cmd.output.create(ctx.force)?;
    if cmd.attachment {
        part.serialize(&mut sink)?;
    } else {
        sink.write_all(&part.body)?;
    }
    sink.flush()?;
    Ok(())
}

fn extract(ctx: &mut Context, cmd: ExtractCommand) -> Result<()> {
    let body = cmd.input.read_all()?;
    if ! pipeline::extract_keys_from_message(&ctx.pgp, &body)? {
        return Err(anyhow::anyhow!("Importing the keys in {} failed",
                                   cmd.input));
    }
    Ok(())
}
