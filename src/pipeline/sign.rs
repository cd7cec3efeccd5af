//! Creates PGP/MIME signatures.

use anyhow::Result;

use sequoia_openpgp as openpgp;
use openpgp::Packet;
use openpgp::PacketPile;
use openpgp::parse::Parse;
use openpgp::types::HashAlgorithm;

use crate::armor;
use crate::error::Error;
use crate::mime::{Disposition, Encoding, Part};
use crate::pgp::Pgp;
use crate::template::{Operation, TemplateParams};

const TRACE: bool = false;

/// Turns the message armor some backends emit for detached
/// signatures into signature armor.
fn rewrite_armor(output: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(output.len());
    for line in output.split_inclusive(|&b| b == b'\n') {
        if line == armor::BEGIN_MESSAGE.as_bytes() {
            result.extend_from_slice(armor::BEGIN_SIGNATURE.as_bytes());
        } else if line == armor::END_MESSAGE.as_bytes() {
            result.extend_from_slice(armor::END_SIGNATURE.as_bytes());
        } else {
            result.extend_from_slice(line);
        }
    }
    result
}

/// Creates a detached, armored signature over `data`.
///
/// Signs with the configured `sign-as` key, if any.  If the backend
/// fails, the passphrase is forgotten, as it is the most likely
/// culprit.
pub fn sign_detached(pgp: &Pgp, data: &[u8]) -> Result<Vec<u8>> {
    tracer!(TRACE, "sign_detached");

    if ! pgp.ensure_passphrase()? {
        return Err(Error::Cancelled.into());
    }

    let input = pgp.invoker().scratch().file_with("sign-", data)?;
    let run = super::run(pgp, Operation::Sign,
                         &TemplateParams {
                             input: Some(input.path()),
                             sign_as: pgp.config().sign_as.as_deref(),
                             ..Default::default()
                         },
                         true)?;
    super::show_diagnostics(pgp, &run.captured.stderr)?;

    let signature = rewrite_armor(&run.captured.stdout);
    if signature.is_empty()
        || (! run.captured.status.success() && pgp.config().check_exit)
    {
        t!("Signing failed: {}, {} bytes", run.captured.status, signature.len());
        if run.fed {
            pgp.void_passphrase();
        }
        return Err(Error::SigningEmptyOutput.into());
    }

    Ok(signature)
}

/// Returns the `micalg` parameter for a signature.
///
/// The hash algorithm is read from the signature packet.  If that
/// fails, `x-unknown` is returned.
pub fn micalg(signature: &[u8]) -> String {
    tracer!(TRACE, "micalg");

    let algo = PacketPile::from_bytes(signature).ok()
        .and_then(|pile| pile.descendants().find_map(|p| match p {
            Packet::Signature(sig) => Some(sig.hash_algo()),
            _ => None,
        }));
    t!("Hash algorithm: {:?}", algo);

    let name = match algo {
        Some(HashAlgorithm::MD5) => "pgp-md5",
        Some(HashAlgorithm::SHA1) => "pgp-sha1",
        Some(HashAlgorithm::RipeMD) => "pgp-ripemd160",
        Some(HashAlgorithm::SHA224) => "pgp-sha224",
        Some(HashAlgorithm::SHA256) => "pgp-sha256",
        Some(HashAlgorithm::SHA384) => "pgp-sha384",
        Some(HashAlgorithm::SHA512) => "pgp-sha512",
        _ => "x-unknown",
    };
    name.into()
}

/// Signs `part`, returning a multipart/signed part.
pub fn sign_message(pgp: &Pgp, part: &Part) -> Result<Part> {
    let signature = sign_detached(pgp, &part.to_vec()?)?;
    let micalg = micalg(&signature);

    let mut signature = Part::leaf("application", "pgp-signature", signature);
    signature.encoding = Some(Encoding::SevenBit);
    signature.disposition = Some(Disposition::Inline);

    let mut signed = Part::multipart("signed", vec![part.clone(), signature])?;
    signed.set_param("protocol", "application/pgp-signature");
    signed.set_param("micalg", &micalg);
    Ok(signed)
}
