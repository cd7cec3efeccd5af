use clap::FromArgMatches;

use pgp_classic::cli;

fn main() {
    let c = match cli::build().try_get_matches() {
        Ok(matches) => match cli::Cli::from_arg_matches(&matches) {
            Ok(c) => c,
            Err(err) => err.exit(),
        },
        Err(err) => err.exit(),
    };

    if let Err(err) = pgp_classic::commands::dispatch(c) {
        if pgp_classic::Error::is_cancellation(&err) {
            eprintln!("Cancelled.");
        } else {
            pgp_classic::print_error_chain(&err);
        }
        std::process::exit(1);
    }
}
