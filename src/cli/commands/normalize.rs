//! Normalize command implementation

use crate::cli::error::CliError;
use crate::legacy::{looks_like_legacy_blob, normalize};

use super::load_input;

#[derive(clap::Args, Debug)]
pub struct NormalizeArgs {
    /// Serialized value, or `-` to read it from stdin
    pub value: String,
}

/// Handle the normalize command: print the JSON form of one blob
pub fn handle_normalize(args: &NormalizeArgs) -> Result<(), CliError> {
    let raw = if args.value == "-" {
        load_input("-")?
    } else {
        args.value.clone()
    };

    if !looks_like_legacy_blob(&raw) {
        eprintln!("Value does not start like a serialized array, object or string; parsing anyway");
    }
    println!("{}", normalize(&raw)?);
    Ok(())
}
