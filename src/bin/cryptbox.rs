//! Cryptbox CLI - password-based file encryption
//!
//! Command-line interface for encrypting and decrypting files into cryptbox
//! containers (AES-256-CBC, key from HMAC-SHA256 over the password).

use clap::{ArgAction, Parser, Subcommand};
use std::error::Error;
use std::path::{Path, PathBuf};
use std::process;
use tracing_subscriber::EnvFilter;

use cryptbox::error::{CryptboxError, ErrorCategory, ErrorKind, Result};
use cryptbox::file_ops;
use cryptbox::passphrase::{PassphraseReader, ReaderPassphraseReader, TerminalPassphraseReader};

#[derive(Parser)]
#[command(name = "cryptbox")]
#[command(version)]
#[command(about = "Password-based file encryption.", long_about = None)]
struct Cli {
    /// Read password from stdin instead of from terminal
    #[arg(long, global = true)]
    passphrase_stdin: bool,

    /// Log more to stderr (-v info, -vv debug, -vvv trace); RUST_LOG overrides
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encrypt a file
    #[command(alias = "e")]
    Encrypt {
        /// Path to the file whose contents is to be encrypted
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,

        /// Path to write the container to [default: input with a .crbx extension]
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Decrypt a file
    #[command(alias = "d")]
    Decrypt {
        /// Path to the container to decrypt
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,

        /// Path to write the plaintext to [default: input with its stored extension]
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,
    },

    /// Show the stored extension and IV of a container without decrypting it
    #[command(alias = "i")]
    Inspect {
        /// Path to the container to inspect
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,
    },
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Commands::Encrypt { input, output } => {
            let mut reader = get_passphrase_reader(cli.passphrase_stdin);
            run_encrypt(&input, output, &mut *reader)
        }
        Commands::Decrypt { input, output } => {
            let mut reader = get_passphrase_reader(cli.passphrase_stdin);
            run_decrypt(&input, output, &mut *reader)
        }
        Commands::Inspect { input } => run_inspect(&input),
    };

    if let Err(e) = result {
        report(&e);
        process::exit(1);
    }
}

fn run_encrypt(
    input: &Path,
    output: Option<PathBuf>,
    reader: &mut dyn PassphraseReader,
) -> Result<()> {
    let output = output.unwrap_or_else(|| file_ops::default_encrypted_path(input));
    refuse_overwriting_input(input, &output)?;
    file_ops::encrypt_file(input, &output, reader)
}

fn run_decrypt(
    input: &Path,
    output: Option<PathBuf>,
    reader: &mut dyn PassphraseReader,
) -> Result<()> {
    // Without an explicit output, peek at the stored extension first and
    // reopen the file for the actual decrypt.
    let output = match output {
        Some(path) => path,
        None => {
            let info = file_ops::inspect_file(input)?;
            file_ops::default_decrypted_path(input, &info.extension)?
        }
    };
    refuse_overwriting_input(input, &output)?;
    file_ops::decrypt_file(input, &output, reader)?;
    Ok(())
}

fn run_inspect(input: &Path) -> Result<()> {
    let info = file_ops::inspect_file(input)?;
    println!("extension: {}", info.extension);
    println!("iv: {}", hex::encode(info.iv));
    Ok(())
}

/// Refuse an output that resolves to the input file, however it is spelled.
fn refuse_overwriting_input(input: &Path, output: &Path) -> Result<()> {
    let same_file = match (input.canonicalize(), output.canonicalize()) {
        (Ok(input), Ok(output)) => input == output,
        _ => input == output,
    };
    if same_file {
        return Err(CryptboxError::with_kind(
            ErrorCategory::User,
            ErrorKind::Io,
            format!(
                "output would overwrite input {}; choose one with --output",
                input.display()
            ),
        ));
    }
    Ok(())
}

fn get_passphrase_reader(use_stdin: bool) -> Box<dyn PassphraseReader> {
    if use_stdin {
        Box::new(ReaderPassphraseReader::new(Box::new(std::io::stdin())))
    } else {
        Box::new(TerminalPassphraseReader)
    }
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn report(err: &CryptboxError) {
    eprintln!("Error: {}", err);
    let mut source = err.source();
    while let Some(cause) = source {
        eprintln!("  caused by: {}", cause);
        source = cause.source();
    }

    if err.is_authentication_failure() {
        eprintln!("wrong password or corrupted file");
    } else if err.is_format() {
        eprintln!("invalid or corrupted file");
    }
}
