//! notecrypt CLI - encrypt notes into content-addressed envelopes
//!
//! Notes are encrypted with AES-256-GCM under a key derived by scrypt from
//! a passphrase and a salt file, and stored under a filename derived from
//! the note's name.

use clap::{ArgAction, Parser, Subcommand};
use std::io::{self, IsTerminal, Read, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;

use notecrypt::config::Config;
use notecrypt::error::{ErrorCategory, ErrorKind, NotecryptError, Result};
use notecrypt::file_ops::{self, BatchOptions, BatchReport};
use notecrypt::log::TracingLogger;
use notecrypt::passphrase::{PassphraseReader, ReaderPassphraseReader, TerminalPassphraseReader};
use notecrypt::{Notecrypt, SecretKey, salt};

#[derive(Parser)]
#[command(name = "notecrypt")]
#[command(version)]
#[command(about = "Encrypts notes into content-addressed envelopes.", long_about = None)]
struct Cli {
    /// Show what would be done without writing anything
    #[arg(short = 'n', long, global = true)]
    dry_run: bool,

    /// Verbose output to stderr (repeat for more)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log warnings and errors to stderr
    #[arg(short, long, global = true, conflicts_with_all = ["verbose", "silent"])]
    quiet: bool,

    /// Silence all logging to stderr
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    silent: bool,

    /// Use the given config file instead of the default
    #[arg(short = 'C', long, value_name = "FILE", global = true)]
    config_file: Option<PathBuf>,

    /// Salt file to derive the key with (overrides the config file)
    #[arg(long, value_name = "FILE", global = true)]
    salt_file: Option<PathBuf>,

    /// Read passphrase from stdin instead of from terminal
    #[arg(long, global = true)]
    passphrase_stdin: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new random salt file
    InitSalt,

    /// Encrypt a note, or every note in a directory
    #[command(alias = "e")]
    Encrypt {
        /// Note file or directory of notes to encrypt
        #[arg(short = 'I', long, value_name = "PATH", required_unless_present = "stdin")]
        input: Option<PathBuf>,

        /// Read the note from stdin
        #[arg(short = 'i', long, conflicts_with = "input", requires = "name")]
        stdin: bool,

        /// Basename of the note read from stdin
        #[arg(long, value_name = "BASENAME")]
        name: Option<String>,

        /// Directory to write envelopes to
        #[arg(short = 'O', long, value_name = "DIR", required_unless_present = "stdout")]
        output: Option<PathBuf>,

        /// Write the envelope to stdout; its filename goes to stderr
        #[arg(short = 'o', long, conflicts_with = "output")]
        stdout: bool,

        /// Descend into subdirectories
        #[arg(short, long)]
        recursive: bool,
    },

    /// Decrypt an envelope, or every envelope in a directory
    #[command(alias = "d")]
    Decrypt {
        /// Envelope file or directory of envelopes to decrypt
        #[arg(short = 'I', long, value_name = "PATH", required_unless_present = "stdin")]
        input: Option<PathBuf>,

        /// Read the envelope from stdin
        #[arg(short = 'i', long, conflicts_with = "input", requires = "digest")]
        stdin: bool,

        /// Filename (digest) of the envelope read from stdin
        #[arg(long, value_name = "DIGEST")]
        digest: Option<String>,

        /// Directory to write decrypted notes to
        #[arg(short = 'O', long, value_name = "DIR", required_unless_present = "stdout")]
        output: Option<PathBuf>,

        /// Write the note's contents to stdout
        #[arg(short = 'o', long, conflicts_with = "output")]
        stdout: bool,

        /// Descend into subdirectories
        #[arg(short, long)]
        recursive: bool,
    },

    /// Print the envelope filename for a basename
    Digest {
        /// Note basename, e.g. todo.txt
        basename: String,
    },

    /// Print the effective configuration
    Config,
}

/// Where a note or envelope comes from.
enum Source {
    Stdin,
    Path(PathBuf),
}

/// Where results go.
enum Sink {
    Stdout,
    Dir(PathBuf),
}

impl Source {
    fn new(stdin: bool, input: Option<PathBuf>) -> Result<Self> {
        match (stdin, input) {
            (true, _) => Ok(Source::Stdin),
            (false, Some(path)) => Ok(Source::Path(path)),
            (false, None) => Err(usage("an input path or --stdin is required")),
        }
    }
}

impl Sink {
    fn new(stdout: bool, output: Option<PathBuf>) -> Result<Self> {
        match (stdout, output) {
            (true, _) => Ok(Sink::Stdout),
            (false, Some(dir)) => Ok(Sink::Dir(dir)),
            (false, None) => Err(usage("an output directory or --stdout is required")),
        }
    }
}

fn main() {
    let cli = Cli::parse();

    match run(cli) {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            eprintln!("Error: {}", file_ops::error_chain(&e));
            process::exit(1);
        }
    }
}

/// Returns whether every file succeeded.
fn run(cli: Cli) -> Result<bool> {
    let mut config = Config::load(cli.config_file.as_deref())?;
    init_logging(log_filter(&cli, &config.log_level));
    if let Some(path) = cli.salt_file {
        config.salt_path = Some(path);
    }

    let nc = Notecrypt::new(Arc::new(TracingLogger));
    tracing::debug!(dry_run = cli.dry_run, "starting");

    match cli.command {
        Commands::InitSalt => {
            let path = salt_path(&config)?;
            if cli.dry_run {
                eprintln!("would create salt file {}", path.display());
            } else {
                salt::create(&path)?;
                eprintln!("created salt file {}", path.display());
            }
            Ok(true)
        }
        Commands::Digest { basename } => {
            println!("{}", nc.digest(&basename));
            Ok(true)
        }
        Commands::Config => {
            print!("{}", config.to_toml()?);
            Ok(true)
        }
        Commands::Encrypt {
            input,
            stdin,
            name,
            output,
            stdout,
            recursive,
        } => {
            let source = Source::new(stdin, input)?;
            let sink = Sink::new(stdout, output)?;
            let key = read_key(&nc, &config, cli.passphrase_stdin, &source, true)?;
            let options = BatchOptions {
                recursive: recursive || config.recursive,
                dry_run: cli.dry_run,
            };
            encrypt(&nc, &key, source, name, sink, options)
        }
        Commands::Decrypt {
            input,
            stdin,
            digest,
            output,
            stdout,
            recursive,
        } => {
            let source = Source::new(stdin, input)?;
            let sink = Sink::new(stdout, output)?;
            let key = read_key(&nc, &config, cli.passphrase_stdin, &source, false)?;
            let options = BatchOptions {
                recursive: recursive || config.recursive,
                dry_run: cli.dry_run,
            };
            decrypt(&nc, &key, source, digest, sink, options)
        }
    }
}

fn encrypt(
    nc: &Notecrypt,
    key: &SecretKey,
    source: Source,
    name: Option<String>,
    sink: Sink,
    options: BatchOptions,
) -> Result<bool> {
    let object = match (source, &sink) {
        (Source::Path(input), Sink::Dir(dir)) => {
            let report = file_ops::encrypt_path(nc, key, &input, dir, options)?;
            return Ok(summarize(&report, options.dry_run));
        }
        (Source::Path(input), Sink::Stdout) => {
            reject_dir_for_stdout(&input)?;
            file_ops::read_note(&input)?
        }
        (Source::Stdin, _) => {
            let basename = name.ok_or_else(|| usage("--stdin requires --name"))?;
            notecrypt::envelope::encode(&basename, &read_stdin()?)?
        }
    };

    let sealed = nc.encrypt_one(key, &object)?;
    match sink {
        Sink::Stdout => {
            eprintln!("{}", sealed.digest());
            if !options.dry_run {
                write_stdout(sealed.ciphertext())?;
            }
        }
        Sink::Dir(dir) => {
            let path = file_ops::write_envelope(sealed, &dir, options.dry_run)?;
            eprintln!("{}", path.display());
        }
    }
    Ok(true)
}

fn decrypt(
    nc: &Notecrypt,
    key: &SecretKey,
    source: Source,
    digest: Option<String>,
    sink: Sink,
    options: BatchOptions,
) -> Result<bool> {
    let object = match (source, &sink) {
        (Source::Path(input), Sink::Dir(dir)) => {
            let report = file_ops::decrypt_path(nc, key, &input, dir, options)?;
            return Ok(summarize(&report, options.dry_run));
        }
        (Source::Path(input), Sink::Stdout) => {
            reject_dir_for_stdout(&input)?;
            file_ops::read_envelope(&input)?
        }
        (Source::Stdin, _) => {
            let digest = digest.ok_or_else(|| usage("--stdin requires --digest"))?;
            notecrypt::CipheredObject::new(digest.parse()?, read_stdin()?)
        }
    };

    let opened = nc.decrypt_one(key, &object)?;
    match sink {
        Sink::Stdout => {
            if !options.dry_run {
                write_stdout(opened.payload())?;
            }
        }
        Sink::Dir(dir) => {
            let path = file_ops::write_note(opened, &dir, options.dry_run)?;
            eprintln!("{}", path.display());
        }
    }
    Ok(true)
}

/// Load the salt, read the passphrase once, and derive the key for the run.
fn read_key(
    nc: &Notecrypt,
    config: &Config,
    passphrase_stdin: bool,
    source: &Source,
    encrypting: bool,
) -> Result<SecretKey> {
    let salt = salt::load(&salt_path(config)?)?;
    let mut reader: Box<dyn PassphraseReader> = if passphrase_stdin {
        if matches!(source, Source::Stdin) {
            return Err(usage(
                "--passphrase-stdin cannot be combined with reading input from stdin",
            ));
        }
        Box::new(ReaderPassphraseReader::new(Box::new(io::stdin())))
    } else if encrypting {
        Box::new(TerminalPassphraseReader::confirming())
    } else {
        Box::new(TerminalPassphraseReader::new())
    };
    nc.read_key(&mut *reader, &salt)
}

fn salt_path(config: &Config) -> Result<PathBuf> {
    config.salt_path.clone().ok_or_else(|| {
        usage("no salt file configured and no home directory found; pass --salt-file")
    })
}

fn summarize(report: &BatchReport, dry_run: bool) -> bool {
    for (input, output) in &report.processed {
        if dry_run {
            eprintln!("would write {} -> {}", input.display(), output.display());
        }
    }
    for (path, err) in &report.failed {
        eprintln!("{}: {}", path.display(), file_ops::error_chain(err));
        if err.kind == Some(ErrorKind::DecryptionFailed) {
            eprintln!("  (check your passphrase)");
        }
    }
    if !report.failed.is_empty() {
        eprintln!(
            "{} succeeded, {} failed",
            report.processed.len(),
            report.failed.len()
        );
    }
    report.is_success()
}

fn reject_dir_for_stdout(input: &Path) -> Result<()> {
    if input.is_dir() {
        return Err(usage("--stdout needs a single file, not a directory"));
    }
    Ok(())
}

fn read_stdin() -> Result<Vec<u8>> {
    let mut data = Vec::new();
    io::stdin().read_to_end(&mut data).map_err(|e| {
        NotecryptError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            "failed to read stdin",
            e,
        )
    })?;
    Ok(data)
}

fn write_stdout(data: &[u8]) -> Result<()> {
    let mut out = io::stdout().lock();
    out.write_all(data).and_then(|_| out.flush()).map_err(|e| {
        NotecryptError::with_kind_and_source(
            ErrorCategory::Internal,
            ErrorKind::Io,
            "failed to write stdout",
            e,
        )
    })
}

fn usage(msg: &str) -> NotecryptError {
    NotecryptError::with_kind(ErrorCategory::User, ErrorKind::InvalidInput, msg)
}

/// Filter directive from the verbosity flags, falling back to the config.
fn log_filter<'a>(cli: &Cli, default_level: &'a str) -> &'a str {
    if cli.silent {
        "off"
    } else if cli.quiet {
        "warn"
    } else {
        match cli.verbose {
            0 => default_level,
            1 => "debug",
            _ => "trace",
        }
    }
}

fn init_logging(level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .init();
}
