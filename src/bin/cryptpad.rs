//! DA-CryptPad CLI - encrypted tree notebooks from the command line
//!
//! Document commands (`new`, `tree`, `show`, `add`, `edit`, `remove`,
//! `move`) work on `.cryptpad` files; `encrypt`/`decrypt` handle armored
//! free text.

use clap::{Parser, Subcommand};
use std::error::Error as StdError;
use std::path::{Path, PathBuf};
use std::process;
use tracing_subscriber::EnvFilter;

use cryptpad::document::{Document, EntryId};
use cryptpad::error::{CryptpadError, ErrorCategory, ErrorKind, Result};
use cryptpad::file_ops;
use cryptpad::passgen::PasswordGenerator;
use cryptpad::passphrase::{
    CachingPassphraseReader, PassphraseReader, ReaderPassphraseReader, TerminalPassphraseReader,
};
use cryptpad::{CipherScheme, CodecConfig};

#[derive(Parser)]
#[command(name = "cryptpad")]
#[command(version)]
#[command(about = "Password-encrypted tree notebook.", long_about = None)]
struct Cli {
    /// Read passphrase from stdin instead of from terminal
    #[arg(long, global = true)]
    passphrase_stdin: bool,

    /// Codec settings (TOML)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encrypt a text file into message armor
    #[command(alias = "e")]
    Encrypt {
        /// Path to the file whose contents is to be encrypted
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,

        /// Path to the file to write the encrypted text to
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,
    },

    /// Decrypt message armor into a text file
    #[command(alias = "d")]
    Decrypt {
        /// Path to the file whose contents is to be decrypted
        #[arg(short, long, value_name = "FILE")]
        input: PathBuf,

        /// Path to the file to write the unencrypted text to
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,
    },

    /// Create a new document
    New {
        file: PathBuf,

        /// Start without the welcome entry
        #[arg(long)]
        empty: bool,
    },

    /// Print the entry titles as an indented tree
    #[command(alias = "ls")]
    Tree { file: PathBuf },

    /// Print the body of an entry
    Show {
        file: PathBuf,

        /// Titles from the top level down to the entry
        #[arg(required = true)]
        path: Vec<String>,
    },

    /// Add an entry
    Add {
        file: PathBuf,

        title: String,

        /// Parent entry, one title per level (repeatable); top level if omitted
        #[arg(long = "under", value_name = "TITLE")]
        under: Vec<String>,

        #[arg(long)]
        body: Option<String>,
    },

    /// Change the title and/or body of an entry
    Edit {
        file: PathBuf,

        #[arg(required = true)]
        path: Vec<String>,

        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        body: Option<String>,
    },

    /// Remove an entry and everything below it
    #[command(alias = "rm")]
    Remove {
        file: PathBuf,

        #[arg(required = true)]
        path: Vec<String>,
    },

    /// Move an entry under another one, or reorder the top level
    #[command(alias = "mv")]
    Move {
        file: PathBuf,

        #[arg(required = true)]
        path: Vec<String>,

        /// New parent, one title per level (repeatable); top level if omitted
        #[arg(long = "to", value_name = "TITLE")]
        to: Vec<String>,

        /// Position among the new siblings; appends if omitted. Required
        /// when --to is omitted: an entry cannot be dropped onto the root.
        #[arg(long)]
        index: Option<usize>,
    },

    /// Generate a random password
    Passgen {
        #[arg(short, long, default_value_t = 16)]
        length: usize,

        /// Include capital letters
        #[arg(long)]
        capitals: bool,

        /// Include digits
        #[arg(long)]
        numbers: bool,

        /// Include special characters
        #[arg(long)]
        special: bool,
    },
}

fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {}", describe(&e));
        process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = match &cli.config {
        Some(path) => CodecConfig::load(path)?,
        None => CodecConfig::default(),
    };
    let stdin = cli.passphrase_stdin;

    match cli.command {
        Commands::Encrypt { input, output } => {
            let mut reader = get_passphrase_reader(stdin, true);
            file_ops::encrypt_text_file(&input, &output, &mut *reader, &config)
        }
        Commands::Decrypt { input, output } => {
            let mut reader = get_passphrase_reader(stdin, false);
            file_ops::decrypt_text_file(&input, &output, &mut *reader, &config)
        }
        Commands::New { file, empty } => {
            let doc = if empty {
                Document::new()
            } else {
                Document::with_welcome_entry()
            };
            let mut reader = get_passphrase_reader(stdin, true);
            let written = file_ops::save_document(&file, &doc, &mut *reader, &config)?;
            println!("{}", written.display());
            Ok(())
        }
        Commands::Tree { file } => {
            let mut reader = get_passphrase_reader(stdin, false);
            let doc = file_ops::open_document(&file, &mut *reader, &config)?.document;
            for (depth, id) in doc.walk() {
                println!("{}{}", "  ".repeat(depth), doc.title(id)?);
            }
            Ok(())
        }
        Commands::Show { file, path } => {
            let mut reader = get_passphrase_reader(stdin, false);
            let doc = file_ops::open_document(&file, &mut *reader, &config)?.document;
            let id = resolve(&doc, &path)?;
            print!("{}", doc.body(id)?);
            Ok(())
        }
        Commands::Add {
            file,
            title,
            under,
            body,
        } => modify(&file, stdin, &config, |doc| {
            let parent = resolve_parent(doc, &under)?;
            let id = doc.add_entry(parent, title)?;
            if let Some(body) = body {
                doc.set_body(id, body)?;
            }
            Ok(())
        }),
        Commands::Edit {
            file,
            path,
            title,
            body,
        } => modify(&file, stdin, &config, |doc| {
            let id = resolve(doc, &path)?;
            if let Some(title) = title {
                doc.set_title(id, title)?;
            }
            if let Some(body) = body {
                doc.set_body(id, body)?;
            }
            Ok(())
        }),
        Commands::Remove { file, path } => modify(&file, stdin, &config, |doc| {
            let id = resolve(doc, &path)?;
            doc.delete_entry(id)?;
            Ok(())
        }),
        Commands::Move {
            file,
            path,
            to,
            index,
        } => modify(&file, stdin, &config, |doc| {
            let id = resolve(doc, &path)?;
            let parent = resolve_parent(doc, &to)?;
            doc.move_entry(id, parent, index)
        }),
        Commands::Passgen {
            length,
            capitals,
            numbers,
            special,
        } => {
            let password = PasswordGenerator::new(capitals, numbers, special).generate(length)?;
            println!("{}", password.as_str());
            Ok(())
        }
    }
}

/// Open `file`, apply `edit`, and save it back with the same passphrase.
fn modify(
    file: &Path,
    stdin: bool,
    config: &CodecConfig,
    edit: impl FnOnce(&mut Document) -> Result<()>,
) -> Result<()> {
    let mut reader = CachingPassphraseReader::new(get_passphrase_reader(stdin, false));
    let decoded = file_ops::open_document(file, &mut reader, config)?;
    let mut doc = decoded.document;
    edit(&mut doc)?;
    let written = file_ops::save_document(file, &doc, &mut reader, config)?;
    if decoded.scheme == CipherScheme::LegacyInsecure || written != file {
        eprintln!("saved as {}", written.display());
    }
    Ok(())
}

fn resolve(doc: &Document, path: &[String]) -> Result<EntryId> {
    let titles: Vec<&str> = path.iter().map(String::as_str).collect();
    doc.find_path(&titles).ok_or_else(|| {
        CryptpadError::with_kind(
            ErrorCategory::User,
            ErrorKind::EntryNotFound,
            format!("no entry at {}", path.join(" / ")),
        )
    })
}

fn resolve_parent(doc: &Document, path: &[String]) -> Result<Option<EntryId>> {
    if path.is_empty() {
        return Ok(None);
    }
    resolve(doc, path).map(Some)
}

/// The error message followed by each underlying cause.
fn describe(err: &CryptpadError) -> String {
    let mut out = err.to_string();
    let mut source: Option<&(dyn StdError + 'static)> = err.source();
    while let Some(cause) = source {
        out.push_str(": ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}

fn get_passphrase_reader(use_stdin: bool, confirm: bool) -> Box<dyn PassphraseReader> {
    if use_stdin {
        Box::new(ReaderPassphraseReader::new(Box::new(std::io::stdin())))
    } else if confirm {
        Box::new(TerminalPassphraseReader::with_confirmation())
    } else {
        Box::new(TerminalPassphraseReader::new())
    }
}
