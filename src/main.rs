// dircrypt - Command Line Front End
// =======================================================
// Local batch mode and single-file mode for the encryption engine.
//
//   dircrypt encrypt -i notes.txt -p secret          one file
//   dircrypt encrypt-dir -p secret --embed-names     the configured input tree
//   dircrypt decrypt-dir -p secret                   the configured encrypted tree
//
// Session-scoped operations are a library API (`SessionService`) for a
// server front end and are not exposed here.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use dircrypt::progress::{count_containers, count_files};
use dircrypt::{
    decrypt_file, encrypt_file, run_local_decrypt, run_local_encrypt, ConsoleProgress, EngineConfig, Operation,
    Outcome,
};

/// Password-based file and directory encryption
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// TOML configuration file; built-in defaults apply when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encrypt a single file
    Encrypt {
        /// The file to encrypt
        #[arg(short, long)]
        input: PathBuf,

        /// Directory for the container (defaults to the configured encrypted directory)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Password used to derive the key
        #[arg(short, long)]
        password: String,

        /// Store the original file name inside the container
        #[arg(short, long)]
        embed_name: bool,
    },

    /// Decrypt a single container
    Decrypt {
        /// The container to decrypt
        #[arg(short, long)]
        input: PathBuf,

        /// Directory for the plaintext (defaults to the configured decrypted directory)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Password used at encryption time
        #[arg(short, long)]
        password: String,
    },

    /// Encrypt the whole input tree, mirroring its structure
    EncryptDir {
        #[arg(short, long)]
        password: String,

        /// Hide file names on disk and store them inside each container
        #[arg(short, long)]
        embed_names: bool,
    },

    /// Decrypt every container in the encrypted tree
    DecryptDir {
        #[arg(short, long)]
        password: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = load_config(cli.config.as_deref())?;
    debug!(?config, "configuration loaded");

    match cli.command {
        Commands::Encrypt {
            input,
            output,
            password,
            embed_name,
        } => {
            let output_dir = output.unwrap_or_else(|| config.local.encrypted_dir.clone());
            fs::create_dir_all(&output_dir).context("Failed to create output directory")?;

            let out = encrypt_file(&config, &input, &output_dir, &password, embed_name)
                .with_context(|| format!("Failed to encrypt {}", input.display()))?;
            println!("File encrypted and saved to '{}'.", out.display());
        }

        Commands::Decrypt { input, output, password } => {
            let output_dir = output.unwrap_or_else(|| config.local.decrypted_dir.clone());
            fs::create_dir_all(&output_dir).context("Failed to create output directory")?;

            let out = decrypt_file(&config, &input, &output_dir, &password)
                .with_context(|| format!("Failed to decrypt {}", input.display()))?;
            println!("File decrypted and saved to '{}'.", out.display());
        }

        Commands::EncryptDir { password, embed_names } => {
            let progress = ConsoleProgress::new("encrypt");
            progress.set_total(count_files(&config.local.input_dir));
            let result = run_local_encrypt(&config, &password, embed_names, &progress);
            progress.finish();
            let outcome = result.context("Failed to encrypt directory")?;
            print_outcome(&config, Operation::Encrypt, &outcome, &config.local.encrypted_dir);
        }

        Commands::DecryptDir { password } => {
            let progress = ConsoleProgress::new("decrypt");
            progress.set_total(count_containers(&config.local.encrypted_dir, &config));
            let result = run_local_decrypt(&config, &password, &progress);
            progress.finish();
            let outcome = result.context("Failed to decrypt directory")?;
            print_outcome(&config, Operation::Decrypt, &outcome, &config.local.decrypted_dir);
        }
    }

    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    match path {
        Some(path) => EngineConfig::load(path).with_context(|| format!("Failed to load {}", path.display())),
        None => {
            let mut config = EngineConfig::default();
            config.apply_env_overrides();
            config.validate()?;
            Ok(config)
        }
    }
}

/// Print the counts and a bounded failure list for a local batch run
fn print_outcome(config: &EngineConfig, operation: Operation, outcome: &Outcome, output_root: &Path) {
    println!("{}", outcome.summary(operation, output_root));

    if operation == Operation::Decrypt {
        println!(
            "{} of {} files were containers.",
            outcome.total_candidate_files, outcome.total_files_seen
        );
    }
    if outcome.wrong_password_count > 0 {
        println!("{} file(s) skipped: wrong password.", outcome.wrong_password_count);
    }
    if outcome.corruption_count > 0 {
        println!("{} file(s) skipped: damaged container.", outcome.corruption_count);
    }
    if outcome.invalid_count > 0 {
        println!("{} file(s) skipped: invalid input.", outcome.invalid_count);
    }

    let lines = outcome.failure_lines(config.failure_report_limit);
    if !lines.is_empty() {
        println!("Failures:");
        for line in lines {
            println!("  {}", line);
        }
    }
}
