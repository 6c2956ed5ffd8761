//! CellCrypt CLI - Command line interface for the cellular automaton cipher.
//!
//! This tool encrypts files into containers, decrypts them, writes raw
//! keystream, encodes short messages, and previews automaton grids.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::{Path, PathBuf};
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;
use zeroize::Zeroizing;

use cellcrypt_automaton::Grid;
use cellcrypt_cipher::{
    decrypt_file, decrypt_file_to, encrypt_file, write_keystream_file, CancelToken,
    MessageSession, Progress, ProgressObserver, StreamCipher,
};
use cellcrypt_common::CipherParams;

#[derive(Parser)]
#[command(name = "cellcrypt")]
#[command(about = "CellCrypt - Cellular automaton stream cipher")]
#[command(version)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Encrypt a file into a container.
    Encrypt {
        /// File to encrypt.
        #[arg(short, long)]
        input: PathBuf,

        /// Container file to write.
        #[arg(short, long)]
        output: PathBuf,

        #[command(flatten)]
        cipher: CipherArgs,
    },

    /// Decrypt a container, restoring the original file name.
    Decrypt {
        /// Container file to decrypt.
        #[arg(short, long)]
        input: PathBuf,

        /// Directory for the restored file (default: the container's directory).
        #[arg(short = 'd', long)]
        output_dir: Option<PathBuf>,

        #[command(flatten)]
        cipher: CipherArgs,
    },

    /// Write raw keystream bytes to a file.
    Keystream {
        /// Output file.
        #[arg(short, long)]
        output: PathBuf,

        /// Number of bytes to write.
        #[arg(short, long)]
        length: u64,

        #[command(flatten)]
        cipher: CipherArgs,
    },

    /// Encode or decode a short message.
    Message {
        #[command(subcommand)]
        action: MessageAction,

        #[command(flatten)]
        grid: GridArgs,
    },

    /// Print an automaton grid after a number of generations.
    Grid {
        #[command(flatten)]
        grid: GridArgs,

        /// Update rule to apply.
        #[arg(short, long, value_enum, default_value_t = Rule::Fredkin)]
        rule: Rule,
    },
}

#[derive(Subcommand)]
enum MessageAction {
    /// Encode plain text into base64.
    Encode {
        /// Message to encode.
        text: String,
    },

    /// Decode base64 back into text.
    Decode {
        /// Encoded message.
        text: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Rule {
    Fredkin,
    Conway,
}

/// Parameters shared by the file commands.
#[derive(Args)]
struct CipherArgs {
    /// Keystream seed (prompted for if neither this nor --config is given).
    #[arg(short, long)]
    seed: Option<u64>,

    /// Grid width.
    #[arg(long)]
    width: Option<usize>,

    /// Grid height.
    #[arg(long)]
    height: Option<usize>,

    /// Fredkin steps between keystream blocks.
    #[arg(short, long)]
    generations_per_block: Option<usize>,

    /// JSON parameter file; flags override its values.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

impl CipherArgs {
    /// Merge the parameter file, flags, and prompt into cipher parameters.
    fn resolve(&self) -> Result<CipherParams> {
        let mut params = match &self.config {
            Some(path) => load_params(path)?,
            None => match self.seed {
                Some(seed) => CipherParams::new(seed),
                None => CipherParams::new(prompt_seed()?),
            },
        };

        if let Some(seed) = self.seed {
            params.seed = seed;
        }
        if let Some(width) = self.width {
            params.width = width;
        }
        if let Some(height) = self.height {
            params.height = height;
        }
        if let Some(generations) = self.generations_per_block {
            params.generations_per_block = generations;
        }

        params.validate().context("Invalid cipher parameters")?;
        Ok(params)
    }
}

/// Grid used by the message and preview commands.
#[derive(Args)]
struct GridArgs {
    /// Seed for the initial grid (prompted for if omitted).
    #[arg(short, long)]
    seed: Option<u64>,

    /// Grid width.
    #[arg(long, default_value_t = 64)]
    width: usize,

    /// Grid height.
    #[arg(long, default_value_t = 32)]
    height: usize,

    /// Generations to run before use.
    #[arg(short, long, default_value_t = MessageSession::DEFAULT_GENERATIONS)]
    generations: u64,
}

impl GridArgs {
    fn seed(&self) -> Result<u64> {
        match self.seed {
            Some(seed) => Ok(seed),
            None => prompt_seed(),
        }
    }
}

/// Prints whole-percent progress to stderr.
struct ProgressPrinter {
    label: &'static str,
    last_percent: Option<u8>,
}

impl ProgressPrinter {
    fn new(label: &'static str) -> Self {
        Self {
            label,
            last_percent: None,
        }
    }
}

impl ProgressObserver for ProgressPrinter {
    fn on_progress(&mut self, progress: Progress) {
        let percent = progress.percent_complete();
        if self.last_percent != Some(percent) {
            eprint!("\r{}: {:>3}%", self.label, percent);
            self.last_percent = Some(percent);
        }
        if progress.remaining == 0 {
            eprintln!();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Encrypt {
            input,
            output,
            cipher,
        } => cmd_encrypt(input, output, cipher.resolve()?).await,

        Commands::Decrypt {
            input,
            output_dir,
            cipher,
        } => cmd_decrypt(input, output_dir, cipher.resolve()?).await,

        Commands::Keystream {
            output,
            length,
            cipher,
        } => cmd_keystream(output, length, cipher.resolve()?).await,

        Commands::Message { action, grid } => cmd_message(&action, &grid),

        Commands::Grid { grid, rule } => cmd_grid(&grid, rule),
    }
}

/// Prompt for the seed without echoing it.
fn prompt_seed() -> Result<u64> {
    let seed = Zeroizing::new(
        rpassword::prompt_password("Enter seed: ").context("Failed to read seed")?,
    );
    seed.trim()
        .parse()
        .context("Seed must be a non-negative integer")
}

/// Read cipher parameters from a JSON file.
fn load_params(path: &Path) -> Result<CipherParams> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read parameter file {}", path.display()))?;
    CipherParams::from_json(&json).context("Invalid parameter file")
}

/// Run cipher work on a blocking worker thread.
///
/// Ctrl-C sets the cancel token, which stops the work at the next keystream
/// block.
async fn run_blocking<T, F>(task: F) -> Result<T>
where
    F: FnOnce(CancelToken) -> cellcrypt_common::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let token = CancelToken::new();

    let watcher = {
        let token = token.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, cancelling");
                token.cancel();
            }
        })
    };

    let result = tokio::task::spawn_blocking(move || task(token))
        .await
        .context("Worker thread failed")?;
    watcher.abort();

    Ok(result?)
}

/// Encrypt a file into a container.
async fn cmd_encrypt(input: PathBuf, output: PathBuf, params: CipherParams) -> Result<()> {
    info!("Encrypting {} to {}", input.display(), output.display());

    let container_path = output.clone();
    let container = run_blocking(move |token| {
        let cipher = StreamCipher::new(params)?.with_cancel_token(token);
        encrypt_file(&cipher, &input, &output, &mut ProgressPrinter::new("Encrypting"))
    })
    .await
    .context("Failed to encrypt file")?;

    println!("File encrypted successfully!");
    println!("  Original: {}", container.original_name());
    println!("  Container: {}", container_path.display());
    println!("  Size: {} bytes", container.ciphertext().len());
    println!("  Encrypted at: {}", container.created_at());

    Ok(())
}

/// Decrypt a container.
async fn cmd_decrypt(
    input: PathBuf,
    output_dir: Option<PathBuf>,
    params: CipherParams,
) -> Result<()> {
    info!("Decrypting {}", input.display());

    let restored = run_blocking(move |token| {
        let cipher = StreamCipher::new(params)?.with_cancel_token(token);
        let mut progress = ProgressPrinter::new("Decrypting");
        match output_dir {
            Some(dir) => decrypt_file_to(&cipher, &input, &dir, &mut progress),
            None => decrypt_file(&cipher, &input, &mut progress),
        }
    })
    .await
    .context("Failed to decrypt file")?;

    println!("File decrypted: {}", restored.display());

    Ok(())
}

/// Write raw keystream to a file.
async fn cmd_keystream(output: PathBuf, length: u64, params: CipherParams) -> Result<()> {
    info!("Writing {} keystream bytes to {}", length, output.display());

    let path = output.clone();
    run_blocking(move |token| {
        let cipher = StreamCipher::new(params)?.with_cancel_token(token);
        write_keystream_file(
            &cipher,
            &output,
            length,
            &mut ProgressPrinter::new("Generating"),
        )
    })
    .await
    .context("Failed to write keystream")?;

    println!("Keystream written: {} ({} bytes)", path.display(), length);

    Ok(())
}

/// Encode or decode a short message.
fn cmd_message(action: &MessageAction, args: &GridArgs) -> Result<()> {
    let mut session = MessageSession::new().with_generations(args.generations);
    session
        .generate_from_seed(args.width, args.height, args.seed()?)
        .context("Failed to generate message grid")?;

    info!(
        "Message grid ready: up to {} bytes",
        session.maximum_message_length()
    );

    match action {
        MessageAction::Encode { text } => {
            let encoded = session.encrypt(text).context("Failed to encode message")?;
            println!("{}", encoded);
        }
        MessageAction::Decode { text } => {
            let decoded = session.decrypt(text).context("Failed to decode message")?;
            println!("{}", decoded);
        }
    }

    Ok(())
}

/// Print a grid after running it forward.
fn cmd_grid(args: &GridArgs, rule: Rule) -> Result<()> {
    let mut grid = Grid::seed_from_prng(args.width, args.height, args.seed()?)
        .context("Failed to build grid")?;

    for _ in 0..args.generations {
        match rule {
            Rule::Fredkin => grid.step()?,
            Rule::Conway => grid.step_conway()?,
        }
    }

    print!("{}", grid);
    println!(
        "Generation {}: {} of {} cells alive",
        grid.generation(),
        grid.population(),
        grid.cells().len()
    );

    Ok(())
}
