use clap::{Parser, Subcommand};
use packlab::archive::PackedFile;
use packlab::pipeline::{UnpackOptions, DEFAULT_MAX_OUTPUT_SIZE};
use packlab::crypto::DEFAULT_SEED;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "packlab", about = "Unpack PackLab packed files")]
struct Cli {
    /// Log every pipeline stage
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode a packed file
    Unpack {
        input:  PathBuf,
        output: PathBuf,
        /// Decryption key (decimal or 0x-prefixed hex)
        #[arg(short, long, value_parser = parse_key, default_value_t = DEFAULT_SEED)]
        key: u16,
        /// Do not verify embedded checksums
        #[arg(long)]
        no_verify: bool,
        /// Fail instead of warning on a checksum mismatch
        #[arg(long)]
        strict: bool,
        /// Largest decoded size a header may declare, in bytes
        #[arg(long, default_value_t = DEFAULT_MAX_OUTPUT_SIZE)]
        max_size: u64,
        /// Decode only the first segment
        #[arg(long)]
        first_only: bool,
    },
    /// Show the header of every segment
    Info {
        input: PathBuf,
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match cli.command {

        // ── Unpack ───────────────────────────────────────────────────────────
        Commands::Unpack { input, output, key, no_verify, strict, max_size, first_only } => {
            let opts = UnpackOptions {
                key,
                verify_checksum: !no_verify,
                strict_checksum: strict,
                max_output_size: max_size,
                follow_segments: !first_only,
            };
            let packed = PackedFile::open(&input)?;
            let result = packed.unpack_to(&output, &opts)?;

            println!(
                "Unpacked {} segment(s), {} bytes → {}",
                result.segments.len(), result.data.len(), output.display()
            );
            if !result.is_verified() {
                return Err("checksum verification failed".into());
            }
        }

        // ── Info ─────────────────────────────────────────────────────────────
        Commands::Info { input, json } => {
            let packed  = PackedFile::open(&input)?;
            let headers = packed.headers()?;

            if json {
                let entries: Vec<_> = headers
                    .iter()
                    .map(|(offset, h)| serde_json::json!({ "offset": offset, "header": h }))
                    .collect();
                println!("{}", serde_json::to_string_pretty(&entries)?);
                return Ok(());
            }

            println!("── Packed file ─────────────────────────────────────────");
            println!("  Path           {}", input.display());
            println!("  Segments       {}", headers.len());
            for (offset, h) in &headers {
                println!("── Segment @ {offset}");
                println!("  Flags          {:#04x}{}", h.flags, flag_names(h));
                println!("  Header length  {} B", h.header_len);
                println!("  Stored size    {} B", h.data_size);
                println!("  Original size  {} B", h.orig_data_size);
                if let Some(dict) = &h.dictionary_data {
                    println!("  Dictionary     {}", hex::encode(dict));
                }
                if let Some(sum) = h.checksum_value {
                    println!("  Checksum       {:#06x}", sum);
                }
            }
        }
    }

    Ok(())
}

// ── helpers ──────────────────────────────────────────────────────────────────

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn parse_key(s: &str) -> Result<u16, String> {
    let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        Some(hex) => u16::from_str_radix(hex, 16),
        None      => s.parse::<u16>(),
    };
    parsed.map_err(|e| format!("invalid key '{s}': {e}"))
}

fn flag_names(h: &packlab::PackedHeader) -> String {
    let names: Vec<&str> = [
        (h.is_compressed,   "compressed"),
        (h.is_encrypted,    "encrypted"),
        (h.is_checksummed,  "checksummed"),
        (h.should_continue, "continue"),
        (h.should_float,    "float"),
        (h.should_float3,   "float3"),
    ]
    .iter()
    .filter(|(set, _)| *set)
    .map(|(_, name)| *name)
    .collect();

    if names.is_empty() { String::new() } else { format!(" ({})", names.join(", ")) }
}
