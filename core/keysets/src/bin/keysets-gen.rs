use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use fhe_keysets::conf::init_conf_keysets_telemetry;
use fhe_keysets::{KeysetCache, KeysetInfo, Wire};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[clap(name = "FHE Keyset Generator")]
#[clap(about = "A CLI tool for generating FHE keysets into the shared keyset cache. \
    A keyset is fully determined by its info file and a 128-bit seed given as two 64-bit halves. \n
    For example, to make sure the keyset of a compiled program is cached \
    run: \n
    ./keysets-gen populate --keyset-info keyset.json --seed-msb 0 --seed-lsb 42")]
struct Cli {
    /// Optional configuration file, layered on top of the files under `config/`.
    #[clap(long, default_value = None)]
    config: Option<String>,
    /// Cache root overriding the configured one.
    #[clap(long, default_value = None)]
    cache_dir: Option<PathBuf>,
    #[clap(subcommand)]
    command: Command,
}

#[derive(Args, Clone, Debug)]
struct KeysetSelection {
    /// JSON file holding the keyset info.
    #[clap(long)]
    keyset_info: PathBuf,
    /// Most significant half of the seed.
    #[clap(long, default_value_t = 0)]
    seed_msb: u64,
    /// Least significant half of the seed.
    #[clap(long)]
    seed_lsb: u64,
}

#[derive(Subcommand, Clone, Debug)]
enum Command {
    /// Generate the keyset into the cache unless it is already there.
    Populate {
        #[clap(flatten)]
        keyset: KeysetSelection,
    },
    /// Print the cache entry directory of the keyset, whether it exists or not.
    Locate {
        #[clap(flatten)]
        keyset: KeysetSelection,
    },
    /// Write the wire form of the server keyset to a file, going through the cache.
    ExportServerKeyset {
        #[clap(flatten)]
        keyset: KeysetSelection,
        #[clap(long)]
        out: PathBuf,
    },
}

fn read_info(path: &Path) -> anyhow::Result<KeysetInfo> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("cannot read keyset info {}", path.display()))?;
    let info: KeysetInfo = serde_json::from_str(&json)
        .with_context(|| format!("cannot parse keyset info {}", path.display()))?;
    info.validate()?;
    Ok(info)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let (conf, _guard) = init_conf_keysets_telemetry(cli.config.as_deref())?;
    let cache_root = cli.cache_dir.unwrap_or(conf.cache_dir);

    match cli.command {
        Command::Populate { keyset } => {
            let info = read_info(&keyset.keyset_info)?;
            let cache = KeysetCache::new(&cache_root)?;
            cache.get_keyset(&info, keyset.seed_msb, keyset.seed_lsb)?;
            let entry = cache.entry_path(&info, keyset.seed_msb, keyset.seed_lsb)?;
            if cache.generations() == 0 {
                tracing::info!("Keyset already cached at {}", entry.display());
            }
            println!("{}", entry.display());
        }
        Command::Locate { keyset } => {
            let info = read_info(&keyset.keyset_info)?;
            let cache = KeysetCache::new(&cache_root)?;
            println!(
                "{}",
                cache
                    .entry_path(&info, keyset.seed_msb, keyset.seed_lsb)?
                    .display()
            );
        }
        Command::ExportServerKeyset { keyset, out } => {
            let info = read_info(&keyset.keyset_info)?;
            let cache = KeysetCache::new(&cache_root)?;
            let keyset = cache.get_keyset(&info, keyset.seed_msb, keyset.seed_lsb)?;
            let bytes = keyset.server.to_wire()?;
            fs::write(&out, &bytes)
                .with_context(|| format!("cannot write server keyset to {}", out.display()))?;
            tracing::info!(
                "Wrote server keyset ({} bytes) to {}",
                bytes.len(),
                out.display()
            );
        }
    }
    Ok(())
}
