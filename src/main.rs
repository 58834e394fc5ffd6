// src/main.rs
use anyhow::Context;
use blockvfs::block_path::block_file_name;
use blockvfs::{BlockStore, StorageMode, Vfs, VfsConfig};
use clap::{ArgAction, Parser, Subcommand};
use env_logger::{Builder, Target};
use log::{debug, LevelFilter};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "blockvfs")]
#[command(version)]
#[command(about = "Block-sharded virtual file storage", long_about = "Reads, writes and inspects virtual files stored as <name>.blocks/block_NNNNNN files (4096 bytes each), or as plain native files in passthrough mode.")]
struct Cli {
    #[arg(long, value_name = "MODE", env = "BLOCKVFS_MODE", default_value_t = StorageMode::Block)]
    mode: StorageMode,
    /// Do not log individual file operations
    #[arg(long)]
    no_audit: bool,
    /// Append log lines to this file instead of stderr
    #[arg(long, value_name = "PATH")]
    log_file: Option<PathBuf>,
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write bytes into a virtual file
    Write {
        name: PathBuf,
        #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
        offset: i64,
        #[arg(long, conflicts_with = "input", required_unless_present = "input")]
        data: Option<String>,
        #[arg(long, value_name = "FILE")]
        input: Option<PathBuf>,
    },
    /// Read bytes from a virtual file (hex dump unless --output is given)
    Read {
        name: PathBuf,
        #[arg(long, default_value_t = 0, allow_negative_numbers = true)]
        offset: i64,
        #[arg(long)]
        len: usize,
        #[arg(long, value_name = "FILE")]
        output: Option<PathBuf>,
    },
    /// Set the logical size of a virtual file
    Truncate {
        name: PathBuf,
        #[arg(allow_negative_numbers = true)]
        size: i64,
    },
    /// Print the logical size of a virtual file
    Size { name: PathBuf },
    /// Remove a virtual file and all of its blocks
    Delete { name: PathBuf },
    /// List the block files backing a virtual file
    Blocks { name: PathBuf },
}

fn init_logger(verbosity: u8, log_file: Option<&Path>) -> anyhow::Result<()> {
    let mut builder = if std::env::var("RUST_LOG").is_ok() {
        Builder::from_default_env()
    } else {
        let level = match verbosity {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            _ => LevelFilter::Debug,
        };
        let mut builder = Builder::new();
        builder.filter(None, level);
        builder
    };

    builder.format(|buf, record| {
        let style = buf.default_level_style(record.level());
        writeln!(buf, "[{} {}] {}",
                 buf.timestamp_seconds(),
                 style.value(record.level()),
                 record.args()
        )
    });

    if let Some(path) = log_file {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Cannot open log file {:?}", path))?;
        builder.target(Target::Pipe(Box::new(file)));
    }

    builder.init();
    Ok(())
}

fn print_hex(offset: i64, data: &[u8]) -> io::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    for (i, chunk) in data.chunks(16).enumerate() {
        let ascii: String = chunk
            .iter()
            .map(|&b| if b.is_ascii_graphic() || b == b' ' { b as char } else { '.' })
            .collect();
        writeln!(out, "{:08x}  {:<32}  {}", offset as u64 + (i * 16) as u64, hex::encode(chunk), ascii)?;
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let v = if cli.verbose == 0 { 1 } else { cli.verbose };
    init_logger(v, cli.log_file.as_deref())?;

    let config = VfsConfig { mode: cli.mode, audit: !cli.no_audit };
    debug!("Config: {:?}", config);
    let vfs = Vfs::new(config);

    match cli.command {
        Command::Write { name, offset, data, input } => {
            let bytes = match (data, input) {
                (Some(text), None) => text.into_bytes(),
                (None, Some(path)) => fs::read(&path)
                    .with_context(|| format!("Cannot read input {:?}", path))?,
                _ => anyhow::bail!("Specify exactly one of --data or --input"),
            };

            let file = vfs.open(&name)?;
            let written = file.write(&bytes, offset)?;
            file.sync()?;
            println!("{} bytes written at offset {}", written, offset);
        }
        Command::Read { name, offset, len, output } => {
            let file = vfs.open(&name)?;
            let mut buf = vec![0u8; len];
            file.read(&mut buf, offset)?;

            match output {
                Some(path) => fs::write(&path, &buf)
                    .with_context(|| format!("Cannot write output {:?}", path))?,
                None => print_hex(offset, &buf)?,
            }
        }
        Command::Truncate { name, size } => {
            let file = vfs.open(&name)?;
            file.truncate(size)?;
            println!("{:?} truncated to {} bytes", name, size);
        }
        Command::Size { name } => {
            let file = vfs.open(&name)?;
            println!("{}", file.size()?);
        }
        Command::Delete { name } => {
            vfs.delete(&name)?;
            println!("{:?} deleted", name);
        }
        Command::Blocks { name } => {
            if config.mode != StorageMode::Block {
                anyhow::bail!("'blocks' needs --mode block (current mode: {})", config.mode);
            }

            let store = BlockStore::open(&name)?;
            let blocks = store.blocks()?;
            for block in &blocks {
                println!("{}  {:>4} bytes", block_file_name(block.index), block.len);
            }
            println!("{} block file(s), logical size {} bytes", blocks.len(), store.size()?);
        }
    }

    Ok(())
}
