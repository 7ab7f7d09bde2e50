use std::num::ParseIntError;
use std::path::PathBuf;

use clap::Parser;
use libmorph::MutatorConfig;

#[derive(Parser, Debug)]
#[command(name = "morpher", version, about = "Rewrite a function's byte fingerprint in place")]
pub struct Cli {
    /// Raw code image to mutate
    pub input: PathBuf,

    /// Leading bytes of the target function, hex ("55 48 8B EC" or "55488BEC")
    #[arg(short, long, value_parser = parse_hex_bytes)]
    pub signature: HexBytes,

    /// Number of signature bytes to match (defaults to all of them)
    #[arg(short, long)]
    pub length: Option<usize>,

    /// Where to write the mutated image (defaults to <INPUT>.mutated)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Seed for instruction selection, for reproducible output
    #[arg(long)]
    pub seed: Option<u64>,

    /// Mutation passes to run
    #[arg(short = 'n', long, default_value_t = 1)]
    pub passes: u32,

    /// Code mode of the image, 32 or 64
    #[arg(long, default_value_t = MutatorConfig::default().bitness, value_parser = parse_bitness)]
    pub bitness: u32,

    /// Function alignment used to find trailing dead bytes
    #[arg(long, default_value_t = MutatorConfig::default().alignment)]
    pub alignment: usize,

    /// Run the mutated image in executable memory afterwards
    #[arg(long)]
    pub execute: bool,

    /// Write a JSON run report to this path
    #[arg(long)]
    pub report: Option<PathBuf>,

    /// Directory for log files
    #[arg(long, default_value = "logs")]
    pub log_dir: PathBuf,

    /// Log verbosity
    #[arg(long, default_value_t = log::LevelFilter::Info)]
    pub log_level: log::LevelFilter,
}

impl Cli {
    pub fn config(&self) -> MutatorConfig {
        let mut config = MutatorConfig::new()
            .with_bitness(self.bitness)
            .with_alignment(self.alignment);

        if let Some(seed) = self.seed {
            config = config.with_seed(seed);
        }

        config
    }

    pub fn output_path(&self) -> PathBuf {
        self.output.clone().unwrap_or_else(|| {
            let mut name = self.input.clone().into_os_string();
            name.push(".mutated");
            PathBuf::from(name)
        })
    }

    pub fn match_length(&self) -> usize {
        self.length.unwrap_or(self.signature.0.len())
    }
}

fn parse_bitness(input: &str) -> Result<u32, String> {
    match input.parse::<u32>() {
        Ok(bitness @ (32 | 64)) => Ok(bitness),
        _ => Err(format!("bitness must be 32 or 64, got {:?}", input)),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HexBytes(pub Vec<u8>);

fn parse_hex_bytes(input: &str) -> Result<HexBytes, String> {
    let digits: String = input
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect();

    let digits = digits
        .strip_prefix("0x")
        .or_else(|| digits.strip_prefix("0X"))
        .unwrap_or(&digits);

    if digits.is_empty() {
        return Err("signature is empty".to_string());
    }

    if digits.len() % 2 != 0 {
        return Err(format!("odd number of hex digits in {:?}", input));
    }

    (0..digits.len())
        .step_by(2)
        .map(|i| {
            digits
                .get(i..i + 2)
                .ok_or_else(|| format!("invalid hex in {:?}", input))
                .and_then(|pair| {
                    u8::from_str_radix(pair, 16)
                        .map_err(|e: ParseIntError| format!("invalid hex {:?}: {}", pair, e))
                })
        })
        .collect::<Result<Vec<u8>, String>>()
        .map(HexBytes)
}
