use anyhow::{Context, Result, bail};
use clap::Parser;
use firbench::HarnessConfig;
use firbench::filter::ConfigurationEncoder;
use firbench::output::hex;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "encode_config")]
#[command(about = "Print the configuration bitstream for a filter, or decode one")]
struct Args {
    /// TOML harness configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Clock divider selection, 0-7 (overrides config)
    #[arg(long)]
    clock_select: Option<u8>,

    /// Antisymmetric impulse response (overrides config)
    #[arg(long)]
    antisymmetric: bool,

    /// Comma-separated coefficients in [-1, 1), centre tap last (overrides config)
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    coefficients: Option<Vec<f64>>,

    /// Decode a hex bitstream instead of encoding
    #[arg(short, long)]
    decode: Option<String>,

    /// Coefficient count of the bitstream being decoded
    #[arg(short, long, default_value_t = 16)]
    n_coeffs: usize,

    /// Also print each coefficient
    #[arg(short, long)]
    verbose: bool,
}

fn parse_hex(text: &str) -> Result<Vec<u8>> {
    let digits: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    let digits = digits.trim_start_matches("0x");
    if digits.len() % 2 != 0 {
        bail!("Odd number of hex digits in {:?}", text);
    }
    (0..digits.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&digits[i..i + 2], 16)
                .with_context(|| format!("Invalid hex byte {:?}", &digits[i..i + 2]))
        })
        .collect()
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => HarnessConfig::load(path)
            .with_context(|| format!("Failed to load config: {}", path.display()))?,
        None => HarnessConfig::default(),
    };
    if let Some(cs) = args.clock_select {
        config.filter.clock_select = cs;
    }
    if args.antisymmetric {
        config.filter.symmetric = false;
    }
    if args.coefficients.is_some() {
        config.filter.coefficients = args.coefficients.clone();
    }

    let configuration = match &args.decode {
        Some(text) => {
            let bytes = parse_hex(text)?;
            let encoder = ConfigurationEncoder::new(config.formats.coefficient, args.n_coeffs);
            encoder.decode(&bytes).context("Failed to decode bitstream")?
        }
        None => {
            let configuration = config
                .filter_configuration()
                .context("Failed to build filter configuration")?;
            let bytes = ConfigurationEncoder::for_configuration(&configuration)
                .encode(&configuration)?;
            println!("{}", hex(&bytes));
            configuration
        }
    };

    if args.decode.is_some() || args.verbose {
        println!("{}", configuration);
    }
    if args.verbose {
        for (i, c) in configuration.coefficients().iter().enumerate() {
            println!("  c[{:2}] = {:>8} ({:+.6})", i, c.raw(), c.to_f64());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hex() {
        assert_eq!(parse_hex("2CF10F").unwrap(), vec![0x2C, 0xF1, 0x0F]);
        assert_eq!(parse_hex("0x2c f1").unwrap(), vec![0x2C, 0xF1]);
        assert!(parse_hex("2CF").is_err());
        assert!(parse_hex("ZZ").is_err());
    }
}
