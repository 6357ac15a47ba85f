//! Command line entry point.
//!
//! Usage:
//!   rusty-fill input.xlsx output.xlsx 'All!A1:D200' 'Filtered!A1:A40' 'Filtered!B1:C40'

use anyhow::Context;
use clap::Parser;
use log::LevelFilter;
use rusty_fill::FillOptions;
use rusty_fill::RustyFillError;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "rusty-fill")]
#[command(about = "Readd deleted columns to an Excel spreadsheet by looking rows up in a source range")]
#[command(version)]
struct Args {
    /// Workbook to read (.xlsx or .xlsm)
    input_file: PathBuf,

    /// Workbook to write
    output_file: PathBuf,

    /// Region with the complete rows, e.g. 'All!A1:D200'
    source_range: String,

    /// Region with the key columns of the rows to fill
    key_range: String,

    /// Region to fill, as high as the key region
    target_range: String,

    /// Replace OUTPUT_FILE if it exists
    #[arg(short = 'y', long)]
    overwrite: bool,

    /// Leave rows without a match untouched instead of failing
    #[arg(long)]
    allow_missing: bool,

    /// More logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, conflicts_with = "quiet")]
    verbose: u8,

    /// Only log errors
    #[arg(short, long)]
    quiet: bool,
}

impl Args {
    fn log_level(&self) -> LevelFilter {
        match (self.quiet, self.verbose) {
            (true, _) => LevelFilter::Error,
            (false, 0) => LevelFilter::Warn,
            (false, 1) => LevelFilter::Info,
            (false, 2) => LevelFilter::Debug,
            (false, _) => LevelFilter::Trace,
        }
    }
}

impl From<Args> for FillOptions {
    fn from(args: Args) -> Self {
        FillOptions {
            input_file: args.input_file,
            output_file: args.output_file,
            source_range: args.source_range,
            key_range: args.key_range,
            target_range: args.target_range,
            overwrite: args.overwrite,
            allow_missing: args.allow_missing,
        }
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    // RUST_LOG wins over the command line flags
    env_logger::Builder::new()
        .filter_level(args.log_level())
        .parse_default_env()
        .init();

    let options = FillOptions::from(args);
    let result = rusty_fill::run(&options)
        .with_context(|| format!("Failed to fill '{}'", options.output_file.display()));
    match result {
        Ok(summary) => {
            println!("Done");
            println!("{summary}");
            ExitCode::SUCCESS
        }
        Err(error) => {
            eprintln!("Error: {error:#}");
            let code = error
                .downcast_ref::<RustyFillError>()
                .map(RustyFillError::exit_code)
                .unwrap_or(1);
            ExitCode::from(code as u8)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(flags: &[&str]) -> Result<Args, clap::Error> {
        let positional = ["rusty-fill", "in.xlsx", "out.xlsx", "All!A1:D9", "Keys!A1:A5", "Keys!B1:C5"];
        Args::try_parse_from(positional.iter().chain(flags))
    }

    #[test]
    fn log_levels() {
        assert_eq!(parse(&[]).unwrap().log_level(), LevelFilter::Warn);
        assert_eq!(parse(&["-v"]).unwrap().log_level(), LevelFilter::Info);
        assert_eq!(parse(&["-vv"]).unwrap().log_level(), LevelFilter::Debug);
        assert_eq!(parse(&["-v", "-v", "-v", "-v"]).unwrap().log_level(), LevelFilter::Trace);
        assert_eq!(parse(&["--quiet"]).unwrap().log_level(), LevelFilter::Error);
    }

    #[test]
    fn verbose_conflicts_with_quiet() {
        let error = parse(&["-v", "-q"]).unwrap_err();
        assert_eq!(error.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn arguments_become_options() {
        let options = FillOptions::from(parse(&["-y", "--allow-missing"]).unwrap());
        assert_eq!(options.input_file, PathBuf::from("in.xlsx"));
        assert_eq!(options.output_file, PathBuf::from("out.xlsx"));
        assert_eq!(
            (options.source_range.as_str(), options.key_range.as_str(), options.target_range.as_str()),
            ("All!A1:D9", "Keys!A1:A5", "Keys!B1:C5")
        );
        assert!(options.overwrite && options.allow_missing);

        let options = FillOptions::from(parse(&[]).unwrap());
        assert!(!options.overwrite && !options.allow_missing);
    }
}
