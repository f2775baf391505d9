use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use pkgiface_core::{BuildOptions, PipelineReport, UnitOptions, build_path, check_path, dump_path};

#[derive(Parser, Debug)]
#[command(name = "pkgiface")]
#[command(about = "Package interface resolver and export writer")]
#[command(version)]
struct Cli {
    /// Log loader and importer decisions.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    Build(BuildArgs),
    Check(CheckArgs),
    Dump(CheckArgs),
}

#[derive(Args, Debug)]
struct BuildArgs {
    input: PathBuf,

    #[arg(short = 'o', long = "output")]
    output: PathBuf,

    #[arg(short = 'I', long = "include", value_name = "DIR")]
    include_dirs: Vec<PathBuf>,

    /// Also write an assembly header with constants and struct offsets.
    #[arg(long = "asmhdr", value_name = "PATH")]
    asm_header: Option<PathBuf>,

    /// List export and import decisions.
    #[arg(short = 'E', long = "list-exports")]
    list_exports: bool,

    #[arg(long)]
    debug_export: bool,
}

#[derive(Args, Debug)]
struct CheckArgs {
    input: PathBuf,

    #[arg(short = 'I', long = "include", value_name = "DIR")]
    include_dirs: Vec<PathBuf>,
}

fn main() {
    let cli = Cli::parse();
    let level = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let exit_code = match cli.command {
        Commands::Build(args) => run_build(args),
        Commands::Check(args) => run_check(args),
        Commands::Dump(args) => run_dump(args),
    };

    std::process::exit(exit_code);
}

fn run_build(args: BuildArgs) -> i32 {
    let opts = BuildOptions {
        include_dirs: args.include_dirs,
        unit: UnitOptions {
            debug_export: args.debug_export,
            list_exports: args.list_exports,
            asm_header: args.asm_header,
            ..UnitOptions::default()
        },
    };

    match build_path(&args.input, &args.output, &opts) {
        Ok(report) => {
            print_echo(&report);
            log::debug!(
                "wrote {} ({} byte export section)",
                args.output.display(),
                report.export_size.unwrap_or_default()
            );
            0
        }
        Err(_) => 1,
    }
}

fn run_check(args: CheckArgs) -> i32 {
    match check_path(&args.input, &check_options(args.include_dirs)) {
        Ok(report) => {
            print_echo(&report);
            0
        }
        Err(_) => 1,
    }
}

fn run_dump(args: CheckArgs) -> i32 {
    match dump_path(&args.input, &check_options(args.include_dirs)) {
        Ok(dump) => {
            print!("{dump}");
            0
        }
        Err(_) => 1,
    }
}

fn check_options(include_dirs: Vec<PathBuf>) -> BuildOptions {
    BuildOptions {
        include_dirs,
        unit: UnitOptions::default(),
    }
}

fn print_echo(report: &PipelineReport) {
    for line in &report.echo {
        println!("{line}");
    }
}

#[cfg(test)]
mod tests {
    use super::{Cli, Commands};
    use clap::Parser;

    #[test]
    fn parses_build_command() {
        let cli = Cli::parse_from([
            "pkgiface",
            "build",
            "app.pkg",
            "-o",
            "app.o",
            "-I",
            "deps",
            "--asmhdr",
            "go_asm.h",
            "-E",
            "-v",
        ]);

        assert!(cli.verbose);
        let Commands::Build(args) = cli.command else {
            panic!("expected build command");
        };
        assert_eq!(args.include_dirs.len(), 1);
        assert!(args.list_exports);
        assert!(!args.debug_export);
        assert_eq!(
            args.asm_header.as_deref(),
            Some(std::path::Path::new("go_asm.h"))
        );
    }

    #[test]
    fn build_requires_output() {
        assert!(Cli::try_parse_from(["pkgiface", "build", "app.pkg"]).is_err());
    }
}
