use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    "

License: MIT
Rust Edition: 2024"
);

#[derive(Parser, Debug)]
#[command(name = "buildtidy")]
#[command(about = "Line ending normalization and Visual Studio project downgrades")]
#[command(long_about = "buildtidy keeps a native source tree tidy.

It bundles two one-shot maintenance tools:

  eol        Convert CRLF line endings to LF in source files, in place
  downgrade  Write Visual Studio 2005 copies of 2008 project and solution files

Both walk directory trees, print one line per file they touch, and stop
cleanly on Ctrl-C: files already rewritten stay rewritten.

Defaults come from ~/.buildtidy/config.toml (created on first run) and can be
overridden per run with flags.

EXAMPLES:
  buildtidy eol                          Normalize ../src and ../test
  buildtidy eol src include --ext c      Normalize .c files under src and include
  buildtidy eol --dry-run                List files that still have CRLF
  buildtidy downgrade                    Convert projects under ..
  buildtidy downgrade . --marker .vs2005 Write Foo.vs2005.vcproj copies
  buildtidy config --show                Print the effective configuration")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(long_version = LONG_VERSION)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file to use instead of ~/.buildtidy/config.toml
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Write a debug log to ~/.buildtidy/buildtidy.log
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Convert CRLF line endings to LF
    #[command(long_about = "Convert CRLF line endings to LF, in place.

Every file under the given roots whose extension matches is read in full,
each CRLF is replaced with LF, and the file is written back. Lone CR bytes
are left alone. The path of each file is printed as it is processed.

EXAMPLES:
  buildtidy eol                          Use roots and extensions from config
  buildtidy eol ../src --ext h --ext cpp Explicit root and extensions")]
    Eol {
        /// Root directories (default: from config, ../src and ../test)
        #[arg(value_name = "ROOT")]
        roots: Vec<PathBuf>,

        /// File extension to process, without the dot (repeatable)
        #[arg(short = 'e', long = "ext", value_name = "EXT")]
        extensions: Vec<String>,

        /// List files containing CRLF without modifying them
        #[arg(short = 'd', long)]
        dry_run: bool,
    },

    /// Write Visual Studio 2005 copies of 2008 project files
    #[command(long_about = "Write Visual Studio 2005 copies of 2008 project files.

Each .vcproj, .csproj and .sln file under ROOT is rewritten line by line into
a sibling copy named <stem><marker>.<ext>; the original is not modified.
Solution copies reference the converted project copies. Files whose stem
already ends with the marker are skipped, and .svn directories are never
entered.

EXAMPLES:
  buildtidy downgrade                    Convert everything under ..
  buildtidy downgrade path/to/tree       Convert a specific tree")]
    Downgrade {
        /// Root directory (default: from config, ..)
        #[arg(value_name = "ROOT")]
        root: Option<PathBuf>,

        /// Suffix for converted copies (default: from config, .vc8)
        #[arg(short = 'm', long, value_name = "MARKER")]
        marker: Option<String>,

        /// Print the conversions without writing anything
        #[arg(short = 'd', long)]
        dry_run: bool,
    },

    /// Show or create the configuration file
    #[command(long_about = "Show or create the configuration file.

Without flags, prints the path of the configuration file, creating it with
commented defaults if it does not exist yet.

EXAMPLES:
  buildtidy config                       Print the config file path
  buildtidy config --show                Print the effective configuration")]
    Config {
        /// Print the effective configuration, including built-in rule tables
        #[arg(long = "show")]
        show: bool,
    },
}

pub fn parse_args() -> Result<Args> {
    let cli = Cli::parse();
    Ok(into_args(cli))
}

fn into_args(cli: Cli) -> Args {
    let common = Common {
        config: cli.config,
        debug: cli.debug,
    };

    match cli.command {
        Commands::Eol {
            roots,
            extensions,
            dry_run,
        } => Args::Eol {
            common,
            roots,
            extensions,
            dry_run,
        },
        Commands::Downgrade {
            root,
            marker,
            dry_run,
        } => Args::Downgrade {
            common,
            root,
            marker,
            dry_run,
        },
        Commands::Config { show } => Args::Config { common, show },
    }
}

/// Options shared by every subcommand
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Common {
    pub config: Option<PathBuf>,
    pub debug: bool,
}

#[derive(Debug, PartialEq, Eq)]
pub enum Args {
    Eol {
        common: Common,
        roots: Vec<PathBuf>,
        extensions: Vec<String>,
        dry_run: bool,
    },
    Downgrade {
        common: Common,
        root: Option<PathBuf>,
        marker: Option<String>,
        dry_run: bool,
    },
    Config {
        common: Common,
        show: bool,
    },
}
