use anyhow::Result;
use buildtidy::cli::{parse_args, Args, Common};
use buildtidy::config::{self, Config};
use buildtidy::downgrade::Downgrader;
use buildtidy::interrupt::{self, Outcome};
use buildtidy::line_endings::Normalizer;
use buildtidy::logger;
use std::io;
use std::path::PathBuf;

fn main() -> Result<()> {
    let args = parse_args()?;

    match args {
        Args::Eol {
            common,
            roots,
            extensions,
            dry_run,
        } => {
            let mut config = config::load_config(common.config.as_deref())?;
            if !roots.is_empty() {
                config.normalize.roots = roots;
            }
            if !extensions.is_empty() {
                config.normalize.extensions = extensions;
            }
            start(&config, &common)?;
            normalize(&config, dry_run)?;
        }
        Args::Downgrade {
            common,
            root,
            marker,
            dry_run,
        } => {
            let mut config = config::load_config(common.config.as_deref())?;
            if let Some(root) = root {
                config.downgrade.root = root;
            }
            if let Some(marker) = marker {
                config.downgrade.marker = marker;
            }
            start(&config, &common)?;
            downgrade(&config, dry_run)?;
        }
        Args::Config { common, show } => {
            show_config(common.config, show)?;
        }
    }

    Ok(())
}

/// Validate the merged configuration, then set up logging and Ctrl-C handling
fn start(config: &Config, common: &Common) -> Result<()> {
    config::validate_config(config)?;
    if let Some(log_path) = logger::init_logging(config.logging.debug || common.debug)? {
        tracing::info!("Debug log: {}", log_path.display());
    }
    interrupt::install_handler()
}

fn normalize(config: &Config, dry_run: bool) -> Result<()> {
    let normalizer = Normalizer::new(&config.normalize).with_dry_run(dry_run);
    let mut stdout = io::stdout().lock();

    match normalizer.run(interrupt::flag(), &mut stdout)? {
        // Ctrl-C ends the run quietly
        Outcome::Interrupted(_) => {}
        Outcome::Completed(report) => {
            tracing::info!(
                "{} file(s) visited, {} changed, {} CRLF sequence(s) replaced",
                report.files,
                report.changed,
                report.sequences
            );
            if dry_run {
                println!("\n{} of {} file(s) contain CRLF line endings", report.changed, report.files);
            }
        }
    }

    Ok(())
}

fn downgrade(config: &Config, dry_run: bool) -> Result<()> {
    let downgrader = Downgrader::new(&config.downgrade)?.with_dry_run(dry_run);
    let mut stdout = io::stdout().lock();

    match downgrader.run(&config.downgrade.root, interrupt::flag(), &mut stdout)? {
        Outcome::Interrupted(_) => {}
        Outcome::Completed(report) => {
            tracing::info!(
                "{} file(s) converted, {} already converted copies skipped",
                report.converted.len(),
                report.already_marked
            );
        }
    }

    Ok(())
}

fn show_config(explicit: Option<PathBuf>, show: bool) -> Result<()> {
    let config = config::load_config(explicit.as_deref())?;

    if show {
        print!("{}", config::render_config(&config)?);
        return Ok(());
    }

    let path = match explicit {
        Some(path) => path,
        None => config::config_file_path()?,
    };
    println!("{}", path.display());

    Ok(())
}
