mod app;

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use log::{error, warn};
use regex::Regex;

use ilopt::metadata;
use ilopt::optimize::{Optimizer, StripLocalsInit};

use crate::app::{Cli, Command, GlobalOptions};

fn main() {
    let cli = Cli::parse();

    let level = if cli.global.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .target(env_logger::Target::Stderr)
        .format_timestamp(None)
        .format_module_path(false)
        .format_target(false)
        .init();

    let result = match &cli.command {
        Command::StripLocalsInit {
            assemblies,
            mode,
            filter,
            output_dir,
        } => strip_locals_init(assemblies, (*mode).into(), filter.as_deref(), output_dir, &cli.global),
    };

    if let Err(err) = result {
        error!("{err:#}");
        std::process::exit(i32::MIN);
    }
}

fn strip_locals_init(
    assemblies: &[PathBuf],
    mode: ilopt::optimize::Mode,
    filter: Option<&str>,
    output_dir: &Path,
    global: &GlobalOptions,
) -> anyhow::Result<()> {
    let filter = filter
        .map(Regex::new)
        .transpose()
        .context("invalid --filter regex")?;

    for path in assemblies {
        let file_name = path
            .file_name()
            .with_context(|| format!("{} has no file name", path.display()))?;
        let output = output_dir.join(file_name);
        if same_file(path, &output) {
            warn!(
                "{}: output path equals the input path, skipping",
                path.display()
            );
            continue;
        }

        let data =
            std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        let mut module = metadata::read_module(&data)
            .with_context(|| format!("parsing {}", path.display()))?;

        let mut optimizer = Optimizer::new();
        if let Some(filter) = filter.clone() {
            optimizer = optimizer.with_filter(filter);
        }
        optimizer.add(Box::new(StripLocalsInit::new(mode)));
        let report = optimizer
            .run(&mut module)
            .with_context(|| format!("optimizing {}", path.display()))?;

        println!(
            "{}: Processed {} Modules, {} Types, {} Events, {} Properties, {} Methods",
            path.display(),
            report.modules,
            report.types,
            report.events,
            report.properties,
            report.methods
        );
        for stats in &report.optimizations {
            println!("{stats}");
        }

        if output.exists() && !global.yes && !confirm_overwrite(&output)? {
            warn!("{}: not overwritten", output.display());
            continue;
        }
        std::fs::create_dir_all(output_dir)
            .with_context(|| format!("creating {}", output_dir.display()))?;
        let patched = metadata::patched_image(&module, &data)
            .with_context(|| format!("patching {}", path.display()))?;
        metadata::write_module(&output, &patched)
            .with_context(|| format!("writing {}", output.display()))?;
    }
    Ok(())
}

/// Whether two paths name the same file, resolving through the filesystem
/// when both exist.
fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

/// Asks `Y/n` on standard input; an empty answer accepts.
fn confirm_overwrite(path: &Path) -> anyhow::Result<bool> {
    print!("{} exists, overwrite? [Y/n] ", path.display());
    std::io::stdout().flush()?;
    let mut answer = String::new();
    std::io::stdin().read_line(&mut answer)?;
    let answer = answer.trim();
    Ok(answer.is_empty() || answer.eq_ignore_ascii_case("y") || answer.eq_ignore_ascii_case("yes"))
}
