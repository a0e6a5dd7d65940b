use std::io::{self, Write};

use anyhow::{Context, Result};
use pulse_config::{config_path, ensure_workspace_config, validate_config};
use pulsed::authors::{run_authors, run_dedupe_authors, run_merge_authors};
use pulsed::cli::{Cli, Commands, parse_cli};
use pulsed::import::run_import;
use pulsed::logging::init_logging;
use pulsed::recalculate::{RecalculateRequest, run_recalculate};
use pulsed::report::run_report;

fn main() -> Result<()> {
    let cli = parse_cli();
    run(cli)
}

fn run(cli: Cli) -> Result<()> {
    init_logging(cli.log_format)?;

    let workspace = cli.workspace.canonicalize().with_context(|| {
        format!(
            "failed to resolve workspace path {}",
            cli.workspace.display()
        )
    })?;

    let config = ensure_workspace_config(&workspace).with_context(|| {
        format!(
            "failed to load or create workspace config at {}",
            config_path(&workspace).display()
        )
    })?;
    for warning in validate_config(&config) {
        eprintln!(
            "PULSE config warning [{}]: {}",
            warning.code, warning.message
        );
    }

    let stdout = io::stdout();
    let mut out = stdout.lock();

    match cli.command {
        Commands::Import(args) => run_import(&workspace, &args.path, &mut out)?,
        Commands::Recalculate(args) => run_recalculate(
            &workspace,
            config,
            RecalculateRequest {
                repositories: args.repositories,
                all: args.all,
                horizon_end: args.horizon_end,
            },
            &mut out,
        )?,
        Commands::Report(args) => run_report(
            &workspace,
            args.repository,
            args.limit,
            args.output,
            &mut out,
        )?,
        Commands::Authors(args) => run_authors(&workspace, config, args.output, &mut out)?,
        Commands::MergeAuthors(args) => {
            run_merge_authors(&workspace, config, args.keep, &args.merge, &mut out)?
        }
        Commands::DedupeAuthors => run_dedupe_authors(&workspace, config, &mut out)?,
    }

    out.flush()?;
    Ok(())
}
