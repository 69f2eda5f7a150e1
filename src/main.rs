use std::io::IsTerminal;
use std::process::ExitCode;
use std::rc::Rc;

use clap::Parser;
use facet_value::Value;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Layer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use lunchbox::boot::{self, BootContext, BootRegistry};
use lunchbox::cli::{Cli, Command, OutputFormat};
use lunchbox::config;
use lunchbox::error::Failure;
use lunchbox::logging;
use lunchbox::manifest::HttpFetcher;
use lunchbox::paths;
use lunchbox::progress::{OutputMode, TerminalSink};
use lunchbox::runner::SystemRunner;
use lunchbox::sink::{Severity, StatusSink, percent};
use lunchbox::store::JsonFileStore;

#[tokio::main(flavor = "current_thread")]
async fn main() -> miette::Result<ExitCode> {
    let cli = Cli::parse();
    let mode = resolve_output_mode(cli.output, cli.verbose, cli.quiet);

    // Terminal layer stays off while the progress bar owns the terminal;
    // stderr writes would break indicatif's redraws.
    let terminal_filter = match mode {
        OutputMode::Verbose => EnvFilter::new("debug"),
        OutputMode::Normal | OutputMode::Quiet => EnvFilter::new("off"),
        OutputMode::Plain => {
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("lunchbox=warn"))
        }
    };

    let terminal_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(terminal_filter);

    // File layer: always captures lunchbox=debug, discards until activated
    let (file_writer, file_handle) = logging::DeferredFileWriter::new();
    let file_layer = tracing_subscriber::fmt::layer()
        .with_ansi(false)
        .with_writer(file_writer)
        .with_filter(EnvFilter::new("lunchbox=debug"));

    tracing_subscriber::registry()
        .with(terminal_layer)
        .with(file_layer)
        .init();

    let registry = boot::registry();

    // Listing groups needs neither config nor data directory
    if matches!(cli.command, Command::Groups) {
        print_groups(&registry);
        return Ok(ExitCode::SUCCESS);
    }

    let app_config = config::load_config(cli.config.as_deref())?;
    let data_dir = app_config.resolve_data_dir(cli.data_dir.as_deref());

    let logs_dir = paths::logs_dir(&data_dir);
    let log_path = logging::boot_log_path(&logs_dir);
    let file_logging = match file_handle.set_file(&log_path) {
        Ok(()) => {
            logging::rotate_logs(&logs_dir, logging::KEEP_BOOT_LOGS);
            true
        }
        Err(e) => {
            tracing::warn!(path = %log_path.display(), error = %e, "file logging disabled");
            false
        }
    };

    let groups: Option<Vec<String>> = match cli.command {
        Command::Groups => unreachable!(),
        Command::Boot => None,
        Command::Run { groups } => Some(groups),
        Command::Check => Some(vec![
            boot::GROUP_BOOT.to_string(),
            boot::GROUP_PREREQUISITES.to_string(),
        ]),
    };
    let full_run = groups.is_none();
    tracing::info!(data_dir = %data_dir.display(), ?groups, "starting boot");

    let sink = Rc::new(TerminalSink::new("Booting Lunchbox", mode));
    let mut ctx = BootContext::new(
        app_config,
        &data_dir,
        sink.clone(),
        Box::new(JsonFileStore::new(paths::settings_file(&data_dir))),
        Box::new(SystemRunner),
        Box::new(HttpFetcher::new()),
    );

    let step_sink = sink.clone();
    let on_step = move |completed: usize, total: usize| step_sink.set_progress(percent(completed, total));
    let names: Option<Vec<&str>> = groups
        .as_ref()
        .map(|g| g.iter().map(String::as_str).collect());
    let result = registry.run_groups(names.as_deref(), &mut ctx, on_step).await;
    sink.finish();

    let code = match result {
        Ok(()) => {
            if full_run {
                store_boot_log(&mut ctx, sink.content()).await?;
            }
            ExitCode::SUCCESS
        }
        Err(failure) => {
            report_failure(&*sink, &failure);
            ExitCode::FAILURE
        }
    };

    if file_logging {
        if let Err(e) = logging::append_status(&log_path, &sink.content()) {
            tracing::warn!(error = %e, "could not write status to boot log");
        }
    }
    Ok(code)
}

fn print_groups(registry: &BootRegistry) {
    for group in registry.group_names() {
        println!("{group}");
        for op in registry.operation_names(group).unwrap_or_default() {
            println!("  {op}");
        }
    }
}

/// Keep the sink's content as the dashboard boot log and persist it.
async fn store_boot_log(ctx: &mut BootContext, content: String) -> miette::Result<()> {
    let Ok(settings) = ctx.settings_mut() else {
        return Ok(());
    };
    settings.set_view_state("dashboard", "boot_log", Value::from(content.as_str()));
    ctx.persist().await?;
    Ok(())
}

fn report_failure(sink: &dyn StatusSink, failure: &Failure) {
    tracing::error!(summary = %failure.summary, "boot failed");
    sink.append(&failure.render(), Severity::Error);
}

/// Map `--output` plus `--verbose`/`--quiet` to the sink's output mode.
fn resolve_output_mode(format: OutputFormat, verbose: bool, quiet: bool) -> OutputMode {
    let interactive = match format {
        OutputFormat::Auto => std::io::stdout().is_terminal(),
        OutputFormat::Interactive => true,
        OutputFormat::Plain => false,
    };
    if quiet {
        OutputMode::Quiet
    } else if verbose {
        OutputMode::Verbose
    } else if interactive {
        OutputMode::Normal
    } else {
        OutputMode::Plain
    }
}
