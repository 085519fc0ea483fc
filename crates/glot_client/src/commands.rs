//! Subcommand handlers wiring configuration and adapters into `glot_core`.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use glot_core::error::Result;
use glot_core::table::TableStyle;
use glot_core::{
    DiagnosticUnpacker, FileBundler, GlotError, LaunchRequest, LifecycleOrchestrator,
    ResultsRetriever, SearchQuery, SimulationDescriptor, SimulationOutcome, SimulationService,
};
use indicatif::{ProgressBar, ProgressStyle};

use crate::adapters::git::GitCommandCloner;
use crate::adapters::http_bridge::HttpBridgeTransport;
use crate::adapters::receiver::OneShotHttpReceiver;
use crate::cli::{Cli, Commands, DiagnosticArgs, InspectArgs, LaunchArgs, ResultsArgs, SearchArgs};
use crate::config::ClientConfig;

const RECEIVER_HOST: &str = "0.0.0.0";

pub fn run(cli: Cli) -> Result<()> {
    let config = ClientConfig::from_args(&cli.global);
    match cli.command {
        Commands::Launch(args) => launch(&config, args),
        Commands::Cancel { guid } => cancel(&config, &guid),
        Commands::Status { guid } => status(&config, &guid),
        Commands::Search(args) => search(&config, args),
        Commands::Results(args) => results(&config, args),
        Commands::Diagnostic(args) => diagnostic(&config, args),
        Commands::Inspect(args) => inspect(&config, args),
    }
}

fn connect(config: &ClientConfig) -> Result<SimulationService> {
    let transport = HttpBridgeTransport::connect(&config.router_url(), config.poll_interval)?;
    Ok(SimulationService::new(Arc::new(transport), config.namespace()))
}

fn orchestrator(config: &ClientConfig, output_files: Vec<String>) -> Result<LifecycleOrchestrator> {
    Ok(LifecycleOrchestrator::new(connect(config)?, FileBundler::new(&config.transfer_dir))
        .with_output_files(output_files)
        .with_wait_timeout(config.wait_timeout))
}

fn unpacker(config: &ClientConfig) -> Result<DiagnosticUnpacker> {
    Ok(
        DiagnosticUnpacker::new(config.scaffold_table()?, Box::new(GitCommandCloner::default()))
            .force(config.force)
            .verbose(config.verbose),
    )
}

fn retriever(config: &ClientConfig) -> Result<ResultsRetriever> {
    let receiver = OneShotHttpReceiver::new(RECEIVER_HOST, config.receiver_port, ".");
    Ok(ResultsRetriever::new(
        connect(config)?,
        Box::new(receiver),
        unpacker(config)?,
        config.retrieval_options(),
    ))
}

fn launch(config: &ClientConfig, args: LaunchArgs) -> Result<()> {
    let orchestrator = orchestrator(config, args.output_files)?;
    let request = LaunchRequest {
        descriptor: SimulationDescriptor::from_path(&args.descriptor)?,
        subdirectory: args.subdirectory,
        input_files: args.inputs,
        definition_files: args.definitions,
        skip_clean: args.skip_clean,
    };

    let running = orchestrator.launch(request)?;
    let guid = running.guid().to_string();
    println!("{guid}");
    if args.no_wait {
        tracing::info!(guid = %guid, "not waiting for completion");
        return Ok(());
    }

    let spinner = wait_spinner(&guid);
    let outcome = running.wait();
    spinner.finish_and_clear();

    match outcome? {
        SimulationOutcome::Completed { files, .. } => {
            if let Some(files) = files {
                tracing::info!(guid = %guid, %files, "output files");
            }
            Ok(())
        }
        SimulationOutcome::Failed { guid, message, .. } => Err(GlotError::RunFailed { guid, message }),
    }
}

fn wait_spinner(guid: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(format!("waiting for [{guid}]"));
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner
}

fn cancel(config: &ClientConfig, guid: &str) -> Result<()> {
    let orchestrator = orchestrator(config, Vec::new())?;
    let cancelled = orchestrator.cancel(guid)?;
    if let Err(error) = orchestrator.service().disconnect() {
        tracing::debug!(%error, "disconnect failed");
    }
    if cancelled {
        Ok(())
    } else {
        Err(GlotError::CancelRefused {
            guid: guid.to_string(),
        })
    }
}

fn status(config: &ClientConfig, guid: &str) -> Result<()> {
    let table = retriever(config)?.status(guid)?;
    print!("{}", table.render(TableStyle::Simple));
    Ok(())
}

fn search(config: &ClientConfig, args: SearchArgs) -> Result<()> {
    let query = SearchQuery {
        guid: args.guid,
        limit: args.limit,
        server_limit: args.server_limit,
        sort: args.sort.map(Into::into),
    };
    let table = retriever(config)?.search(&query)?;
    let style = if args.fancy {
        TableStyle::FancyGrid
    } else {
        TableStyle::Simple
    };
    print!("{}", table.render(style));
    Ok(())
}

fn results(config: &ClientConfig, args: ResultsArgs) -> Result<()> {
    let received = retriever(config)?.results(
        &args.guid,
        args.target.as_deref(),
        args.include_diagnostic,
        args.inspect_diagnostic,
    )?;
    print_path(received);
    Ok(())
}

fn diagnostic(config: &ClientConfig, args: DiagnosticArgs) -> Result<()> {
    let archive = retriever(config)?.diagnostic(&args.guid, args.target.as_deref(), args.inspect)?;
    print_path(archive);
    Ok(())
}

fn inspect(config: &ClientConfig, args: InspectArgs) -> Result<()> {
    let root = unpacker(config)?.inspect(&args.archive, args.to.as_deref(), &args.mode)?;
    println!("{}", root.display());
    Ok(())
}

fn print_path(path: Option<PathBuf>) {
    if let Some(path) = path {
        println!("{}", path.display());
    }
}
