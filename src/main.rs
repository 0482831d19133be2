use clap::Parser;
use env_logger::Env;
use simscan::{
    cli::{Cli, Commands},
    config::Config,
    display::DisplayManager,
    generator,
    reporting::ReportGenerator,
    runner::{ScanRunner, SessionEvent},
    Result,
};
use std::path::Path;
use std::process;
use std::time::Instant;
use tokio::sync::{mpsc, watch};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = if cli.quiet {
        "error"
    } else {
        match cli.verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    };

    env_logger::Builder::from_env(Env::default().default_filter_or(log_level))
        .format_timestamp_secs()
        .init();

    let display = DisplayManager::with_quiet(cli.quiet);

    if !cli.quiet {
        display.print_banner(
            "🛰  SIMSCAN - Simulated Web Security Scanner",
            Some("Fabricated findings only")
        );
        display.print_warning("No traffic is sent to the target. Results are generated, not measured.");
        println!();
    }

    let mut config = if let Some(config_path) = &cli.config {
        match Config::load_from_file(&config_path.to_string_lossy()) {
            Ok(config) => {
                if !cli.quiet {
                    display.print_success(&format!("Loaded configuration from {}", config_path.display()));
                }
                config
            },
            Err(e) => {
                display.print_warning(&format!("Failed to load configuration: {}, using defaults", e));
                Config::default()
            }
        }
    } else {
        Config::default()
    };

    // Apply CLI overrides to config
    cli.apply_overrides(&mut config);

    let start_time = Instant::now();

    let result = if let Some(target) = &cli.target {
        execute_scan(&config, &display, target, cli.report).await
    } else if let Some(command) = &cli.command {
        match command {
            Commands::Scan { target } => execute_scan(&config, &display, target, cli.report).await,
            Commands::Analyze { file } => execute_analysis(&config, &display, file).await,
            Commands::InitConfig { path } => execute_init_config(&config, &display, path),
        }
    } else {
        display.print_error("No target specified. Use 'simscan --help' for usage information.");
        process::exit(1);
    };

    match result {
        Ok(_) => {
            if !cli.quiet {
                display.print_success(&format!("Done in {}", simscan::utils::time::format_duration(start_time.elapsed())));
            }
        }
        Err(e) => {
            display.print_error(&format!("Simulation failed: {}", e));
            process::exit(1);
        }
    }
}

async fn execute_scan(
    config: &Config,
    display: &DisplayManager,
    target: &str,
    write_report: bool,
) -> Result<()> {
    display.print_section_header("🌐 SIMULATED WEB APPLICATION SCAN");

    let runner = ScanRunner::new(config.clone(), generator::from_config(config)?)?;
    display.print_info(&format!(
        "Generator: {} · {} ticks every {} ms",
        runner.generator_name(),
        config.session.ticks,
        config.session.tick_interval_ms
    ));

    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = cancel_tx.send(true);
        }
    });

    let (event_tx, mut event_rx) = mpsc::unbounded_channel::<SessionEvent>();
    let snapshot = {
        let run = runner.run(target, Some(&event_tx), cancel_rx);
        tokio::pin!(run);
        loop {
            tokio::select! {
                result = &mut run => break result?,
                Some(event) = event_rx.recv() => display.print_event(&event),
            }
        }
    };
    // flush whatever the last tick emitted
    while let Ok(event) = event_rx.try_recv() {
        display.print_event(&event);
    }

    println!();
    display.print_crawl_tree(&snapshot.crawl_nodes);
    display.print_scan_summary(&snapshot);

    if write_report {
        let files = ReportGenerator::new(config.clone()).generate_report(&snapshot).await?;
        for file in files {
            display.print_success(&format!("Report written to {}", file.display()));
        }
    }

    Ok(())
}

async fn execute_analysis(config: &Config, display: &DisplayManager, file: &Path) -> Result<()> {
    display.print_section_header("🧪 SIMULATED STATIC ANALYSIS");

    let runner = ScanRunner::new(config.clone(), generator::from_config(config)?)?;
    let spinner = simscan::utils::progress::create_spinner(&format!("Reviewing {}", file.display()));
    let report = runner.analyze(file).await;
    spinner.finish_and_clear();

    display.print_analysis_report(&report?);
    Ok(())
}

fn execute_init_config(config: &Config, display: &DisplayManager, path: &Path) -> Result<()> {
    config.save_to_file(&path.to_string_lossy())?;
    display.print_success(&format!("Configuration written to {}", path.display()));
    Ok(())
}
