use anyhow::Context;
use clap::{Arg, ArgMatches, Command};
use healthmon_core::{config::CliConfig, CollectorService, Config};
use healthmon_report::{Reporter, StatusPalette, Theme};
use std::{
    io::{stdout, IsTerminal},
    path::PathBuf,
    process,
    sync::Arc,
    time::Duration,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Extra time `--once` allows beyond the probe timeout for the first cycle
const FIRST_CYCLE_SLACK: Duration = Duration::from_secs(2);

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}

fn cli() -> Command {
    Command::new("healthmon")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Health monitoring collector for local resources and remote components")
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("PATH")
                .help("Path to JSON configuration file")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new("system-interval")
                .long("system-interval")
                .value_name("MS")
                .help("System sampling interval in milliseconds")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("component-interval")
                .long("component-interval")
                .value_name("MS")
                .help("Component probing interval in milliseconds")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("probe-timeout")
                .long("probe-timeout")
                .value_name("MS")
                .help("Hard timeout for a single probe in milliseconds")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new("max-in-flight")
                .long("max-in-flight")
                .value_name("N")
                .help("Maximum concurrent probes")
                .value_parser(clap::value_parser!(usize)),
        )
        .arg(
            Arg::new("theme")
                .long("theme")
                .value_name("THEME")
                .help("Report color theme")
                .value_parser(["dark", "light"]),
        )
        .arg(
            Arg::new("no-color")
                .long("no-color")
                .help("Disable colors")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("once")
                .long("once")
                .help("Report after the first full collection cycle, then exit")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("json")
                .long("json")
                .help("Print the health summary as JSON")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .value_name("LEVEL")
                .help("Log level when RUST_LOG is unset")
                .env("HEALTHMON_LOG")
                .default_value("info")
                .value_parser(["error", "warn", "info", "debug", "trace"]),
        )
}

/// How reports are produced
#[derive(Debug, Clone, Copy)]
struct OutputMode {
    once: bool,
    json: bool,
}

fn run() -> anyhow::Result<()> {
    let matches = cli().get_matches();

    let level = matches
        .get_one::<String>("log-level")
        .map(String::as_str)
        .unwrap_or("info");
    init_logging(level)?;

    let cli_config = cli_config(&matches);
    let config = Config::load(Some(&cli_config), matches.get_one::<PathBuf>("config"))?;

    let theme = match matches.get_one::<String>("theme").map(String::as_str) {
        Some("light") => Theme::Light,
        _ => Theme::Dark,
    };
    let no_color = matches.get_flag("no-color") || !stdout().is_terminal();
    let palette = StatusPalette::new(theme, no_color);

    let mode = OutputMode {
        once: matches.get_flag("once"),
        json: matches.get_flag("json"),
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    runtime.block_on(serve(config, palette, mode))
}

fn cli_config(matches: &ArgMatches) -> CliConfig {
    CliConfig {
        system_interval_ms: matches.get_one::<u64>("system-interval").copied(),
        component_interval_ms: matches.get_one::<u64>("component-interval").copied(),
        probe_timeout_ms: matches.get_one::<u64>("probe-timeout").copied(),
        max_in_flight: matches.get_one::<usize>("max-in-flight").copied(),
    }
}

/// `RUST_LOG` wins; otherwise `level` applies to the healthmon crates.
fn init_logging(level: &str) -> anyhow::Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::new("warn")
            .add_directive(format!("healthmon={}", level).parse()?)
            .add_directive(format!("healthmon_core={}", level).parse()?)
            .add_directive(format!("healthmon_report={}", level).parse()?),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

async fn serve(config: Config, palette: StatusPalette, mode: OutputMode) -> anyhow::Result<()> {
    let report_interval = config.report_interval();
    let first_cycle_limit = config.probe_timeout().max(config.system_interval()) + FIRST_CYCLE_SLACK;
    let components = config.components.clone();

    let service = Arc::new(CollectorService::new(config));
    for component in components {
        let id = component.component_id.clone();
        service
            .register(component)
            .with_context(|| format!("Failed to register component {}", id))?;
    }

    service.start().await?;
    info!(components = service.list_component_health().len(), "healthmon started");

    let result = if mode.once {
        report_once(&service, &palette, mode, first_cycle_limit).await
    } else {
        report_until_interrupted(&service, &palette, mode, report_interval).await
    };

    service.stop().await?;
    result
}

async fn report_once(
    service: &CollectorService,
    palette: &StatusPalette,
    mode: OutputMode,
    limit: Duration,
) -> anyhow::Result<()> {
    let first_cycle = async {
        loop {
            let sampled = !service.recent_metrics(1).is_empty();
            let probed = service
                .list_component_health()
                .iter()
                .all(|health| health.last_check.is_some());
            if sampled && probed {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    };

    if tokio::time::timeout(limit, first_cycle).await.is_err() {
        warn!(limit_ms = limit.as_millis() as u64, "First collection cycle incomplete; reporting partial results");
    }

    emit(service, palette, mode, false)
}

async fn report_until_interrupted(
    service: &CollectorService,
    palette: &StatusPalette,
    mode: OutputMode,
    every: Duration,
) -> anyhow::Result<()> {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let redraw = !mode.json && stdout().is_terminal();

    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal.context("Failed to listen for Ctrl-C")?;
                info!("Interrupted; shutting down");
                return Ok(());
            }
            _ = ticker.tick() => emit(service, palette, mode, redraw)?,
        }
    }
}

fn emit(service: &CollectorService, palette: &StatusPalette, mode: OutputMode, redraw: bool) -> anyhow::Result<()> {
    let summary = service.health_summary();

    if mode.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    let reporter = Reporter::new(palette.clone()).with_redraw(redraw);
    reporter.draw(&mut stdout().lock(), &summary)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_overrides_parse() {
        let matches = cli()
            .try_get_matches_from([
                "healthmon",
                "--system-interval",
                "1000",
                "--max-in-flight",
                "4",
                "--once",
                "--json",
            ])
            .unwrap();

        let overrides = cli_config(&matches);
        assert_eq!(overrides.system_interval_ms, Some(1000));
        assert_eq!(overrides.max_in_flight, Some(4));
        assert_eq!(overrides.probe_timeout_ms, None);
        assert!(matches.get_flag("once"));
        assert!(matches.get_flag("json"));
    }

    #[test]
    fn test_rejects_unknown_theme() {
        assert!(cli()
            .try_get_matches_from(["healthmon", "--theme", "neon"])
            .is_err());
    }

    #[test]
    fn test_cli_definition_is_consistent() {
        cli().debug_assert();
    }
}
