mod logging;
mod scenario;
mod simulator;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Arg, ArgAction, Command};
use log::LevelFilter;
use opener_engine::{FileSettingsStore, MemorySettingsStore, OpenerSettings, SettingsStore};
use opener_logging::opener_info;

use logging::LogDestination;
use scenario::Scenario;
use simulator::Simulator;

fn command() -> Command {
    Command::new("pdf_opener_app")
        .about("Replays browser events against the PDF opener with an in-memory host")
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("FILE")
                .help("RON file overriding the default settings")
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("scenario")
                .long("scenario")
                .value_name("FILE")
                .help("RON scenario to replay; a built-in demo runs otherwise")
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("settings-file")
                .long("settings-file")
                .value_name("FILE")
                .help("Persist the enabled flag to this JSON file instead of memory")
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("log")
                .long("log")
                .value_name("DEST")
                .help("Log destination")
                .value_parser(["file", "terminal", "both"])
                .default_value("file")
                .action(ArgAction::Set),
        )
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .help("Log at debug level")
                .action(ArgAction::SetTrue),
        )
}

pub fn run() -> anyhow::Result<()> {
    let matches = command().get_matches();

    let destination = matches
        .get_one::<String>("log")
        .and_then(|name| LogDestination::parse(name))
        .unwrap_or(LogDestination::File);
    let level = if matches.get_flag("verbose") {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    logging::initialize(destination, level);

    let settings = match matches.get_one::<String>("config") {
        Some(path) => OpenerSettings::load(&PathBuf::from(path))
            .with_context(|| format!("loading config {path}"))?,
        None => OpenerSettings::default(),
    };
    let scenario = match matches.get_one::<String>("scenario") {
        Some(path) => Scenario::load(&PathBuf::from(path))?,
        None => Scenario::demo()?,
    };
    let store: Arc<dyn SettingsStore> = match matches.get_one::<String>("settings-file") {
        Some(path) => Arc::new(
            FileSettingsStore::open(path).with_context(|| format!("opening settings {path}"))?,
        ),
        None => Arc::new(MemorySettingsStore::new()),
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_time()
        .build()
        .context("building runtime")?;
    opener_info!(
        "Replaying {} step(s) for {}",
        scenario.steps.len(),
        settings.target_host
    );
    let report = runtime.block_on(async move {
        let simulator = Simulator::start(settings, store).await;
        simulator.run(&scenario).await
    });

    for line in &report.transcript {
        println!("{line}");
    }
    println!("--- host actions ---");
    for action in &report.actions {
        println!("{action:?}");
    }
    Ok(())
}
