//! `shareguard` - CLI for shareguard
//!
//! This binary exposes the redaction core on the command line: classify
//! text, inspect per-site selectors, and run a capture-active scan over an
//! HTML snapshot.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use anyhow::Context;
use clap::Parser;
use tokio::sync::mpsc;

use shareguard::cli::output::{self, ScanOutput};
use shareguard::cli::{
    CheckCommand, Cli, Command, ConfigCommand, OutputFormat, ScanCommand, SelectorsCommand,
};
use shareguard::dom::HtmlDocument;
use shareguard::engine::{RedactionEngine, ScanReport};
use shareguard::selectors::{self, SurfaceSelectors};
use shareguard::{init_logging, CategoryMatcher, Config, Error, EventSink};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbosity());

    let config = Config::load_from(cli.config.clone())?;

    match cli.command {
        Command::Scan(scan_cmd) => handle_scan(&config, &scan_cmd),
        Command::Check(check_cmd) => handle_check(&config, &check_cmd),
        Command::Selectors(selectors_cmd) => handle_selectors(&selectors_cmd),
        Command::Config(config_cmd) => handle_config(&config, config_cmd),
    }
}

fn handle_scan(config: &Config, cmd: &ScanCommand) -> anyhow::Result<()> {
    let mut settings = config.settings()?;
    for category in &cmd.disabled {
        settings = settings.with_category((*category).into(), false);
    }

    let read = HtmlDocument::from_file(cmd.host.as_str(), &cmd.file);
    let mut doc = read.map_err(|source| Error::DocumentRead {
        path: cmd.file.clone(),
        source,
    })?;

    // A one-shot scan never observes mutations.
    let (mutations, _unobserved) = mpsc::unbounded_channel();
    let mut engine = RedactionEngine::new(
        &cmd.host,
        settings,
        config.engine_config(),
        mutations,
        EventSink::disconnected(),
    );
    let report = engine
        .on_capture_state_changed(&mut doc, true)
        .unwrap_or_default();

    let scan = ScanOutput {
        host: &cmd.host,
        report,
        masked: output::masked_elements(&doc, &engine)?,
    };
    match cmd.format {
        OutputFormat::Json => println!("{}", output::to_json(&scan)?),
        OutputFormat::Plain => {
            for item in &scan.masked {
                println!(
                    "{}\t<{}>\t{}\t{}",
                    item.element, item.tag, item.category, item.text
                );
            }
            print_summary(&scan.report);
        }
        OutputFormat::Table => {
            println!("{:<8} {:<10} {:<20} TEXT", "ELEMENT", "TAG", "CATEGORY");
            println!("{}", "-".repeat(72));
            for item in &scan.masked {
                println!(
                    "{:<8} {:<10} {:<20} {}",
                    item.element.to_string(),
                    item.tag,
                    item.category.to_string(),
                    item.text
                );
            }
            println!();
            print_summary(&scan.report);
        }
    }
    Ok(())
}

fn print_summary(report: &ScanReport) {
    println!(
        "{} masked, {} hidden candidates skipped, {} errors",
        report.total, report.hidden, report.errors
    );
}

fn handle_check(config: &Config, cmd: &CheckCommand) -> anyhow::Result<()> {
    let settings = config.settings()?;
    let matcher = CategoryMatcher::with_min_len(&settings, config.engine.min_text_len);
    let category = matcher.classify(&cmd.text);

    if cmd.json {
        let result = serde_json::json!({
            "text": cmd.text,
            "sensitive": category.is_some(),
            "category": category,
        });
        println!("{}", output::to_json(&result)?);
    } else {
        match category {
            Some(category) => println!("sensitive: {category}"),
            None => println!("not sensitive"),
        }
    }
    Ok(())
}

fn handle_selectors(cmd: &SelectorsCommand) -> anyhow::Result<()> {
    let surfaces: Vec<SurfaceSelectors> = match &cmd.host {
        Some(host) => {
            let found = selectors::for_host(host);
            if found.is_empty() {
                println!("No structural selectors for {host}; text matching only.");
                return Ok(());
            }
            vec![found]
        }
        None => selectors::surfaces().to_vec(),
    };

    if cmd.json {
        println!("{}", output::to_json(&surfaces)?);
        return Ok(());
    }
    for surface in &surfaces {
        println!("[{}]", surface.host);
        for (category, list) in surface.lists() {
            if list.is_empty() {
                continue;
            }
            println!("  {category}:");
            for selector in list {
                println!("    {selector}");
            }
        }
        println!();
    }
    Ok(())
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                println!("{}", output::to_json(config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Detector]");
                let detector = &config.detector;
                println!("  Probe interval (ms): {}", detector.probe_interval_ms);
                println!("  Debounce (ms):       {}", detector.debounce_ms);
                println!("  Cooldown (ms):       {}", detector.cooldown_ms);
                println!("  Hook enabled:        {}", detector.hook_enabled);
                println!();
                println!("[Engine]");
                println!("  Scan debounce (ms):  {}", config.engine.scan_debounce_ms);
                println!("  Min text length:     {}", config.engine.min_text_len);
                println!();
                println!("[Redaction]");
                let redaction = &config.redaction;
                println!("  Protection:          {}", redaction.protection_enabled);
                println!("  Intensity:           {}", redaction.intensity);
                println!("  Auto enable:         {}", redaction.auto_enable);
                for (category, enabled) in redaction.categories.entries() {
                    println!("  {:<20} {enabled}", format!("{category}:"));
                }
                let custom = redaction.custom_patterns.len();
                println!("  Custom patterns:     {custom}");
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            let loaded = Config::load_from(Some(path.clone()))
                .with_context(|| format!("invalid configuration in {}", path.display()))?;
            let settings = loaded.settings()?;
            println!(
                "Configuration is valid ({} categories, {} custom patterns).",
                settings.enabled_categories.len(),
                settings.custom_patterns.len()
            );
        }
    }
    Ok(())
}
