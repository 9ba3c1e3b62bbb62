use clap::Parser;
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "lotpilot-runner")]
#[command(about = "Perform verified portal interactions from a YAML task file")]
#[command(version)]
struct Cli {
    /// Task file to run
    config: PathBuf,

    /// Run in headless mode (overrides config)
    #[arg(long)]
    headless: bool,

    /// Set a parameter (can be used multiple times)
    #[arg(short = 'P', long = "param", value_name = "KEY=VALUE")]
    params: Vec<String>,

    /// Verbose output (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Validate the task file without running
    #[arg(long)]
    check: bool,

    /// Quiet mode (only errors)
    #[arg(short, long)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> lotpilot_runner::Result<()> {
    let cli = Cli::parse();

    let level = if cli.quiet {
        Level::ERROR
    } else {
        match cli.verbose {
            0 => Level::WARN,
            1 => Level::INFO,
            _ => Level::DEBUG,
        }
    };

    FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .compact()
        .init();

    let params = lotpilot_runner::Params::from_args(&cli.params)?;
    let mut config = lotpilot_runner::Config::load_with_params(&cli.config, &params)?;

    if cli.check {
        println!("Config valid: {}", config.name);
        println!("  Start: {}", config.target.url);
        println!("  Deadline: {}ms per task", config.deadline_ms);
        println!("  Tasks: {}", config.tasks.len());
        for task in &config.tasks {
            let cont = if task.continue_on_failure {
                " (continue on failure)"
            } else {
                ""
            };
            println!("    - {}: {}{}", task.name, task.target, cont);
        }
        if !config.params.is_empty() {
            println!("  Parameters: {}", config.params.len());
            for (name, def) in &config.params {
                let req = if def.required { " (required)" } else { "" };
                let desc = def.description.as_deref().unwrap_or("");
                println!("    - {}{}: {}", name, req, desc);
            }
        }
        if !config.classifier.rules.is_empty() {
            println!("  Extra classifier rules: {}", config.classifier.rules.len());
        }
        return Ok(());
    }

    if cli.headless {
        config.browser.headless = true;
    }

    println!("Running: {}", config.name);

    let runner = lotpilot_runner::Runner::new(&config.browser).await?;
    let result = runner.run(&config).await?;

    println!();
    for report in &result.tasks {
        let outcome = &report.outcome;
        if outcome.success {
            let strategy = outcome.strategy_used.map(|s| s.name()).unwrap_or("-");
            println!(
                "✓ {} via {} ({} attempt(s), {}ms)",
                report.name,
                strategy,
                outcome.attempts.len(),
                outcome.elapsed.as_millis()
            );
        } else {
            let category = outcome.category.map(|c| c.name()).unwrap_or("unknown");
            println!("✗ {} [{}]", report.name, category);
            if let Some(ref detail) = outcome.detail {
                println!("  Error: {}", detail);
            }
        }
    }
    let skipped = config.tasks.len() - result.tasks.len();
    if skipped > 0 {
        println!("  Skipped: {}", skipped);
    }
    println!("  Duration: {}ms", result.duration_ms);

    runner.close().await?;

    if !result.success {
        std::process::exit(1);
    }

    Ok(())
}
