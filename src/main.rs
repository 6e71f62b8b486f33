use anyhow::{Context, Result};

use chat_loadtest::bench::{BenchmarkRunner, MockChatServer, MockServerConfig};
use chat_loadtest::config::Config;
use chat_loadtest::samples;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (for log level)
    let mut config = Config::load()?;
    config.validate()?;

    init_logging(&config);

    tracing::info!("Chat completion load test starting...");

    // Standalone runs target an in-process mock endpoint
    let mut mock_server = None;
    if config.standalone {
        let mut server = MockChatServer::new(MockServerConfig::default());
        server
            .start()
            .await
            .context("Failed to start mock chat-completion server")?;
        config.bench.endpoint = server.url();
        mock_server = Some(server);
    }

    let samples = match &config.samples_path {
        Some(path) => samples::load_samples(path, config.num_samples)
            .with_context(|| format!("Failed to load samples from {}", path.display()))?,
        None => samples::synthetic_samples(config.num_samples),
    };
    if samples.is_empty() {
        anyhow::bail!("No samples to replay");
    }

    if !config.json_output {
        print_startup_banner(&config, samples.len());
    }

    tracing::info!(
        endpoint = %config.bench.endpoint,
        model = %config.bench.model,
        samples = samples.len(),
        levels = ?config.bench.concurrency_levels,
        mode = %config.bench.mode,
        "Benchmark configured"
    );

    let runner = BenchmarkRunner::new(config.bench.clone(), samples)?;
    let report = runner.run().await;

    if config.json_output {
        println!("{}", report.to_json());
    } else {
        report.print_table();
        report.print_summary();
    }

    if let Some(mut server) = mock_server {
        server.stop();
    }

    tracing::info!("Load test complete");
    Ok(())
}

/// Initialize logging. RUST_LOG overrides the configured level.
fn init_logging(config: &Config) {
    let log_level = config.log_level.to_lowercase();
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level));

    // Logs go to stderr so a JSON report on stdout stays parseable
    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true);

    if config.log_json {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Print startup banner
fn print_startup_banner(config: &Config, sample_count: usize) {
    let banner = r#"
╔═══════════════════════════════════════════════════════════╗
║                                                           ║
║              Chat Completion Load Tester                  ║
║                                                           ║
║  Latency and throughput for OpenAI-compatible endpoints   ║
║                                                           ║
╚═══════════════════════════════════════════════════════════╝
"#;

    println!("{}", banner);
    println!("  Version:     {}", env!("CARGO_PKG_VERSION"));
    println!("  Endpoint:    {}", config.bench.endpoint);
    println!("  Model:       {}", config.bench.model);
    println!("  Samples:     {}", sample_count);
    println!("  Concurrency: {:?}", config.bench.concurrency_levels);
    println!("  Mode:        {}", config.bench.mode);
    println!(
        "  Timeout:     {}",
        if config.bench.request_timeout_secs == 0 {
            "none".to_string()
        } else {
            format!("{}s", config.bench.request_timeout_secs)
        }
    );
    println!(
        "  Standalone:  {}",
        if config.standalone { "yes" } else { "no" }
    );
    println!();
}
