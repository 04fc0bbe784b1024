//! GateCode CLI
//!
//! Serves the explain-before-you-code session API, highlights source files in
//! the terminal and scores one-off explanations.

use std::io::Read;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use crossterm::style::Stylize;
use gatecode_core::{
    create_router, highlight, language, AppState, Config, Explanation, GateError, HighlightedLine,
    HttpOracle, Problem, TokenClass, VerificationClient, VerificationResult,
};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

/// Default port for the HTTP API server.
const DEFAULT_PORT: u16 = 3000;

/// Exit code for an explanation the oracle did not approve.
const EXIT_REJECTED: u8 = 2;

/// GateCode - explain your solution before you write it
///
/// The editor stays locked until a scoring oracle approves a plain-language
/// explanation of the approach.
#[derive(Parser, Debug)]
#[command(name = "gatecode")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (default: gatecode.json in current directory)
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<String>,

    /// Enable verbose output (sets log level to debug)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve the session API and event stream
    Serve {
        /// Problem file, overriding the config
        #[arg(long, value_name = "FILE")]
        problem: Option<String>,

        /// Port for the HTTP API server
        #[arg(short, long, default_value_t = DEFAULT_PORT)]
        port: u16,
    },

    /// Print a source file with syntax highlighting
    Highlight {
        /// File to highlight
        #[arg(value_name = "FILE")]
        file: PathBuf,

        /// Language id (default: inferred from the file extension)
        #[arg(short, long)]
        language: Option<String>,

        /// Print spans as JSON instead of coloured text
        #[arg(long)]
        json: bool,
    },

    /// Score an explanation once and exit
    Verify {
        /// Problem file, overriding the config
        #[arg(long, value_name = "FILE")]
        problem: Option<String>,

        /// File holding the explanation, or `-` for stdin
        #[arg(value_name = "EXPLANATION")]
        explanation: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if cli.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Command::Serve { problem, port } => {
            serve(cli.config.as_deref(), problem, port).await.map(|()| ExitCode::SUCCESS)
        }
        Command::Highlight {
            file,
            language,
            json,
        } => highlight_file(&file, language.as_deref(), json).map(|()| ExitCode::SUCCESS),
        Command::Verify {
            problem,
            explanation,
        } => verify(cli.config.as_deref(), problem, &explanation).await,
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::from(1)
        }
    }
}

// ============================================================================
// Serve
// ============================================================================

async fn serve(config_path: Option<&str>, problem: Option<String>, port: u16) -> anyhow::Result<()> {
    let config = load_config(config_path, problem)?;
    print_config(&config);

    tracing::info!(problem = %config.problem, "Loading problem");
    let problem = Problem::load(&config.problem)?;
    println!("Problem: {}", problem.title);

    let oracle = Arc::new(HttpOracle::from_config(&config.oracle)?);
    tracing::debug!(?oracle, "Oracle configured");

    let state = AppState::build(config, problem, oracle)?;
    let router = create_router(state);

    let addr: SocketAddr = ([127, 0, 0, 1], port).into();
    let listener = TcpListener::bind(addr).await.map_err(|e| {
        anyhow::anyhow!(
            "Failed to bind to {addr}: {e}\n\nSuggestion: Try a different port with --port"
        )
    })?;

    println!("GateCode API running on http://{addr}");
    println!("Press Ctrl+C to stop");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    println!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown requested");
}

// ============================================================================
// Highlight
// ============================================================================

fn highlight_file(path: &Path, language_id: Option<&str>, json: bool) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("Failed to read '{}': {e}", path.display()))?;

    let profile = match language_id {
        Some(id) => language::profile(id).ok_or_else(|| GateError::unknown_language(id))?,
        None => path
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(language::from_extension)
            .unwrap_or(&language::PLAINTEXT),
    };
    tracing::debug!(language = profile.id, file = %path.display(), "Highlighting");

    let lines = highlight::highlight_lines(&text, profile.id);
    if json {
        println!("{}", serde_json::to_string_pretty(&lines)?);
    } else {
        for line in &lines {
            println!("{}", render_line(line));
        }
    }
    Ok(())
}

fn render_line(line: &HighlightedLine) -> String {
    line.tokens()
        .map(|(class, text)| match class {
            TokenClass::Keyword => text.magenta().bold().to_string(),
            TokenClass::String => text.green().to_string(),
            TokenClass::Number => text.cyan().to_string(),
            TokenClass::Comment => text.dark_grey().italic().to_string(),
            TokenClass::Plain => text.to_string(),
        })
        .collect()
}

// ============================================================================
// Verify
// ============================================================================

async fn verify(
    config_path: Option<&str>,
    problem: Option<String>,
    explanation_source: &str,
) -> anyhow::Result<ExitCode> {
    let config = load_config(config_path, problem)?;
    let problem = Problem::load(&config.problem)?;
    let explanation = read_explanation(explanation_source)?;

    let length = Explanation::new(explanation.as_str()).len();
    if length < config.min_explanation_length {
        return Err(GateError::ExplanationTooShort {
            length,
            minimum: config.min_explanation_length,
        }
        .into());
    }

    let client = VerificationClient::new(Arc::new(HttpOracle::from_config(&config.oracle)?));
    println!("Verifying explanation for: {}", problem.title);
    let result = client.verify(&explanation, &problem).await?;
    print_result(&result);

    Ok(if result.approved {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_REJECTED)
    })
}

fn read_explanation(source: &str) -> anyhow::Result<String> {
    if source == "-" {
        let mut text = String::new();
        std::io::stdin().read_to_string(&mut text)?;
        return Ok(text);
    }
    std::fs::read_to_string(source)
        .map_err(|e| anyhow::anyhow!("Failed to read explanation '{source}': {e}"))
}

fn print_result(result: &VerificationResult) {
    let verdict = if result.approved {
        "APPROVED".green().bold()
    } else {
        "REJECTED".red().bold()
    };
    println!();
    println!("{verdict}  score {}/100 ({})", result.score, result.band().label);
    println!();
    println!("Feedback:  {}", result.feedback);
    println!("Reasoning: {}", result.reasoning);
    if !result.missing_concepts.is_empty() {
        println!("Missing concepts:");
        for concept in &result.missing_concepts {
            println!("  - {concept}");
        }
    }
}

// ============================================================================
// Config
// ============================================================================

/// Loads configuration, applying the `--problem` override.
fn load_config(config_path: Option<&str>, problem: Option<String>) -> anyhow::Result<Config> {
    let mut config = match config_path {
        Some(path_str) => {
            let path = Path::new(path_str);
            if !path.exists() {
                anyhow::bail!(
                    "Config file not found: '{}'\n\nSuggestion: Check the path or remove the --config flag to use defaults",
                    path.display()
                );
            }
            Config::load_from_file(path)?
        }
        None => Config::load()?,
    };

    if let Some(problem) = problem {
        config.problem = problem;
        config.validate()?;
    }
    Ok(config)
}

fn print_config(config: &Config) {
    println!("Configuration loaded:");
    println!("  Problem: {}", config.problem);
    println!("  Default language: {}", config.default_language);
    println!("  Minimum explanation length: {}", config.min_explanation_length);
    println!("  Oracle provider: {:?}", config.oracle.provider);
    println!("  Oracle model: {}", config.oracle.model);
    println!("  Timeout: {}s", config.oracle.timeout_seconds);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_serve_defaults() {
        let cli = Cli::try_parse_from(["gatecode", "serve"]).unwrap();
        assert!(!cli.verbose);
        match cli.command {
            Command::Serve { problem, port } => {
                assert!(problem.is_none());
                assert_eq!(port, DEFAULT_PORT);
            }
            other => unreachable!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_parse_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "gatecode",
            "verify",
            "--problem",
            "p.json",
            "-",
            "-v",
            "--config",
            "c.json",
        ])
        .unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.config.as_deref(), Some("c.json"));
        match cli.command {
            Command::Verify {
                problem,
                explanation,
            } => {
                assert_eq!(problem.as_deref(), Some("p.json"));
                assert_eq!(explanation, "-");
            }
            other => unreachable!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_render_line_keeps_text() {
        let lines = highlight::highlight_lines("return 1 # done", "python");
        let rendered = render_line(&lines[0]);
        assert!(rendered.contains("return"));
        assert!(rendered.contains("# done"));
    }

    #[test]
    fn test_load_config_missing_explicit_file() {
        let err = load_config(Some("/nonexistent/gatecode.json"), None).unwrap_err();
        assert!(err.to_string().contains("Config file not found"));
    }
}
