use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use layercache::{CacheBackend, CacheConfig, CacheManager, CacheTier, Expiration, LoggingConfig};
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use serde_json::Value;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "layercache-cli")]
#[command(about = "layercache CLI - inspect and drive a tiered cache", long_about = None)]
struct Args {
    /// YAML configuration file (defaults to an in-process cache)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Command to execute (if not in interactive mode)
    #[arg(trailing_var_arg = true)]
    command: Vec<String>,
}

struct CacheShell {
    cache: CacheManager,
}

impl CacheShell {
    fn new(cache: CacheManager) -> Self {
        Self { cache }
    }

    async fn execute_command(&self, command: &str, args: &[String]) -> Result<String> {
        let start = Instant::now();

        let response = match command.to_uppercase().as_str() {
            "SET" => self.cmd_set(args).await?,
            "GET" => self.cmd_get(args).await?,
            "DEL" | "DELETE" => self.cmd_del(args).await?,
            "INFO" | "STATS" => self.cmd_stats(),
            "PING" => self.cmd_ping().await?,
            "HELP" => help_text(),
            _ => return Err(anyhow::anyhow!("Unknown command: {}", command)),
        };

        let elapsed = start.elapsed();
        Ok(format!(
            "{}\n{}",
            response,
            format!("({:.2?})", elapsed).dimmed()
        ))
    }

    async fn cmd_set(&self, args: &[String]) -> Result<String> {
        if args.len() < 2 {
            return Err(anyhow::anyhow!(
                "Usage: SET key value [absolute_secs] [sliding_secs]"
            ));
        }

        let value = parse_value(&args[1]);
        let expiration = parse_expiration(args.get(2), args.get(3))?;

        self.cache.set(&args[0], &value, expiration).await?;
        Ok("OK".green().to_string())
    }

    async fn cmd_get(&self, args: &[String]) -> Result<String> {
        if args.is_empty() {
            return Err(anyhow::anyhow!("Usage: GET key"));
        }

        match self.cache.get::<Value>(&args[0]).await? {
            Some(value) => Ok(value.to_string()),
            None => Ok("(nil)".dimmed().to_string()),
        }
    }

    async fn cmd_del(&self, args: &[String]) -> Result<String> {
        if args.is_empty() {
            return Err(anyhow::anyhow!("Usage: DEL key [key ...]"));
        }

        for key in args {
            self.cache.remove(key).await?;
        }
        Ok("OK".green().to_string())
    }

    fn cmd_stats(&self) -> String {
        let backend = self.cache.provider();
        let mut lines = vec![format!("provider: {}", backend.name())];

        if let CacheBackend::MultiLayer(tiers) = backend {
            lines.push(format!("far_tier: {}", tiers.far().name()));
            lines.push(format!("promotion: {:?}", tiers.promotion()));
        }

        match backend.memory_tier() {
            Some(memory) => {
                let stats = memory.stats();
                lines.push(format!("memory_entries: {}", stats.entries));
                lines.push(format!("memory_gets: {}", stats.gets));
                lines.push(format!("memory_hits: {}", stats.hits));
                lines.push(format!("memory_misses: {}", stats.misses));
                lines.push(format!("memory_hit_rate: {:.2}", stats.hit_rate()));
                lines.push(format!("memory_sets: {}", stats.sets));
                lines.push(format!("memory_removes: {}", stats.removes));
                lines.push(format!("memory_evictions: {}", stats.evictions));
                lines.push(format!("memory_expirations: {}", stats.expirations));
            }
            None => lines.push("memory: (none)".dimmed().to_string()),
        }

        lines.join("\n")
    }

    /// Round-trips a read through every configured tier
    async fn cmd_ping(&self) -> Result<String> {
        self.cache
            .get::<Value>("layercache:ping")
            .await
            .context("cache unreachable")?;
        Ok("PONG".green().to_string())
    }
}

/// JSON when it parses, a plain string otherwise
fn parse_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// `0` leaves that half of the expiration unset
fn parse_expiration(absolute: Option<&String>, sliding: Option<&String>) -> Result<Expiration> {
    let seconds = |raw: Option<&String>, what: &str| -> Result<Option<Duration>> {
        match raw {
            None => Ok(None),
            Some(raw) => {
                let secs = raw
                    .parse::<u64>()
                    .with_context(|| format!("{} must be a number of seconds", what))?;
                Ok((secs > 0).then(|| Duration::from_secs(secs)))
            }
        }
    };

    let mut expiration = Expiration::NONE;
    if let Some(after) = seconds(absolute, "absolute expiration")? {
        expiration = expiration.with_absolute(after);
    }
    if let Some(window) = seconds(sliding, "sliding expiration")? {
        expiration = expiration.with_sliding(window);
    }
    Ok(expiration)
}

fn help_text() -> String {
    format!(
        r#"{}

{}
  SET key value [abs] [sliding]  Store a value; expirations in seconds, 0 = unset
  GET key                        Get the value of key
  DEL key [key ...]              Remove one or more keys

{}
  STATS                          In-process tier statistics
  INFO                           Alias for STATS
  PING                           Check that every tier answers
  HELP                           Show this help message
  QUIT                           Exit the CLI

Values are parsed as JSON when possible, otherwise stored as strings.
"#,
        "layercache CLI - Available Commands".bold().cyan(),
        "Cache Commands:".bold(),
        "Diagnostics:".bold(),
    )
}

/// Logs go to stderr so command output stays clean. `RUST_LOG` overrides the
/// configured level.
fn init_tracing(logging: &LoggingConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&logging.level));
    let builder = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .with_target(false);

    match logging.format.as_str() {
        "json" => builder.json().init(),
        "pretty" => builder.pretty().init(),
        _ => builder.compact().init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => CacheConfig::from_file(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => CacheConfig::default(),
    };

    init_tracing(&config.logging);
    info!(mode = ?config.mode, "Starting layercache CLI v{}", env!("CARGO_PKG_VERSION"));

    let cache = CacheManager::from_config(&config)
        .await
        .context("failed to build cache")?;
    let shell = CacheShell::new(cache);

    // Check if running in command mode or interactive mode
    if !args.command.is_empty() {
        let cmd = &args.command[0];
        let cmd_args: Vec<String> = args.command[1..].to_vec();

        match shell.execute_command(cmd, &cmd_args).await {
            Ok(output) => {
                println!("{}", output);
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "Command failed");
                eprintln!("{}", format!("Error: {:#}", e).red());
                std::process::exit(1);
            }
        }
    } else {
        run_interactive(shell).await
    }
}

async fn run_interactive(shell: CacheShell) -> Result<()> {
    println!(
        "{}",
        format!("layercache CLI v{}", env!("CARGO_PKG_VERSION"))
            .bold()
            .cyan()
    );
    println!("Provider: {}", shell.cache.provider().name());
    println!("Type {} for available commands\n", "HELP".bold());

    let mut rl = DefaultEditor::new()?;
    let prompt = format!("{}> ", format!("layercache {}", shell.cache.provider().name()).green());

    loop {
        match rl.readline(&prompt) {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }

                rl.add_history_entry(&line)?;

                let parts = split_line(&line);
                let Some((cmd, args)) = parts.split_first() else {
                    continue;
                };

                if cmd.eq_ignore_ascii_case("QUIT") || cmd.eq_ignore_ascii_case("EXIT") {
                    println!("Goodbye!");
                    break;
                }

                match shell.execute_command(cmd, args).await {
                    Ok(output) => println!("{}", output),
                    Err(e) => {
                        error!(error = %e, "Command failed");
                        eprintln!("{}", format!("Error: {:#}", e).red());
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("Goodbye!");
                break;
            }
            Err(err) => {
                error!(error = ?err, "Readline error");
                break;
            }
        }
    }

    Ok(())
}

/// Whitespace split that keeps single-quoted segments together, so JSON
/// values with spaces can be typed as `SET k '{"a": 1}'`
fn split_line(line: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut current = String::new();
    let mut quoted = false;

    for ch in line.chars() {
        match ch {
            '\'' => quoted = !quoted,
            c if c.is_whitespace() && !quoted => {
                if !current.is_empty() {
                    parts.push(std::mem::take(&mut current));
                }
            }
            c => current.push(c),
        }
    }
    if !current.is_empty() {
        parts.push(current);
    }
    parts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    fn shell() -> CacheShell {
        CacheShell::new(CacheManager::memory(layercache::MemoryConfig::default()))
    }

    #[test]
    fn test_parse_value() {
        assert_eq!(parse_value("42"), Value::from(42));
        assert_eq!(parse_value(r#"{"a":1}"#), serde_json::json!({"a": 1}));
        assert_eq!(parse_value("hello"), Value::String("hello".into()));
    }

    #[test]
    fn test_parse_expiration() {
        let five = "5".to_string();
        let sixty = "60".to_string();
        let zero = "0".to_string();

        assert_eq!(parse_expiration(None, None).unwrap(), Expiration::NONE);
        assert_eq!(
            parse_expiration(Some(&five), Some(&sixty)).unwrap(),
            Expiration::absolute(Duration::from_secs(5)).with_sliding(Duration::from_secs(60))
        );
        assert_eq!(
            parse_expiration(Some(&zero), Some(&sixty)).unwrap(),
            Expiration::sliding(Duration::from_secs(60))
        );
        assert!(parse_expiration(Some(&"soon".to_string()), None).is_err());
    }

    #[test]
    fn test_split_line_keeps_quoted_json() {
        assert_eq!(
            split_line(r#"SET k '{"a": 1}'  30"#),
            args(&["SET", "k", r#"{"a": 1}"#, "30"])
        );
        assert!(split_line("   ").is_empty());
    }

    #[tokio::test]
    async fn test_set_get_del() {
        let shell = shell();

        shell.cmd_set(&args(&["user:1", r#"{"name":"Ana"}"#])).await.unwrap();
        let out = shell.cmd_get(&args(&["user:1"])).await.unwrap();
        assert_eq!(out, r#"{"name":"Ana"}"#);

        shell.cmd_del(&args(&["user:1"])).await.unwrap();
        let out = shell.cmd_get(&args(&["user:1"])).await.unwrap();
        assert!(out.contains("(nil)"));
    }

    #[tokio::test]
    async fn test_stored_zero_is_not_nil() {
        let shell = shell();

        shell.cmd_set(&args(&["counter", "0"])).await.unwrap();
        assert_eq!(shell.cmd_get(&args(&["counter"])).await.unwrap(), "0");
    }

    #[tokio::test]
    async fn test_usage_errors() {
        let shell = shell();

        assert!(shell.cmd_set(&args(&["only-key"])).await.is_err());
        assert!(shell.cmd_get(&[]).await.is_err());
        assert!(shell.execute_command("FLUSHALL", &[]).await.is_err());
    }

    #[tokio::test]
    async fn test_stats_and_ping() {
        let shell = shell();
        shell.cmd_set(&args(&["k", "1"])).await.unwrap();

        let stats = shell.cmd_stats();
        assert!(stats.contains("provider: memory"));
        assert!(stats.contains("memory_entries: 1"));
        assert!(shell.cmd_ping().await.unwrap().contains("PONG"));
    }
}
