mod commands;

use std::sync::{Arc, Mutex};
use std::thread;

use anyhow::{anyhow, Result};
use asnmap::lens::lookup::{CancelHandle, LookupLens, PipelineError};
use asnmap::lens::utils::OutputFormat;
use asnmap::AsnmapConfig;
use clap::Parser;
use commands::auth::{can_prompt, prompt_api_key};
use commands::input::InputArgs;
use commands::output::{is_broken_pipe, OutputWriter};
use tracing::{debug, info, warn, Level};

const EXIT_INTERRUPTED: i32 = 130;

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
struct Cli {
    #[clap(flatten)]
    input: InputArgs,

    /// File to write output to, stdout by default
    #[clap(short, long)]
    output: Option<String>,

    /// Output JSON Lines
    #[clap(short, long, conflicts_with = "csv")]
    json: bool,

    /// Output pipe-separated values with a header
    #[clap(short, long)]
    csv: bool,

    /// Include IPv6 ranges in CIDR output
    #[clap(long)]
    v6: bool,

    /// Print debug information
    #[clap(short, long, conflicts_with = "silent")]
    verbose: bool,

    /// Only print results
    #[clap(long)]
    silent: bool,

    /// Custom DNS resolvers, ip or ip:port (comma-separated)
    #[clap(short, long, value_delimiter = ',')]
    resolvers: Vec<String>,

    /// Proxy URLs or proxy list files (comma-separated), the first reachable one is used
    #[clap(short, long, value_delimiter = ',')]
    proxy: Vec<String>,

    /// Save an API key; prompts for it when no key is given
    #[clap(long, num_args = 0..=1, default_missing_value = "", value_name = "KEY")]
    auth: Option<String>,

    /// configuration file path, by default $HOME/.asnmap/asnmap.toml is used
    #[clap(long)]
    config: Option<String>,

    /// Number of concurrent lookups
    #[clap(long)]
    concurrency: Option<usize>,

    /// Request timeout in seconds
    #[clap(long)]
    timeout: Option<u64>,
}

impl Cli {
    fn output_format(&self) -> OutputFormat {
        if self.json {
            OutputFormat::Json
        } else if self.csv {
            OutputFormat::Csv
        } else {
            OutputFormat::Cidr
        }
    }

    fn apply_overrides(&self, config: &mut AsnmapConfig) {
        if !self.resolvers.is_empty() {
            config.resolvers = self.resolvers.clone();
        }
        if !self.proxy.is_empty() {
            config.proxy = self.proxy.clone();
        }
        if let Some(timeout) = self.timeout {
            config.timeout_secs = timeout;
        }
        if let Some(concurrency) = self.concurrency {
            config.concurrency = concurrency.max(1);
        }
    }
}

fn main() {
    // .env is optional
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else if cli.silent {
        Level::ERROR
    } else {
        Level::INFO
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    let code = match run(cli) {
        Ok(code) => code,
        Err(e) => {
            if !is_broken_pipe(&e) {
                eprintln!("ERROR: {}", e);
            }
            1
        }
    };
    std::process::exit(code);
}

fn run(cli: Cli) -> Result<i32> {
    let mut config = AsnmapConfig::new(&cli.config)?;
    cli.apply_overrides(&mut config);
    debug!("configuration:\n{}", config.summary());

    let mut prompted = false;
    if let Some(key) = &cli.auth {
        let key = if key.trim().is_empty() {
            if !can_prompt() {
                return Err(anyhow!("--auth needs a key when not running in a terminal"));
            }
            prompted = true;
            prompt_api_key()?
        } else {
            key.clone()
        };
        config.save_api_key(&key)?;
        info!("API key saved to {}", config.credentials_path.display());
    }

    let inputs = cli.input.collect()?;
    if inputs.is_empty() {
        if cli.auth.is_some() {
            return Ok(0);
        }
        return Err(anyhow!("no input provided, see --help"));
    }

    if config.api_key.is_none() && !prompted && can_prompt() {
        prompted = true;
        config.save_api_key(&prompt_api_key()?)?;
    }

    let format = cli.output_format();
    debug!("output format: {}", format);
    let mut output = OutputWriter::new(cli.output.as_deref(), format, cli.v6)?;

    let current: Arc<Mutex<Option<CancelHandle>>> = Arc::default();
    spawn_interrupt_watcher(Arc::clone(&current));

    loop {
        let lens = LookupLens::new(&config)?;
        set_current(&current, Some(lens.cancel_handle()));

        let result = lens.run(inputs.clone(), |batch| output.write_batch(&batch));
        set_current(&current, None);

        match result {
            Ok(summary) => {
                output.flush()?;
                if let Some(path) = &cli.output {
                    info!("wrote {} line(s) to {}", output.lines(), path);
                }
                if summary.interrupted {
                    warn!("interrupted, partial results written");
                    return Ok(EXIT_INTERRUPTED);
                }
                return Ok(0);
            }
            // a rejected key fails the run before anything is written
            Err(e) if e.is_unauthorized() && !prompted && can_prompt() => {
                warn!("{}", e);
                prompted = true;
                config.save_api_key(&prompt_api_key()?)?;
            }
            Err(PipelineError::Consumer(e)) if is_broken_pipe(&e) => return Ok(1),
            Err(e) => {
                let _ = output.flush();
                return Err(e.into());
            }
        }
    }
}

fn set_current(current: &Mutex<Option<CancelHandle>>, handle: Option<CancelHandle>) {
    if let Ok(mut guard) = current.lock() {
        *guard = handle;
    }
}

/// Cancel the running lookup on the first Ctrl-C, exit on the second
fn spawn_interrupt_watcher(current: Arc<Mutex<Option<CancelHandle>>>) {
    thread::spawn(move || {
        let runtime = match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(rt) => rt,
            Err(e) => {
                warn!("unable to watch for interrupts: {}", e);
                return;
            }
        };

        runtime.block_on(async {
            if tokio::signal::ctrl_c().await.is_err() {
                return;
            }
            let handle = current.lock().ok().and_then(|guard| guard.clone());
            match handle {
                Some(handle) => {
                    warn!("interrupted, waiting for in-flight lookups");
                    handle.cancel();
                }
                None => std::process::exit(EXIT_INTERRUPTED),
            }

            if tokio::signal::ctrl_c().await.is_ok() {
                std::process::exit(EXIT_INTERRUPTED);
            }
        });
    });
}
