pub mod bridge;
pub mod collect;
pub mod compiler;
pub mod config;
pub mod css;
pub mod diagnostics;
pub mod error;
pub mod extract;
pub mod markup;
pub mod position;
pub mod preprocess;
pub mod reassemble;
pub mod scanner;

pub use compiler::{Processor, ProcessorConfig, UtilityCompiler};
pub use diagnostics::{Diagnostic, DiagnosticKind};
pub use error::PreprocessError;
pub use preprocess::{Mode, Options, Output, preprocess};

use globset::GlobSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::channel;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Process {
        input: String,
        output: Option<String>,
        map: bool,
        config: Option<String>,
    },
    Build {
        inputs: Vec<String>,
        out_dir: Option<String>,
        config: Option<String>,
        ignore: Vec<String>,
    },
    Watch {
        inputs: Vec<String>,
        out_dir: Option<String>,
        config: Option<String>,
        ignore: Vec<String>,
        poll: bool,
        poll_interval_ms: u64,
    },
    Help,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliError {
    pub message: String,
}

pub fn run(command: Command) -> Result<(), CliError> {
    match command {
        Command::Process {
            input,
            output,
            map,
            config,
        } => run_process(&input, output.as_deref(), map, config.as_deref()),
        Command::Build {
            inputs,
            out_dir,
            config,
            ignore,
        } => run_build(&inputs, out_dir.as_deref(), config.as_deref(), &ignore).map(|_| ()),
        Command::Watch {
            inputs,
            out_dir,
            config,
            ignore,
            poll,
            poll_interval_ms,
        } => run_watch(
            inputs,
            WatchOptions {
                out_dir,
                config,
                ignore,
                poll,
                poll_interval_ms,
            },
        ),
        Command::Help => {
            print_help();
            Ok(())
        }
    }
}

pub fn run_from_env() -> Result<(), CliError> {
    let command = parse_args(env::args().skip(1))?;
    run(command)
}

pub fn parse_args<I>(args: I) -> Result<Command, CliError>
where
    I: IntoIterator<Item = String>,
{
    let mut iter = args.into_iter();
    let Some(cmd) = iter.next() else {
        return Ok(Command::Help);
    };

    match cmd.as_str() {
        "process" => parse_process_args(iter.collect()),
        "build" => parse_build_args(iter.collect()),
        "watch" => parse_watch_args(iter.collect()),
        "-h" | "--help" | "help" => Ok(Command::Help),
        _ => Err(CliError {
            message: format!("unknown command: {}", cmd),
        }),
    }
}

fn flag_value(args: &[String], idx: usize, command: &str, flag: &str) -> Result<String, CliError> {
    args.get(idx).cloned().ok_or_else(|| CliError {
        message: format!("{} requires a value for {}", command, flag),
    })
}

fn parse_process_args(args: Vec<String>) -> Result<Command, CliError> {
    let mut input = None;
    let mut output = None;
    let mut map = false;
    let mut config = None;
    let mut idx = 0;

    while idx < args.len() {
        match args[idx].as_str() {
            "--output" | "-o" => {
                idx += 1;
                output = Some(flag_value(&args, idx, "process", "--output")?);
            }
            "--config" | "-c" => {
                idx += 1;
                config = Some(flag_value(&args, idx, "process", "--config")?);
            }
            "--map" => {
                map = true;
            }
            value if input.is_none() => {
                input = Some(value.to_string());
            }
            value => {
                return Err(CliError {
                    message: format!("process takes a single file, got extra argument '{}'", value),
                });
            }
        }
        idx += 1;
    }

    let Some(input) = input else {
        return Err(CliError {
            message: "process requires a component file".to_string(),
        });
    };
    if map && output.is_none() {
        return Err(CliError {
            message: "--map requires --output".to_string(),
        });
    }

    Ok(Command::Process {
        input,
        output,
        map,
        config,
    })
}

fn parse_build_args(args: Vec<String>) -> Result<Command, CliError> {
    let mut inputs = Vec::new();
    let mut out_dir = None;
    let mut config = None;
    let mut ignore = Vec::new();
    let mut idx = 0;

    while idx < args.len() {
        match args[idx].as_str() {
            "--out-dir" | "-o" => {
                idx += 1;
                out_dir = Some(flag_value(&args, idx, "build", "--out-dir")?);
            }
            "--config" | "-c" => {
                idx += 1;
                config = Some(flag_value(&args, idx, "build", "--config")?);
            }
            "--ignore" | "-I" => {
                idx += 1;
                ignore.push(flag_value(&args, idx, "build", "--ignore")?);
            }
            "--poll" => {
                return Err(CliError {
                    message: "--poll is only supported with watch".to_string(),
                });
            }
            value => {
                inputs.push(value.to_string());
            }
        }
        idx += 1;
    }

    if inputs.is_empty() {
        return Err(CliError {
            message: "build requires at least one path or glob pattern".to_string(),
        });
    }

    Ok(Command::Build {
        inputs,
        out_dir,
        config,
        ignore,
    })
}

fn parse_watch_args(args: Vec<String>) -> Result<Command, CliError> {
    let mut inputs = Vec::new();
    let mut out_dir = None;
    let mut config = None;
    let mut ignore = Vec::new();
    let mut poll = false;
    let mut poll_interval_ms = 500;
    let mut idx = 0;

    while idx < args.len() {
        match args[idx].as_str() {
            "--out-dir" | "-o" => {
                idx += 1;
                out_dir = Some(flag_value(&args, idx, "watch", "--out-dir")?);
            }
            "--config" | "-c" => {
                idx += 1;
                config = Some(flag_value(&args, idx, "watch", "--config")?);
            }
            "--ignore" | "-I" => {
                idx += 1;
                ignore.push(flag_value(&args, idx, "watch", "--ignore")?);
            }
            "--poll" => {
                poll = true;
            }
            "--poll-interval" => {
                idx += 1;
                let value = flag_value(&args, idx, "watch", "--poll-interval")?;
                poll = true;
                poll_interval_ms = parse_u64_arg(&value, "--poll-interval")?;
            }
            value => {
                inputs.push(value.to_string());
            }
        }
        idx += 1;
    }

    if inputs.is_empty() {
        return Err(CliError {
            message: "watch requires at least one path or glob pattern".to_string(),
        });
    }

    Ok(Command::Watch {
        inputs,
        out_dir,
        config,
        ignore,
        poll,
        poll_interval_ms,
    })
}

fn load_config(path: Option<&str>) -> Result<config::Config, CliError> {
    config::load_or_default(path.map(Path::new)).map_err(|err| CliError {
        message: err.message,
    })
}

fn report(diagnostics: &[Diagnostic]) {
    for diagnostic in diagnostics {
        warn!("{}", diagnostic);
    }
}

fn write_output(path: &Path, output: &Output) -> Result<(), CliError> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|err| CliError {
            message: format!("failed to create directory {}: {}", parent.display(), err),
        })?;
    }
    fs::write(path, &output.code).map_err(|err| CliError {
        message: format!("failed to write output {}: {}", path.display(), err),
    })?;
    if let Some(map) = output.map.as_ref() {
        let map_path = map_path_for(path);
        let mut buffer = Vec::new();
        map.to_writer(&mut buffer).map_err(|err| CliError {
            message: format!("failed to serialize source map {}: {}", map_path.display(), err),
        })?;
        fs::write(&map_path, buffer).map_err(|err| CliError {
            message: format!("failed to write source map {}: {}", map_path.display(), err),
        })?;
    }
    Ok(())
}

fn map_path_for(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".map");
    PathBuf::from(name)
}

fn run_process(
    input: &str,
    output_path: Option<&str>,
    map: bool,
    config_path: Option<&str>,
) -> Result<(), CliError> {
    let config = load_config(config_path)?;
    let processor = Processor::new(&config.processor_config());
    let source = fs::read_to_string(input).map_err(|err| CliError {
        message: format!("failed to read {}: {}", input, err),
    })?;
    let mut options = config.options(input);
    options.source_map = map || (options.source_map && output_path.is_some());

    let output = preprocess(&processor, &source, &options).map_err(|err| CliError {
        message: err.to_string(),
    })?;
    report(&output.diagnostics);

    match output_path {
        Some(path) => write_output(Path::new(path), &output),
        None => {
            print!("{}", output.code);
            Ok(())
        }
    }
}

/// Rewrites every matched component. Returns how many files were processed.
fn run_build(
    inputs: &[String],
    out_dir: Option<&str>,
    config_path: Option<&str>,
    ignore: &[String],
) -> Result<usize, CliError> {
    let config = load_config(config_path)?;
    let processor = Processor::new(&config.processor_config());

    let mut effective_ignore = ignore.to_vec();
    if let Some(dir) = out_dir {
        effective_ignore.push(format!("{}/**", dir.trim_end_matches('/')));
    }
    let files = scanner::find_components(
        inputs,
        &effective_ignore,
        &scanner::ScanGlobOptions::default(),
    )
    .map_err(|err| CliError {
        message: err.message,
    })?;

    let mut failed = 0usize;
    let mut warnings = 0usize;
    for file in &files {
        let filename = file.relative.display().to_string();
        let result = fs::read_to_string(&file.path)
            .map_err(|err| CliError {
                message: format!("failed to read {}: {}", file.path.display(), err),
            })
            .and_then(|source| {
                preprocess(&processor, &source, &config.options(&filename)).map_err(|err| {
                    CliError {
                        message: err.to_string(),
                    }
                })
            });
        let output = match result {
            Ok(output) => output,
            Err(err) => {
                error!("{}", err.message);
                failed += 1;
                continue;
            }
        };
        report(&output.diagnostics);
        warnings += output.diagnostics.len();
        if let Some(dir) = out_dir {
            write_output(&Path::new(dir).join(&file.relative), &output)?;
        }
    }

    info!(
        "processed {} component(s), {} warning(s), {} failed",
        files.len(),
        warnings,
        failed
    );
    if failed > 0 {
        return Err(CliError {
            message: format!("{} component(s) failed to process", failed),
        });
    }
    Ok(files.len())
}

fn print_help() {
    println!("classweave");
    println!();
    println!("USAGE:");
    println!("  classweave process [--config <path>] [--output <path>] [--map] <file>");
    println!("  classweave build [--config <path>] [--out-dir <dir>] [--ignore <glob>] <glob...>");
    println!(
        "  classweave watch [--config <path>] [--out-dir <dir>] [--ignore <glob>] [--poll] [--poll-interval <ms>] <glob...>"
    );
    println!();
    println!("EXAMPLES:");
    println!("  classweave process src/App.svelte");
    println!("  classweave process -o dist/App.svelte --map src/App.svelte");
    println!("  classweave build --out-dir dist \"src/**/*.svelte\"");
    println!("  classweave build -c classweave.toml -I \"**/generated/**\" \"src/**/*.svelte\"");
    println!("  classweave watch --poll --poll-interval 250 --out-dir dist \"src/**/*.svelte\"");
    println!();
    println!("Set CLASSWEAVE_LOG=debug for per-element logging.");
}

#[derive(Debug, Clone)]
struct WatchOptions {
    out_dir: Option<String>,
    config: Option<String>,
    ignore: Vec<String>,
    poll: bool,
    poll_interval_ms: u64,
}

fn run_watch(inputs: Vec<String>, options: WatchOptions) -> Result<(), CliError> {
    let WatchOptions {
        out_dir,
        config,
        ignore,
        poll,
        poll_interval_ms,
    } = options;

    if let Err(err) = run_build(&inputs, out_dir.as_deref(), config.as_deref(), &ignore) {
        error!("build failed: {}", err.message);
    }
    let (tx, rx) = channel();
    let mut ignored_while_watching = ignore.clone();
    if let Some(dir) = out_dir.as_deref() {
        ignored_while_watching.push(format!("{}/**", dir.trim_end_matches('/')));
    }
    let ignore_set = scanner::build_globset(&ignored_while_watching).ok();
    let mut watcher: Box<dyn notify::Watcher> = if poll {
        Box::new(
            notify::PollWatcher::new(
                tx,
                notify::Config::default()
                    .with_poll_interval(Duration::from_millis(poll_interval_ms)),
            )
            .map_err(|err| CliError {
                message: format!("failed to start poll watcher: {}", err),
            })?,
        )
    } else {
        Box::new(notify::recommended_watcher(tx).map_err(|err| CliError {
            message: format!("failed to start watcher: {}", err),
        })?)
    };

    for root in watch_roots(&inputs, config.as_deref()) {
        watcher
            .watch(&root, notify::RecursiveMode::Recursive)
            .map_err(|err| CliError {
                message: format!("failed to watch {}: {}", root.display(), err),
            })?;
    }

    if poll {
        info!("watching for changes (polling, press Ctrl+C to stop)...");
    } else {
        info!("watching for changes (press Ctrl+C to stop)...");
    }

    let mut last_event = Instant::now();
    loop {
        match rx.recv_timeout(Duration::from_millis(200)) {
            Ok(event_result) => {
                let event = match event_result {
                    Ok(event) => event,
                    Err(err) => {
                        warn!("watch error: {}", err);
                        continue;
                    }
                };
                if should_ignore_event(&event, ignore_set.as_ref()) {
                    continue;
                }
                if last_event.elapsed() < Duration::from_millis(200) {
                    continue;
                }
                last_event = Instant::now();
                info!("change detected, rebuilding...");
                if let Err(err) = run_build(&inputs, out_dir.as_deref(), config.as_deref(), &ignore)
                {
                    error!("build failed: {}", err.message);
                }
            }
            Err(std::sync::mpsc::RecvTimeoutError::Timeout) => continue,
            Err(_) => break,
        }
    }

    Ok(())
}

/// Directories to watch: the static prefix of every glob plus the config
/// file's directory, deduplicated.
fn watch_roots(patterns: &[String], config: Option<&str>) -> Vec<PathBuf> {
    let mut roots = Vec::new();
    let mut seen = std::collections::HashSet::new();

    for pattern in patterns.iter().map(String::as_str).chain(config) {
        let root = glob_root(pattern);
        let normalized = if root.as_os_str().is_empty() {
            PathBuf::from(".")
        } else {
            root
        };
        if seen.insert(normalized.clone()) {
            roots.push(normalized);
        }
    }

    roots
}

fn glob_root(pattern: &str) -> PathBuf {
    let first_meta = pattern.find(['*', '?', '[', '{']);

    let Some(first_meta) = first_meta else {
        if pattern.ends_with('/') || pattern.ends_with('\\') {
            return PathBuf::from(pattern);
        }
        let path = Path::new(pattern);
        if path.extension().is_some() {
            return path.parent().unwrap_or(Path::new(".")).to_path_buf();
        }
        return path.to_path_buf();
    };

    let prefix = &pattern[..first_meta];
    match prefix.rfind(['/', '\\']) {
        Some(idx) => PathBuf::from(&prefix[..=idx]),
        None => PathBuf::from("."),
    }
}

fn parse_u64_arg(value: &str, flag: &str) -> Result<u64, CliError> {
    value.parse::<u64>().map_err(|_| CliError {
        message: format!("{} requires a positive integer, got '{}'", flag, value),
    })
}

fn should_ignore_event(event: &notify::Event, ignore_set: Option<&GlobSet>) -> bool {
    let Some(ignore_set) = ignore_set else {
        return false;
    };
    if event.paths.is_empty() {
        return false;
    }
    event.paths.iter().all(|path| ignore_set.is_match(path))
}
