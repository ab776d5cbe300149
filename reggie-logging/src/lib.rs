//! Tracing subscriber setup shared by the Reggie binaries.
//!
//! Configuration comes from the environment:
//!
//! | Variable            | Values                                  | Default          |
//! |---------------------|-----------------------------------------|------------------|
//! | `REGGIE_LOG_LEVEL`  | any `EnvFilter` directive               | `info`           |
//! | `REGGIE_LOG_FORMAT` | `human`, `json`                         | `human`          |
//! | `REGGIE_LOG_OUTPUT` | `console`, `file`, `both`, `none`       | `console`        |
//! | `REGGIE_LOG_FILE`   | path of the daily-rolled log file       | `/tmp/reggie.log`|
//!
//! `RUST_LOG`, when set, takes precedence over `REGGIE_LOG_LEVEL`.

use std::{
    env,
    io::{self, Write},
    path::{Path, PathBuf},
};
use tracing::level_filters::LevelFilter;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    filter::Directive,
    fmt::{writer::BoxMakeWriter, MakeWriter},
    layer::Layer,
    prelude::*,
    registry, EnvFilter, Registry,
};

const DEFAULT_LOG_FILE: &str = "/tmp/reggie.log";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Human,
    Json,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogOutput {
    Console,
    File,
    Both,
    None,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub level: String,
    pub format: LogFormat,
    pub output: LogOutput,
    pub file_path: PathBuf,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Human,
            output: LogOutput::Console,
            file_path: PathBuf::from(DEFAULT_LOG_FILE),
        }
    }
}

impl LogConfig {
    /// Read the `REGGIE_LOG_*` variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a config from an arbitrary variable source. Unknown values fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let format = match lookup("REGGIE_LOG_FORMAT").as_deref() {
            Some("json") => LogFormat::Json,
            _ => LogFormat::Human,
        };
        let output = match lookup("REGGIE_LOG_OUTPUT").as_deref() {
            Some("file") => LogOutput::File,
            Some("both") => LogOutput::Both,
            Some("none") => LogOutput::None,
            _ => LogOutput::Console,
        };

        Self {
            level: lookup("REGGIE_LOG_LEVEL")
                .filter(|level| !level.trim().is_empty())
                .unwrap_or(defaults.level),
            format,
            output,
            file_path: lookup("REGGIE_LOG_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.file_path),
        }
    }

    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.level = level.into();
        self
    }

    fn env_filter(&self) -> EnvFilter {
        let filter = EnvFilter::try_from_default_env()
            .or_else(|_| EnvFilter::try_new(&self.level))
            .unwrap_or_else(|_| EnvFilter::default().add_directive(LevelFilter::INFO.into()));

        ["tokio=warn", "hyper=warn"]
            .into_iter()
            .filter_map(|d| d.parse::<Directive>().ok())
            .fold(filter, EnvFilter::add_directive)
    }
}

// --- Tee writer: one event, two destinations ---
struct Tee<A, B> {
    a: A,
    b: B,
}

impl<A, B> Write for Tee<A, B>
where
    A: Write,
    B: Write,
{
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let res_a = self.a.write(buf);
        let res_b = self.b.write(buf);
        res_a.or(res_b)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.a.flush()?;
        self.b.flush()
    }
}

#[derive(Clone)]
struct MakeTee<A, B> {
    make_a: A,
    make_b: B,
}

impl<'a, A, B, W1, W2> MakeWriter<'a> for MakeTee<A, B>
where
    A: MakeWriter<'a, Writer = W1>,
    B: MakeWriter<'a, Writer = W2>,
    W1: Write + 'a,
    W2: Write + 'a,
{
    type Writer = Tee<W1, W2>;
    fn make_writer(&'a self) -> Self::Writer {
        Tee {
            a: self.make_a.make_writer(),
            b: self.make_b.make_writer(),
        }
    }
}

fn file_writer(path: &Path) -> (tracing_appender::non_blocking::NonBlocking, WorkerGuard) {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let file_name = path
        .file_name()
        .unwrap_or_else(|| "reggie.log".as_ref());
    tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, file_name))
}

/// Install the global subscriber.
///
/// Returns the file writer's guard, which must be kept alive for buffered lines
/// to reach the file. Does nothing if a global subscriber is already set.
pub fn init_subscriber(config: &LogConfig) -> Option<WorkerGuard> {
    let mut guard = None;

    let writer = match config.output {
        LogOutput::None => None,
        LogOutput::Console => Some(BoxMakeWriter::new(io::stdout)),
        LogOutput::File => {
            let (non_blocking, file_guard) = file_writer(&config.file_path);
            guard = Some(file_guard);
            Some(BoxMakeWriter::new(non_blocking))
        }
        LogOutput::Both => {
            let (non_blocking, file_guard) = file_writer(&config.file_path);
            guard = Some(file_guard);
            Some(BoxMakeWriter::new(MakeTee {
                make_a: io::stdout,
                make_b: non_blocking,
            }))
        }
    };

    let fmt_layer = writer.map(|writer| -> Box<dyn Layer<Registry> + Send + Sync> {
        let layer = tracing_subscriber::fmt::layer().with_writer(writer);
        match config.format {
            LogFormat::Json => layer.json().boxed(),
            LogFormat::Human => layer.pretty().boxed(),
        }
    });

    if registry()
        .with(fmt_layer)
        .with(config.env_filter())
        .try_init()
        .is_err()
    {
        tracing::debug!("Global subscriber already installed");
    }

    guard
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = LogConfig::from_lookup(lookup(&[]));
        assert_eq!(config, LogConfig::default());
        assert_eq!(config.level, "info");
        assert_eq!(config.output, LogOutput::Console);
    }

    #[test]
    fn test_env_values() {
        let config = LogConfig::from_lookup(lookup(&[
            ("REGGIE_LOG_LEVEL", "reggie_store=debug"),
            ("REGGIE_LOG_FORMAT", "json"),
            ("REGGIE_LOG_OUTPUT", "both"),
            ("REGGIE_LOG_FILE", "/var/log/reggie/server.log"),
        ]));
        assert_eq!(config.level, "reggie_store=debug");
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.output, LogOutput::Both);
        assert_eq!(
            config.file_path,
            PathBuf::from("/var/log/reggie/server.log")
        );
    }

    #[test]
    fn test_unknown_values_fall_back() {
        let config = LogConfig::from_lookup(lookup(&[
            ("REGGIE_LOG_FORMAT", "xml"),
            ("REGGIE_LOG_OUTPUT", "syslog"),
            ("REGGIE_LOG_LEVEL", "  "),
        ]));
        assert_eq!(config.format, LogFormat::Human);
        assert_eq!(config.output, LogOutput::Console);
        assert_eq!(config.level, "info");
    }

    #[test]
    fn test_tee_writes_both() {
        let mut tee = Tee {
            a: Vec::new(),
            b: Vec::new(),
        };
        tee.write_all(b"line\n").unwrap();
        tee.flush().unwrap();
        assert_eq!(tee.a, b"line\n");
        assert_eq!(tee.b, b"line\n");
    }
}
