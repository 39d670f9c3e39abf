// src/lib.rs

pub mod transcoder {
use clap::{ArgGroup, CommandFactory, Parser};
use log::{debug, error, info, warn, LevelFilter};
use serde::Deserialize;
use simplelog::{ConfigBuilder, WriteLogger};
use std::{
    error::Error,
    fmt,
    fs::{File, OpenOptions},
    io::{self, BufReader, BufWriter, Read, Write},
    path::{Path, PathBuf},
    str::FromStr,
};

/// Marker for a 1 bit.
pub const ALL_ONES: u8 = 0xFF;
/// Marker for a 0 bit.
pub const ALL_ZEROS: u8 = 0x00;
/// Markers per source byte.
pub const GROUP_LEN: usize = 8;

// -------------- Error type --------------

#[derive(Debug)]
pub enum Utf256Error {
    Usage(String),
    Io(String),
    Malformed { value: u8, offset: u64 },
    Misaligned { length: u64 },
    InvalidConfiguration(String),
}

impl fmt::Display for Utf256Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Utf256Error::Usage(e) => write!(f, "{}", e),
            Utf256Error::Io(e) => write!(f, "I/O error: {}", e),
            Utf256Error::Malformed { value, offset } => write!(
                f,
                "Malformed marker byte 0x{:02X} at offset {}: expected 0x00 or 0xFF",
                value, offset
            ),
            Utf256Error::Misaligned { length } => write!(
                f,
                "Stream length not a multiple of {}: {} bytes ({} trailing)",
                GROUP_LEN,
                length,
                length % GROUP_LEN as u64
            ),
            Utf256Error::InvalidConfiguration(e) => write!(f, "Invalid configuration: {}", e),
        }
    }
}

impl Error for Utf256Error {}

// -------------- Codec --------------

/// Expands one byte into its group of markers, most significant bit first.
pub fn encode_byte(byte: u8) -> [u8; GROUP_LEN] {
    let mut group = [ALL_ZEROS; GROUP_LEN];
    for (i, marker) in group.iter_mut().enumerate() {
        if (byte >> (GROUP_LEN - 1 - i)) & 1 == 1 {
            *marker = ALL_ONES;
        }
    }
    group
}

/// Folds a group of markers back into one byte.
///
/// `offset` is the stream position of the group's first marker and is only
/// used to locate a bad marker in the returned error.
pub fn decode_group(group: &[u8; GROUP_LEN], offset: u64) -> Result<u8, Utf256Error> {
    let mut acc = 0u8;
    for (i, &marker) in group.iter().enumerate() {
        acc <<= 1;
        match marker {
            ALL_ZEROS => {}
            ALL_ONES => acc |= 1,
            value => {
                return Err(Utf256Error::Malformed {
                    value,
                    offset: offset + i as u64,
                });
            }
        }
    }
    Ok(acc)
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TranscodeStats {
    pub bytes_read: u64,
    pub bytes_written: u64,
}

fn read_err(e: io::Error) -> Utf256Error {
    Utf256Error::Io(format!("read failed: {}", e))
}

fn write_err(e: io::Error) -> Utf256Error {
    Utf256Error::Io(format!("write failed: {}", e))
}

/// Encodes everything `reader` yields into `writer`.
pub fn encode<R, W>(reader: &mut R, writer: &mut W) -> Result<TranscodeStats, Utf256Error>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
{
    let mut stats = TranscodeStats::default();
    let mut buf = [0u8; 4096];
    let mut out = Vec::with_capacity(buf.len() * GROUP_LEN);
    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(read_err(e)),
        };
        out.clear();
        for &byte in &buf[..n] {
            out.extend_from_slice(&encode_byte(byte));
        }
        writer.write_all(&out).map_err(write_err)?;
        stats.bytes_read += n as u64;
        stats.bytes_written += out.len() as u64;
        debug!("Encoded {} bytes ({} total)", n, stats.bytes_read);
    }
    writer.flush().map_err(write_err)?;
    Ok(stats)
}

// Fills `group` as far as the reader allows; a short count means end of stream.
fn read_group<R: Read + ?Sized>(reader: &mut R, group: &mut [u8; GROUP_LEN]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < GROUP_LEN {
        match reader.read(&mut group[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Decodes `reader` group by group into `writer`.
///
/// Groups decoded before a failure have already been handed to `writer`.
pub fn decode<R, W>(reader: &mut R, writer: &mut W) -> Result<TranscodeStats, Utf256Error>
where
    R: Read + ?Sized,
    W: Write + ?Sized,
{
    let mut stats = TranscodeStats::default();
    let mut group = [0u8; GROUP_LEN];
    loop {
        let n = read_group(reader, &mut group).map_err(read_err)?;
        if n == 0 {
            break;
        }
        if n < GROUP_LEN {
            let length = stats.bytes_read + n as u64;
            warn!("Trailing partial group of {} bytes at offset {}", n, stats.bytes_read);
            return Err(Utf256Error::Misaligned { length });
        }
        let byte = decode_group(&group, stats.bytes_read).inspect_err(|_| {
            error!("Bad group at offset {}: {}", stats.bytes_read, hex::encode(group));
        })?;
        writer.write_all(&[byte]).map_err(write_err)?;
        stats.bytes_read += GROUP_LEN as u64;
        stats.bytes_written += 1;
    }
    writer.flush().map_err(write_err)?;
    Ok(stats)
}

// -------------- Transcoder trait --------------

pub trait Transcoder {
    fn name(&self) -> &'static str;
    fn transcode(
        &self,
        input: &mut dyn Read,
        output: &mut dyn Write,
    ) -> Result<TranscodeStats, Utf256Error>;
}

pub struct Utf256Encoder;
impl Transcoder for Utf256Encoder {
    fn name(&self) -> &'static str { "encode" }
    fn transcode(
        &self,
        input: &mut dyn Read,
        output: &mut dyn Write,
    ) -> Result<TranscodeStats, Utf256Error> {
        encode(input, output)
    }
}

pub struct Utf256Decoder;
impl Transcoder for Utf256Decoder {
    fn name(&self) -> &'static str { "decode" }
    fn transcode(
        &self,
        input: &mut dyn Read,
        output: &mut dyn Write,
    ) -> Result<TranscodeStats, Utf256Error> {
        decode(input, output)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Encode,
    Decode,
}

impl Mode {
    pub fn transcoder(self) -> Box<dyn Transcoder> {
        match self {
            Mode::Encode => Box::new(Utf256Encoder),
            Mode::Decode => Box::new(Utf256Decoder),
        }
    }

    /// Past tense used in the success line.
    pub fn done(self) -> &'static str {
        match self {
            Mode::Encode => "Encoded",
            Mode::Decode => "Decoded",
        }
    }
}

// -------------- Files --------------

/// Transcodes `input` into `output`, creating or truncating `output`.
///
/// The input is opened first, so an unreadable input leaves no output file
/// behind. The writer is flushed whether or not transcoding succeeded.
pub fn transcode_file(
    mode: Mode,
    input: &Path,
    output: &Path,
    buffer_size: usize,
) -> Result<TranscodeStats, Utf256Error> {
    let src = File::open(input)
        .map_err(|e| Utf256Error::Io(format!("cannot open input '{}': {}", input.display(), e)))?;
    let dst = File::create(output)
        .map_err(|e| Utf256Error::Io(format!("cannot create output '{}': {}", output.display(), e)))?;

    let mut reader = BufReader::with_capacity(buffer_size, src);
    let mut writer = BufWriter::with_capacity(buffer_size, dst);

    let transcoder = mode.transcoder();
    info!(
        "Running {}: '{}' -> '{}'",
        transcoder.name(),
        input.display(),
        output.display()
    );
    let result = transcoder.transcode(&mut reader, &mut writer);
    let flushed = writer.flush().map_err(write_err);

    let stats = result?;
    flushed?;
    info!(
        "Finished {}: read {} bytes, wrote {} bytes",
        transcoder.name(),
        stats.bytes_read,
        stats.bytes_written
    );
    Ok(stats)
}

// -------------- Config structures --------------

/// Upper bound for `buffer_size_kb` (64 MiB per buffer).
pub const MAX_BUFFER_SIZE_KB: usize = 64 * 1024;

#[derive(Deserialize)]
struct RawConfig {
    schema_version: Option<String>,
    buffer_size_kb: Option<usize>,

    log_enabled: Option<bool>,
    log_level: Option<String>,
    log_file: Option<String>,
    log_append: Option<bool>,
}

impl Default for RawConfig {
    fn default() -> Self {
        RawConfig {
            schema_version: Some("1.0".into()),
            buffer_size_kb: Some(64),

            log_enabled: Some(false),
            log_level: Some("info".into()),
            log_file: Some("utf256.log".into()),
            log_append: Some(true),
        }
    }
}

#[derive(Parser, Debug)]
#[command(
    name = "utf256",
    version,
    about = "UTF-256 encoder/decoder: one 0x00/0xFF marker byte per input bit",
    arg_required_else_help = true,
    after_help = "Examples:\n  utf256 -e plain.txt -o plain.u256\n  utf256 -d plain.u256 -o plain.txt"
)]
#[command(group(ArgGroup::new("mode").required(true).args(["encode", "decode"])))]
pub struct Cli {
    /// Encode INPUT into UTF-256
    #[arg(short = 'e', long, value_name = "INPUT")]
    encode: Option<PathBuf>,

    /// Decode UTF-256 INPUT back to bytes
    #[arg(short = 'd', long, value_name = "INPUT")]
    decode: Option<PathBuf>,

    /// Output file, created or truncated
    #[arg(short = 'o', long, value_name = "OUTPUT")]
    output: PathBuf,

    /// Path to config file
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long)] log_enabled: Option<bool>,
    #[arg(long)] log_level: Option<String>,
    #[arg(long)] log_file: Option<String>,
    #[arg(long)] log_append: Option<bool>,

    #[arg(long)] buffer_size_kb: Option<usize>,
}

#[derive(Debug)]
pub struct Config {
    pub mode: Mode,
    pub input: PathBuf,
    pub output: PathBuf,
    pub buffer_size: usize,

    pub log_enabled: bool,
    pub log_level: String,
    pub log_file: String,
    pub log_append: bool,
}

impl Config {
    pub fn from(cli: Cli) -> Result<Self, Utf256Error> {
        // 1) Determine config file path
        let path = if let Some(cfg) = cli.config {
            cfg
        } else if let Ok(env) = std::env::var("UTF256_CONFIG") {
            PathBuf::from(env)
        } else {
            PathBuf::from("utf256.json")
        };

        // 2) Load JSON
        let mut raw = RawConfig::default();
        if let Ok(f) = File::open(&path) {
            let mut s = String::new();
            io::BufReader::new(f)
                .read_to_string(&mut s)
                .map_err(|e| Utf256Error::Io(format!("{}: {}", path.display(), e)))?;
            let file_cfg: RawConfig = serde_json::from_str(&s).map_err(|e| {
                Utf256Error::InvalidConfiguration(format!("{}: {}", path.display(), e))
            })?;
            raw = RawConfig {
                schema_version: file_cfg.schema_version.or(raw.schema_version),
                buffer_size_kb: file_cfg.buffer_size_kb.or(raw.buffer_size_kb),
                log_enabled: file_cfg.log_enabled.or(raw.log_enabled),
                log_level: file_cfg.log_level.or(raw.log_level),
                log_file: file_cfg.log_file.or(raw.log_file),
                log_append: file_cfg.log_append.or(raw.log_append),
            };
        }

        if let Some(v) = raw.schema_version.as_deref() {
            if !v.starts_with("1.") {
                return Err(Utf256Error::InvalidConfiguration(format!(
                    "unsupported schema_version {}",
                    v
                )));
            }
        }

        // 3) Override with CLI
        let buffer_size_kb = cli.buffer_size_kb.or(raw.buffer_size_kb).unwrap_or(64);
        if buffer_size_kb == 0 || buffer_size_kb > MAX_BUFFER_SIZE_KB {
            return Err(Utf256Error::InvalidConfiguration(format!(
                "buffer_size_kb must be between 1 and {}, got {}",
                MAX_BUFFER_SIZE_KB, buffer_size_kb
            )));
        }
        let buffer_size = buffer_size_kb * 1024;

        let log_enabled = cli.log_enabled.or(raw.log_enabled).unwrap_or(false);
        let log_level = cli.log_level.or(raw.log_level).unwrap_or_else(|| "info".into());
        let log_file = cli.log_file.or(raw.log_file).unwrap_or_else(|| "utf256.log".into());
        let log_append = cli.log_append.or(raw.log_append).unwrap_or(true);

        // 4) Mode; clap's group guarantees exactly one is set
        let (mode, input) = match (cli.encode, cli.decode) {
            (Some(p), None) => (Mode::Encode, p),
            (None, Some(p)) => (Mode::Decode, p),
            _ => {
                return Err(Utf256Error::Usage(format!(
                    "error: exactly one of -e or -d is required\n\n{}",
                    Cli::command().render_help()
                )));
            }
        };

        Ok(Config {
            mode,
            input,
            output: cli.output,
            buffer_size,
            log_enabled,
            log_level,
            log_file,
            log_append,
        })
    }
}

// -------------- Main --------------

pub fn init_logging(cfg: &Config) -> Result<(), Utf256Error> {
    if !cfg.log_enabled {
        return Ok(());
    }
    let level = LevelFilter::from_str(&cfg.log_level).unwrap_or(LevelFilter::Info);
    let file = OpenOptions::new()
        .append(cfg.log_append)
        .truncate(!cfg.log_append)
        .write(true)
        .create(true)
        .open(&cfg.log_file)
        .map_err(|e| Utf256Error::Io(format!("{}: {}", cfg.log_file, e)))?;
    let log_cfg = ConfigBuilder::new()
        .set_time_format_str("%+")
        .build();
    WriteLogger::init(level, log_cfg, file)
        .map_err(|e| Utf256Error::InvalidConfiguration(format!("logger: {}", e)))
}

/// Runs the configured transcode and returns the line to print on success.
pub fn execute(cfg: &Config) -> Result<String, Utf256Error> {
    transcode_file(cfg.mode, &cfg.input, &cfg.output, cfg.buffer_size)
        .inspect_err(|e| error!("{} failed: {}", cfg.mode.transcoder().name(), e))?;
    Ok(format!(
        "{} successfully to '{}'",
        cfg.mode.done(),
        cfg.output.display()
    ))
}

}

use clap::{error::ErrorKind, CommandFactory, Parser};
use transcoder::{Cli, Config, Utf256Error};

/// Parses `args`, mapping every clap failure to a usage error carrying the
/// text to show on stderr. `Ok(None)` means help or version was requested.
pub fn parse_args<I, T>(args: I) -> Result<Option<Cli>, Utf256Error>
where
    I: IntoIterator<Item = T>,
    T: Into<std::ffi::OsString> + Clone,
{
    match Cli::try_parse_from(args) {
        Ok(cli) => Ok(Some(cli)),
        Err(e) => match e.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => {
                eprint!("{}", e.render());
                Ok(None)
            }
            ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand => {
                Err(Utf256Error::Usage(e.render().to_string()))
            }
            _ => Err(Utf256Error::Usage(format!(
                "{}\n{}",
                e.render(),
                Cli::command().render_help()
            ))),
        },
    }
}

/// A convenient entrypoint for the binary:
pub fn run_app() -> Result<(), Utf256Error> {
    let Some(cli) = parse_args(std::env::args_os())? else {
        return Ok(());
    };
    let cfg = Config::from(cli)?;
    transcoder::init_logging(&cfg)?;

    let message = transcoder::execute(&cfg)?;
    println!("{}", message);
    Ok(())
}
