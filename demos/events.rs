use clap::Parser as ClapParser;
use ctf_trace_core::config::ClockDisplayConfig;
use ctf_trace_core::Trace;
use std::path::PathBuf;
use tracing::error;

/// CTF trace events reader example
#[derive(Debug, clap::Parser)]
struct Opts {
    /// The trace directory (a `metadata` file plus one or more stream files)
    pub trace_dir: PathBuf,

    /// Print raw clock ticks instead of a decimal seconds value
    #[arg(long)]
    pub clock_raw: bool,

    /// Print clock time as seconds.nanoseconds since the clock's origin
    #[arg(long)]
    pub clock_seconds: bool,

    /// Print clock time in GMT instead of local time
    #[arg(long)]
    pub clock_gmt: bool,

    /// Prefix the clock time with the date
    #[arg(long)]
    pub clock_date: bool,

    /// Shift the printed clock time by this many seconds
    #[arg(long, default_value_t = 0)]
    pub clock_offset: i64,
}

fn main() {
    tracing_subscriber::fmt::init();

    let opts = Opts::parse();
    let clock_cfg = ClockDisplayConfig {
        clock_raw: opts.clock_raw,
        clock_seconds: opts.clock_seconds,
        clock_date: opts.clock_date,
        clock_gmt: opts.clock_gmt,
        clock_offset: opts.clock_offset,
    };

    let mut trace = match Trace::open(&opts.trace_dir) {
        Ok(t) => t,
        Err(e) => {
            error!("{e}");
            return;
        }
    };

    let stream_count = trace.file_streams().len();
    for stream_index in 0..stream_count {
        loop {
            match trace.next_event(stream_index) {
                Ok(Some(event)) => {
                    let ts = event
                        .timestamp
                        .map(|t| clock_cfg.format_timestamp(t))
                        .unwrap_or_else(|| "-".to_string());
                    println!("[{ts}] {} {:#?}", event.name, event.payload);
                }
                Ok(None) => break,
                Err(e) => {
                    error!("{e}");
                    break;
                }
            }
        }
    }
}
