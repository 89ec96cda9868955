//! Demonstration consumer for the TWSE feed decoder.
//!
//! Owns argument parsing, signal handling, and pretty-printing, and talks
//! to the library purely through `Config`, `Session`, and `Consumer`.

use std::net::Ipv4Addr;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use structopt::StructOpt;

use twse_feed::config::Multicast;
use twse_feed::record::Body;
use twse_feed::{Config, Consumer, Record, Session};

#[derive(StructOpt, Debug)]
#[structopt(about = "Decodes a live TWSE UDP market-data feed and prints decoded records.")]
struct Opt {
    #[structopt(long, default_value = "10000")]
    port: u16,

    #[structopt(long, requires("iface"))]
    multicast: Option<Ipv4Addr>,

    #[structopt(long)]
    iface: Option<Ipv4Addr>,

    /// Suppress records for any stock other than this one. Space-padded or
    /// truncated to 6 bytes.
    #[structopt(long)]
    stock: Option<String>,

    /// "benchmark" prints only the match time of each record.
    #[structopt(long, default_value = "")]
    mode: String,

    /// Format-code allow-list. Defaults to the decoder's built-in default
    /// ({0x06}) when omitted.
    #[structopt(long = "format-codes")]
    format_codes: Vec<u8>,
}

struct PrintingConsumer {
    benchmark: bool,
}

impl Consumer for PrintingConsumer {
    fn on_record(&self, record: &Record) {
        match &record.body {
            Body::Snapshot(s) if self.benchmark => {
                println!("match_time={}", s.match_time);
            }
            Body::Snapshot(s) => {
                println!(
                    "{} stock={} match_time={} levels={}",
                    chrono::Utc::now().format("%Y-%m-%d %H:%M:%S%.3f_UTC"),
                    s.stock_code_str(),
                    s.match_time,
                    s.levels.len()
                );
            }
            Body::Warrant(w) => {
                println!(
                    "{} warrant brief_name={:?}",
                    chrono::Utc::now().format("%Y-%m-%d %H:%M:%S%.3f_UTC"),
                    String::from_utf8_lossy(&w.brief_name)
                );
            }
        }
    }
}

fn stock_filter_bytes(stock: &str) -> [u8; 6] {
    let mut bytes = [b' '; 6];
    let src = stock.as_bytes();
    let n = src.len().min(6);
    bytes[..n].copy_from_slice(&src[..n]);
    bytes
}

fn main() -> Result<()> {
    env_logger::init();
    let opt = Opt::from_args();

    let multicast = match (opt.multicast, opt.iface) {
        (Some(group), Some(interface)) => Some(Multicast { group, interface }),
        _ => None,
    };

    let mut config = Config {
        port: opt.port,
        multicast,
        ..Config::default()
    };
    if !opt.format_codes.is_empty() {
        config.format_allow_list = opt.format_codes;
    }

    let consumer = PrintingConsumer {
        benchmark: opt.mode == "benchmark",
    };

    let session = Arc::new(Mutex::new(Session::new()));
    {
        let session = Arc::clone(&session);
        ctrlc::set_handler(move || {
            log::info!("received shutdown signal");
            if let Err(e) = session.lock().expect("session lock poisoned").stop() {
                log::error!("error stopping session: {}", e);
            }
        })
        .context("failed to install signal handler")?;
    }

    match opt.stock {
        Some(stock) => {
            let stock_code = stock_filter_bytes(&stock);
            let consumer = twse_feed::consumer::StockFilterConsumer::new(consumer, stock_code);
            session
                .lock()
                .expect("session lock poisoned")
                .start(config, consumer)
                .context("failed to start session")?;
        }
        None => {
            session
                .lock()
                .expect("session lock poisoned")
                .start(config, consumer)
                .context("failed to start session")?;
        }
    }

    while session.lock().expect("session lock poisoned").is_running() {
        std::thread::sleep(std::time::Duration::from_millis(200));
    }

    Ok(())
}
