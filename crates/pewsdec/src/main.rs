use std::sync::Arc;

use anyhow::anyhow;
use clap::Parser;
use log::{info, warn, LevelFilter};

use pews::{Feed, FeedClock, Fetch, Station, TimeSource};

mod app;
mod cli;
mod http;
mod poller;
mod spawner;

use cli::{Args, CliError};
use http::HttpFetcher;
use poller::Poller;

fn main() {
    match pewsdec() {
        Ok(()) => {}
        Err(cli_error) => cli_error.exit(),
    }
}

fn pewsdec() -> Result<(), CliError> {
    // Parse options and start logging
    let args = Args::try_parse()?;
    log_setup(&args);

    // clock, with replay if requested
    let clock = Arc::new(FeedClock::new());
    if let Some(simulation) = args.simulation() {
        warn!("simulation (--simulate) mode: the following messages are NOT LIVE!");
        clock.arm(simulation);
    }

    let fetcher = HttpFetcher::new(args.timeout())?;
    let mut feed = Feed::new(fetcher, clock).with_base_url(args.base_url.as_str());
    info!("polling {} every {:?}", feed.base_url(), args.interval());

    if args.list_stations {
        return list_stations(&args, &mut feed);
    }

    let mut poller = Poller::new(feed, args.interval(), args.once.then_some(1));
    app::run(&args, &mut poller);

    Ok(())
}

fn log_setup(args: &Args) {
    if args.quiet {
        // no logging
        return;
    } else if std::env::var_os("RUST_LOG").is_none() {
        // parameter controls
        let log_filter = match args.verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        };

        pretty_env_logger::formatted_builder()
            .filter_module("pews", log_filter)
            .filter_module("pewsdec", log_filter)
            .init();
    } else {
        // environment controls
        pretty_env_logger::init();
    }
}

// print the station list, one station per line
fn list_stations<F, T>(args: &Args, feed: &mut Feed<F, T>) -> Result<(), CliError>
where
    F: Fetch,
    F::Error: Send + Sync,
    T: TimeSource,
{
    let stations: Vec<Station> = feed.station_list().map_err(anyhow::Error::new)?;
    if stations.is_empty() {
        return Err(anyhow!("no station list is available from {}", feed.base_url()).into());
    }

    for station in &stations {
        if args.json {
            let json = serde_json::to_string(station).map_err(anyhow::Error::new)?;
            println!("{}", json);
        } else {
            println!(
                "{:.2}\t{:.2}",
                station.latitude_deg(),
                station.longitude_deg()
            );
        }
    }

    Ok(())
}
