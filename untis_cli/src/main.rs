use std::{env::current_dir, fs::write, path::PathBuf};

use anyhow::Result;
use chrono::{NaiveDate, Utc};
use clap::Parser;
use tracing_subscriber::EnvFilter;
use untis_core::{reconcile_and_serialize, Config, DateWindow, FeedSettings, WebUntisClient};

/// Write the WebUntis timetable to an iCalendar file.
#[derive(Debug, Parser)]
pub struct Arguments {
    /// how many weeks to include, starting with the current one
    #[arg(long)]
    pub weeks: Option<u32>,
    /// first date to include, together with --end
    #[arg(long, requires = "end")]
    pub start: Option<NaiveDate>,
    /// first date not to include, together with --start
    #[arg(long, requires = "start")]
    pub end: Option<NaiveDate>,
    /// class whose timetable is merged into the personal one
    #[arg(long)]
    pub klasse: Option<String>,
    /// where to write the calendar, defaults to calendar.ics in the current directory
    #[arg(long, short)]
    pub output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .init();

    let args = Arguments::parse();
    let config = Config::from_env()?;
    let settings = FeedSettings::from(&config);
    let today = Utc::now().with_timezone(&config.timezone).date_naive();
    let window = DateWindow::resolve(today, args.start, args.end, args.weeks)?;

    let client = WebUntisClient::new(config.untis);
    let session = client.login().await?;
    let result = reconcile_and_serialize(
        &session,
        &settings,
        window,
        args.klasse.as_deref(),
        Utc::now(),
    )
    .await;
    session.logout().await;
    let calendar = result?;

    let path = match args.output {
        Some(path) => path,
        None => {
            let mut path = current_dir()?;
            path.push("calendar.ics");
            path
        }
    };
    write(path, calendar)?;
    Ok(())
}
