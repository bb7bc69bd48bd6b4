use anyhow::{
    Context,
    anyhow,
};
use big_small::{
    app::{
        App,
        Command,
        RunState,
        clock::SystemClock,
        http_api::GameApiClient,
        init_tracing,
        local_store::LocalTimerStore,
        timer_storage::TimerStorage,
    },
    config::GameConfig,
    events::{
        GameEvent,
        NoticeLevel,
    },
    records::RecordBook,
    timer::{
        DurationId,
        format_countdown,
    },
    wager::WagerDraft,
};
use clap::Parser;
use std::{
    env::current_dir,
    fs,
    path::PathBuf,
};
use tokio::{
    io::{
        AsyncBufRead,
        AsyncBufReadExt,
        BufReader,
    },
    sync::mpsc,
};
use url::Url;

const COUNTDOWN_ECHO_SECONDS: u32 = 15;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// JSON game config; missing fields keep their defaults
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(short, long)]
    base_url: Option<Url>,

    #[arg(short, long)]
    user_id: Option<u64>,

    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Duration, in minutes, shown on startup
    #[arg(short, long)]
    duration: Option<u32>,

    /// Keep timers in memory only
    #[arg(long, default_value = "false")]
    in_memory: bool,

    #[arg(short, long, default_value = "false")]
    tracing: bool,
}

async fn handle_interupt() {
    let res = tokio::signal::ctrl_c().await;
    match res {
        Ok(_) => {
            tracing::info!("Received interrupt, exiting");
        }
        Err(_) => {
            tracing::warn!("Received interrupt error, exiting anyway");
        }
    }
}

fn resolve_config(args: &Args) -> anyhow::Result<GameConfig> {
    let mut config = match &args.config {
        Some(path) => GameConfig::load(path)?,
        None => GameConfig::default(),
    };
    if let Some(url) = &args.base_url {
        config.base_url = url.to_string();
    }
    if let Some(user_id) = args.user_id {
        config.user_id = user_id;
    }
    if let Some(minutes) = args.duration {
        let duration = DurationId::from_minutes(minutes);
        let position = config
            .durations
            .iter()
            .position(|configured| *configured == duration)
            .ok_or_else(|| anyhow!("no {minutes} minute game configured"))?;
        config.durations[..=position].rotate_right(1);
    }
    config.validate()?;
    Ok(config)
}

/// Feeds parsed lines to the game. End of input counts as quitting.
async fn read_commands<R>(input: R, commands: mpsc::UnboundedSender<Command>)
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = input.lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) if line.trim().is_empty() => continue,
            Ok(Some(line)) => match line.parse::<Command>() {
                Ok(command) => {
                    if commands.send(command).is_err() {
                        return;
                    }
                }
                Err(err) => println!("! {err:#}"),
            },
            Ok(None) => break,
            Err(err) => {
                tracing::warn!("Failed to read stdin: {err}");
                break;
            }
        }
    }
    if commands.send(Command::Quit).is_err() {
        tracing::debug!("Command receiver dropped before quit");
    }
}

fn render_draft(draft: &WagerDraft) -> String {
    let selection = draft
        .selection
        .map(|selection| selection.describe())
        .unwrap_or_else(|| "Nothing selected".to_string());
    let stake = draft
        .stake
        .map(|stake| format!("₹{stake}"))
        .unwrap_or_else(|| "no stake".to_string());
    let consent = if draft.consent { "agreed" } else { "not agreed" };
    format!("{selection}, {stake}, {consent}")
}

fn render_page(book: &RecordBook) {
    let Some((first, last)) = book.showing() else {
        println!("  (no records)");
        return;
    };
    for record in book.page_records() {
        println!(
            "  {:<16} {}  {:<6} {}",
            record.period, record.number, record.color, record.size
        );
    }
    println!(
        "  showing {first}-{last} of {}, page {} of {} {:?}",
        book.records().len(),
        book.current_page(),
        book.total_pages(),
        book.page_window()
    );
}

fn render<Storage: TimerStorage>(event: GameEvent, app: &App<Storage, SystemClock>) {
    match event {
        GameEvent::TimerOverview(timers) => {
            let line = timers
                .iter()
                .map(|(duration, remaining)| {
                    format!("{duration}: {}", format_countdown(*remaining))
                })
                .collect::<Vec<_>>()
                .join(" | ");
            println!("timers  {line}");
        }
        GameEvent::Tick {
            duration,
            remaining,
        } => {
            let closed = app.bets().limits().betting_closed(remaining);
            if remaining % COUNTDOWN_ECHO_SECONDS == 0 || closed {
                let marker = if closed { "  (betting closed)" } else { "" };
                println!("{duration}  {}{marker}", format_countdown(remaining));
            }
        }
        GameEvent::LowTimeWarning { remaining, .. } => println!("!! {remaining}s left"),
        GameEvent::RolledOver { duration } => println!("{duration} round finished"),
        GameEvent::DurationSelected {
            duration,
            remaining,
        } => println!("now playing {duration}, {} left", format_countdown(remaining)),
        GameEvent::ResultsLoading => println!("loading results..."),
        GameEvent::ResultsUpdated {
            round,
            records,
            fallback,
        } => {
            let source = if fallback { "placeholder" } else { "live" };
            println!("period {round} open ({records} {source} records)");
        }
        GameEvent::PageChanged { .. } => render_page(app.rounds().records()),
        GameEvent::DraftChanged(draft) => println!("bet  {}", render_draft(&draft)),
        GameEvent::StakeEntered(entry) => println!("stake ₹{}", entry.stake()),
        GameEvent::Notice(notice) => {
            let prefix = match notice.level {
                NoticeLevel::Success => "ok",
                NoticeLevel::Warning => "warn",
                NoticeLevel::Error => "error",
            };
            println!("[{prefix}] {}", notice.message);
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let data_dir = match &args.data_dir {
        Some(path) => path.clone(),
        None => current_dir()
            .context("determine process working directory")?
            .join("big_small_data"),
    };
    fs::create_dir_all(&data_dir)
        .with_context(|| format!("create data directory {}", data_dir.display()))?;
    let _log_guard = if args.tracing {
        Some(init_tracing(&data_dir)?)
    } else {
        None
    };
    let config = resolve_config(&args)?;

    let storage = if args.in_memory {
        LocalTimerStore::in_memory()
    } else {
        LocalTimerStore::open_or_in_memory(data_dir.join("timers"))
    };
    if !storage.is_persistent() {
        println!("[warn] timers are kept in memory and reset on restart");
    }
    let api = GameApiClient::new(config.base_url.clone())?;
    tracing::info!("Using game server at {}", api.base_url());

    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let mut app = App::new(config, storage, SystemClock, api, command_rx, event_tx)?;
    tokio::spawn(read_commands(BufReader::new(tokio::io::stdin()), command_tx));

    tracing::info!("Starting big-small");
    loop {
        let interrupt = handle_interupt();
        let state = app.run(interrupt).await?;
        while let Ok(event) = event_rx.try_recv() {
            render(event, &app);
        }
        match state {
            RunState::Continue => continue,
            RunState::Exit => {
                tracing::info!("Exiting big-small");
                return Ok(());
            }
        }
    }
}
