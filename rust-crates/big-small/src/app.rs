use crate::{
    Error,
    app::{
        bet_flow::BetFlow,
        clock::Clock,
        remote::{
            BetApi,
            RemoteRequest,
            RemoteResponse,
            ResultsSource,
            remote_worker,
        },
        round_controller::{
            RefreshReason,
            RefreshRequest,
            RoundController,
        },
        scheduler::TickScheduler,
        timer_manager::TimerManager,
        timer_storage::TimerStorage,
    },
    config::GameConfig,
    events::{
        GameEvent,
        LOW_TIME_PULSE,
        Notice,
    },
    timer::DurationId,
    wager::{
        Selection,
        StakeEntry,
    },
};
use anyhow::{
    Context,
    anyhow,
};
use std::{
    future::Future,
    path::Path,
    str::FromStr,
};
use tokio::{
    sync::mpsc,
    task::JoinHandle,
};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

pub mod bet_flow;
pub mod clock;
pub mod http_api;
pub mod in_memory_timer_storage;
pub mod local_store;
pub mod remote;
pub mod round_controller;
pub mod scheduler;
pub mod sled_storage;
pub mod timer_manager;
pub mod timer_storage;


#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Continue,
    Exit,
}

/// Player input, in the order it arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    SelectDuration(DurationId),
    Select(Selection),
    EnterStake(u64),
    SetConsent(bool),
    CancelDraft,
    Submit,
    GoToPage(usize),
    NextPage,
    PrevPage,
    Status,
    Quit,
}

impl FromStr for Command {
    type Err = anyhow::Error;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let verb = words
            .next()
            .ok_or_else(|| anyhow!("empty command"))?
            .to_ascii_lowercase();
        let argument = words.next();
        let required = |name: &str| {
            argument.ok_or_else(|| anyhow!("'{verb}' needs a {name}"))
        };
        let command = match verb.as_str() {
            "duration" => {
                let minutes = required("number of minutes")?
                    .parse()
                    .context("duration must be a whole number of minutes")?;
                Command::SelectDuration(DurationId::from_minutes(minutes))
            }
            "pick" => Command::Select(required("selection")?.parse()?),
            "stake" => Command::EnterStake(
                required("amount")?
                    .parse()
                    .context("stake must be a whole amount")?,
            ),
            "agree" => Command::SetConsent(true),
            "disagree" => Command::SetConsent(false),
            "cancel" => Command::CancelDraft,
            "submit" => Command::Submit,
            "page" => Command::GoToPage(
                required("page number")?
                    .parse()
                    .context("page must be a number")?,
            ),
            "next" => Command::NextPage,
            "prev" => Command::PrevPage,
            "status" => Command::Status,
            "quit" | "exit" => Command::Quit,
            other => return Err(anyhow!("unknown command '{other}'")),
        };
        Ok(command)
    }
}

/// Installs a file logger under `data_dir/logs`. Stdout is left to the game.
pub fn init_tracing(data_dir: &Path) -> anyhow::Result<WorkerGuard> {
    let appender = tracing_appender::rolling::daily(data_dir.join("logs"), "big-small.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .try_init()
        .map_err(|e| anyhow!("failed to install tracing subscriber: {e}"))?;
    Ok(guard)
}

pub struct App<Storage, C> {
    config: GameConfig,
    timers: TimerManager<Storage, C>,
    scheduler: TickScheduler,
    rounds: RoundController,
    bets: BetFlow,
    commands: mpsc::UnboundedReceiver<Command>,
    events: mpsc::UnboundedSender<GameEvent>,
    remote_tx: mpsc::UnboundedSender<RemoteRequest>,
    remote_rx: mpsc::UnboundedReceiver<RemoteResponse>,
    remote_handle: Option<JoinHandle<anyhow::Result<()>>>,
    started: bool,
}

impl<Storage, C> App<Storage, C>
where
    Storage: TimerStorage,
    C: Clock,
{
    /// Builds the game and spawns its remote worker. Must be called from
    /// within a tokio runtime.
    pub fn new<Api>(
        config: GameConfig,
        storage: Storage,
        clock: C,
        api: Api,
        commands: mpsc::UnboundedReceiver<Command>,
        events: mpsc::UnboundedSender<GameEvent>,
    ) -> anyhow::Result<Self>
    where
        Api: ResultsSource + BetApi + Send + Sync + 'static,
    {
        config.validate()?;
        let initial = config
            .initial_duration()
            .ok_or_else(|| anyhow!("no durations configured"))?;
        let timers = TimerManager::new(storage, clock, &config.durations);
        let scheduler = TickScheduler::new(config.tick_interval());
        let rounds = RoundController::new(
            initial,
            config.records_per_page,
            config.fallback_record_count,
        );
        let bets = BetFlow::new(config.limits, config.user_id);
        let (remote_tx, requests) = mpsc::unbounded_channel();
        let (responses, remote_rx) = mpsc::unbounded_channel();
        let remote_handle = tokio::spawn(remote_worker(api, requests, responses));
        Ok(Self {
            config,
            timers,
            scheduler,
            rounds,
            bets,
            commands,
            events,
            remote_tx,
            remote_rx,
            remote_handle: Some(remote_handle),
            started: false,
        })
    }

    pub fn timers(&self) -> &TimerManager<Storage, C> {
        &self.timers
    }

    pub fn rounds(&self) -> &RoundController {
        &self.rounds
    }

    pub fn bets(&self) -> &BetFlow {
        &self.bets
    }

    pub fn scheduler(&self) -> &TickScheduler {
        &self.scheduler
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    /// Reconciles every timer, starts the running ones and asks for the first
    /// results. Called by the first `run` if not done before.
    pub fn start(&mut self) {
        if self.started {
            return;
        }
        self.started = true;
        let overview = self.timers.reconcile_all();
        tracing::info!(?overview, "Timers reconciled");
        self.emit(GameEvent::TimerOverview(overview));
        for duration in self.timers.running() {
            self.scheduler.register(duration);
        }
        let request = self.rounds.request_refresh(RefreshReason::Startup);
        self.fetch(request);
        self.raise_storage_alert();
    }

    pub async fn run(
        &mut self,
        interrupt: impl Future<Output = ()>,
    ) -> anyhow::Result<RunState> {
        self.start();
        tokio::select! {
            duration = self.scheduler.next_tick() => {
                self.on_tick(duration);
            }
            command = self.commands.recv() => {
                match command {
                    Some(Command::Quit) | None => {
                        self.shutdown().await?;
                        return Ok(RunState::Exit);
                    }
                    Some(command) => self.handle_command(command),
                }
            }
            response = self.remote_rx.recv() => {
                let response = response.ok_or_else(|| anyhow!("remote worker stopped"))?;
                self.on_remote(response);
            }
            _ = interrupt => {
                self.shutdown().await?;
                return Ok(RunState::Exit);
            }
        }
        Ok(RunState::Continue)
    }

    fn displayed(&self) -> DurationId {
        self.rounds.active_duration()
    }

    fn displayed_remaining(&self) -> u32 {
        let displayed = self.displayed();
        self.timers
            .remaining(displayed)
            .unwrap_or_else(|| displayed.total_seconds())
    }

    fn on_tick(&mut self, duration: DurationId) {
        let Some(tick) = self.timers.tick(duration) else {
            return;
        };
        self.raise_storage_alert();
        if duration != self.displayed() {
            if tick.rolled_over {
                tracing::debug!(%duration, "Background timer rolled over");
            }
            return;
        }

        let remaining = tick.snapshot.remaining_seconds;
        self.emit(GameEvent::Tick {
            duration,
            remaining,
        });
        if tick.rolled_over {
            tracing::info!(%duration, "Round finished");
            self.emit(GameEvent::RolledOver { duration });
            if let Some(request) = self.rounds.on_rollover(duration) {
                self.fetch(request);
            }
        } else if remaining <= self.config.low_time_seconds {
            self.emit(GameEvent::LowTimeWarning {
                duration,
                remaining,
                pulse: LOW_TIME_PULSE,
            });
        }
    }

    fn handle_command(&mut self, command: Command) {
        tracing::debug!(?command, "Handling command");
        match command {
            Command::SelectDuration(duration) => self.select_duration(duration),
            Command::Select(selection) => {
                let remaining = self.displayed_remaining();
                match self.bets.select(selection, remaining) {
                    Ok(()) => {
                        self.emit(GameEvent::DraftChanged(self.bets.draft().clone()));
                        self.emit(GameEvent::Notice(Notice::success(selection.describe())));
                    }
                    Err(rejection) => self.notify_error(&Error::from(rejection)),
                }
            }
            Command::EnterStake(amount) => {
                let entry = self.bets.enter_stake(amount);
                self.emit(GameEvent::StakeEntered(entry));
                match entry {
                    StakeEntry::Accepted(_) => {}
                    StakeEntry::BelowMinimum { min, .. } => self.emit(GameEvent::Notice(
                        Notice::warning(format!("Minimum bet amount is ₹{}", rupees(min))),
                    )),
                    StakeEntry::Clamped { stake, .. } => self.emit(GameEvent::Notice(
                        Notice::warning(format!("Maximum amount is ₹{}", rupees(stake))),
                    )),
                }
                self.emit(GameEvent::DraftChanged(self.bets.draft().clone()));
            }
            Command::SetConsent(consent) => {
                self.bets.set_consent(consent);
                self.emit(GameEvent::DraftChanged(self.bets.draft().clone()));
            }
            Command::CancelDraft => {
                self.bets.cancel();
                self.emit(GameEvent::DraftChanged(self.bets.draft().clone()));
            }
            Command::Submit => {
                let remaining = self.displayed_remaining();
                match self.bets.prepare(remaining, self.rounds.current_round()) {
                    Ok(request) => self.send_remote(RemoteRequest::PlaceBet(request)),
                    Err(rejection) => self.notify_error(&Error::from(rejection)),
                }
            }
            Command::GoToPage(page) => {
                self.rounds.records_mut().go_to(page);
                self.emit_page();
            }
            Command::NextPage => {
                self.rounds.records_mut().next_page();
                self.emit_page();
            }
            Command::PrevPage => {
                self.rounds.records_mut().prev_page();
                self.emit_page();
            }
            Command::Status => {
                self.emit(GameEvent::TimerOverview(self.timers.overview()));
                self.emit(GameEvent::DraftChanged(self.bets.draft().clone()));
                self.emit_page();
            }
            Command::Quit => {}
        }
    }

    fn select_duration(&mut self, duration: DurationId) {
        if !self.config.is_configured(duration) {
            self.emit(GameEvent::Notice(Notice::warning(format!(
                "No {} minute game available",
                duration.minutes()
            ))));
            return;
        }
        let Some(remaining) = self.timers.activate(duration) else {
            return;
        };
        self.raise_storage_alert();
        self.scheduler.register(duration);
        let request = self.rounds.select_duration(duration);
        tracing::info!(%duration, remaining, "Duration selected");
        self.emit(GameEvent::DurationSelected {
            duration,
            remaining,
        });
        self.emit(GameEvent::Notice(Notice::success(format!(
            "Switched to {} minute game",
            duration.minutes()
        ))));
        self.fetch(request);
    }

    fn on_remote(&mut self, response: RemoteResponse) {
        match response {
            RemoteResponse::Results { request, outcome } => {
                if !self.rounds.is_latest(&request) {
                    tracing::debug!(
                        duration = %request.duration,
                        seq = request.seq,
                        "Dropping results superseded by a newer request"
                    );
                    return;
                }
                let update = self.rounds.apply_results(outcome, self.timers.now_millis());
                if let Some(err) = &update.error {
                    self.notify_error(err);
                }
                self.emit(GameEvent::ResultsUpdated {
                    round: update.round,
                    records: update.records,
                    fallback: update.fallback,
                });
                self.emit_page();
            }
            RemoteResponse::BetSettled(outcome) => {
                match self.bets.complete(outcome) {
                    Ok(_) => self.emit(GameEvent::Notice(Notice::success(
                        "Bet placed successfully!",
                    ))),
                    Err(err) => self.notify_error(&err),
                }
                self.emit(GameEvent::DraftChanged(self.bets.draft().clone()));
            }
        }
    }

    fn fetch(&mut self, request: RefreshRequest) {
        self.emit(GameEvent::ResultsLoading);
        self.send_remote(RemoteRequest::FetchResults(request));
    }

    fn send_remote(&self, request: RemoteRequest) {
        if let Err(err) = self.remote_tx.send(request) {
            tracing::error!("Remote worker unavailable, dropping {:?}", err.0);
        }
    }

    fn emit_page(&self) {
        let book = self.rounds.records();
        self.emit(GameEvent::PageChanged {
            page: book.current_page(),
            total_pages: book.total_pages(),
        });
    }

    fn raise_storage_alert(&mut self) {
        if let Some(err) = self.timers.take_storage_alert() {
            self.notify_error(&err);
        }
    }

    fn notify_error(&self, err: &Error) {
        self.emit(GameEvent::Notice(Notice::from(err)));
    }

    fn emit(&self, event: GameEvent) {
        if self.events.send(event).is_err() {
            tracing::debug!("Event receiver dropped");
        }
    }

    async fn shutdown(&mut self) -> anyhow::Result<()> {
        tracing::info!("Stopping timers and remote worker");
        self.scheduler.clear();
        self.send_remote(RemoteRequest::Shutdown);
        if let Some(handle) = self.remote_handle.take() {
            // a hung server call must not hold the process open
            handle.abort();
            match handle.await {
                Ok(result) => result?,
                Err(err) if err.is_cancelled() => {
                    tracing::debug!("Remote worker cancelled with calls in flight");
                }
                Err(err) => return Err(anyhow!(err).context("remote worker panicked")),
            }
        }
        Ok(())
    }
}

/// Groups thousands: 100000 -> "100,000".
fn rupees(amount: u64) -> String {
    let digits = amount.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, digit) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    grouped
}
