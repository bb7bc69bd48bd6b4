use crate::{
    Error,
    records::{
        GameRecord,
        RecordBook,
        RoundId,
        placeholder_records,
    },
    timer::DurationId,
};
use rand::{
    Rng,
    SeedableRng,
    rngs::StdRng,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshReason {
    Startup,
    DurationSelected,
    Rollover,
}

/// A results fetch the controller wants done for the active duration.
/// `seq` grows with every request; only the newest one is applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshRequest {
    pub duration: DurationId,
    pub reason: RefreshReason,
    pub seq: u64,
}

#[derive(Debug)]
pub struct RoundUpdate {
    pub round: RoundId,
    pub records: usize,
    /// Records are placeholders, not real results.
    pub fallback: bool,
    pub error: Option<Error>,
}

/// Tracks which duration is on screen, the round currently open for it and
/// the results history shown beneath it.
pub struct RoundController<R = StdRng> {
    active: DurationId,
    current_round: Option<RoundId>,
    book: RecordBook,
    loading: bool,
    last_request: u64,
    fallback_record_count: usize,
    rng: R,
}

impl RoundController<StdRng> {
    pub fn new(active: DurationId, records_per_page: usize, fallback_record_count: usize) -> Self {
        Self::with_rng(
            active,
            records_per_page,
            fallback_record_count,
            StdRng::from_os_rng(),
        )
    }
}

impl<R: Rng> RoundController<R> {
    pub fn with_rng(
        active: DurationId,
        records_per_page: usize,
        fallback_record_count: usize,
        rng: R,
    ) -> Self {
        Self {
            active,
            current_round: None,
            book: RecordBook::new(records_per_page),
            loading: false,
            last_request: 0,
            fallback_record_count,
            rng,
        }
    }

    pub fn active_duration(&self) -> DurationId {
        self.active
    }

    pub fn current_round(&self) -> Option<&RoundId> {
        self.current_round.as_ref()
    }

    pub fn records(&self) -> &RecordBook {
        &self.book
    }

    pub fn records_mut(&mut self) -> &mut RecordBook {
        &mut self.book
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn request_refresh(&mut self, reason: RefreshReason) -> RefreshRequest {
        self.loading = true;
        self.last_request += 1;
        RefreshRequest {
            duration: self.active,
            reason,
            seq: self.last_request,
        }
    }

    /// Responses to anything but the newest request are stale.
    pub fn is_latest(&self, request: &RefreshRequest) -> bool {
        request.seq == self.last_request
    }

    /// Switches the displayed duration. The round id of the previous one no
    /// longer applies, so bets stay blocked until the refresh lands.
    pub fn select_duration(&mut self, duration: DurationId) -> RefreshRequest {
        if duration != self.active {
            self.current_round = None;
        }
        self.active = duration;
        self.request_refresh(RefreshReason::DurationSelected)
    }

    /// Only a rollover of the displayed duration opens a new round here;
    /// background durations keep cycling silently. The closed round is
    /// forgotten at once so no bet can target it while the refresh is out.
    pub fn on_rollover(&mut self, duration: DurationId) -> Option<RefreshRequest> {
        if duration != self.active {
            return None;
        }
        self.current_round = None;
        Some(self.request_refresh(RefreshReason::Rollover))
    }

    pub fn apply_results(
        &mut self,
        outcome: anyhow::Result<Vec<GameRecord>>,
        now_millis: i64,
    ) -> RoundUpdate {
        self.loading = false;
        let (records, error) = match outcome {
            Ok(records) => (records, None),
            Err(err) => {
                tracing::error!(duration = %self.active, "Failed to fetch results: {err:#}");
                (Vec::new(), Some(Error::FetchFailed(err)))
            }
        };

        let (round, records, fallback) = match records.first() {
            Some(latest) => (RoundId::following(&latest.period), records, false),
            None => {
                let round = RoundId::fallback(self.active, now_millis);
                let placeholders =
                    placeholder_records(&round, self.fallback_record_count, &mut self.rng);
                (round, placeholders, true)
            }
        };

        let count = records.len();
        self.book.replace(records);
        self.current_round = Some(round.clone());
        tracing::info!(duration = %self.active, %round, records = count, fallback, "Round updated");
        RoundUpdate {
            round,
            records: count,
            fallback,
            error,
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use crate::{
        app::bet_flow::BetFlow,
        records::{
            Color,
            Digit,
            Size,
        },
        wager::{
            Rejection,
            Selection,
            WagerLimits,
        },
    };
    use anyhow::anyhow;

    const ONE: DurationId = DurationId::from_minutes(1);
    const THREE: DurationId = DurationId::from_minutes(3);
    // 2026-10-19T00:07:30Z
    const NOW: i64 = 1_792_368_450_000;

    fn sut() -> RoundController<StdRng> {
        RoundController::with_rng(ONE, 5, 20, StdRng::seed_from_u64(7))
    }

    fn record(period: &str, number: u8) -> GameRecord {
        let digit = Digit::new(number).unwrap();
        GameRecord {
            period: period.to_string(),
            number: digit,
            color: Color::for_number(digit),
            size: Size::for_number(digit),
        }
    }

    #[test]
    fn apply_results__when_feed_has_records_then_next_round_follows_latest() {
        // given
        let mut sut = sut();
        sut.request_refresh(RefreshReason::Startup);
        assert!(sut.is_loading());

        // when
        let update = sut.apply_results(
            Ok(vec![record("20261019010007", 3), record("20261019010006", 8)]),
            NOW,
        );

        // then
        assert_eq!(update.round, RoundId::new("20261019010008"));
        assert!(!update.fallback);
        assert!(update.error.is_none());
        assert_eq!(sut.current_round(), Some(&RoundId::new("20261019010008")));
        assert_eq!(sut.records().records().len(), 2);
        assert!(!sut.is_loading());
    }

    #[test]
    fn apply_results__when_fetch_fails_then_fills_with_placeholders() {
        // given
        let mut sut = sut();

        // when
        let update = sut.apply_results(Err(anyhow!("connection refused")), NOW);

        // then
        assert!(update.fallback);
        assert!(matches!(update.error, Some(Error::FetchFailed(_))));
        assert_eq!(update.round, RoundId::new("20261019010008"));
        assert_eq!(update.records, 20);
        let first = &sut.records().records()[0];
        assert_eq!(first.period, "20261019010007");
        assert_eq!(first.color, Color::for_number(first.number));
    }

    #[test]
    fn apply_results__when_feed_is_empty_then_falls_back_without_error() {
        // given
        let mut sut = sut();

        // when
        let update = sut.apply_results(Ok(Vec::new()), NOW);

        // then
        assert!(update.fallback);
        assert!(update.error.is_none());
        assert_eq!(sut.records().total_pages(), 4);
    }

    #[test]
    fn select_duration__when_switching_then_round_is_forgotten_until_refresh() {
        // given
        let mut sut = sut();
        sut.apply_results(Ok(vec![record("100", 1)]), NOW);

        // when
        let request = sut.select_duration(THREE);

        // then
        assert_eq!(request.duration, THREE);
        assert_eq!(request.reason, RefreshReason::DurationSelected);
        assert!(sut.is_latest(&request));
        assert!(sut.current_round().is_none());
        assert_eq!(sut.active_duration(), THREE);
    }

    #[test]
    fn on_rollover__only_the_displayed_duration_requests_a_refresh() {
        // given
        let mut sut = sut();

        // when
        let background = sut.on_rollover(THREE);
        let displayed = sut.on_rollover(ONE);

        // then
        assert!(background.is_none());
        assert_eq!(displayed.map(|r| r.reason), Some(RefreshReason::Rollover));
    }

    #[test]
    fn on_rollover__when_displayed_round_closes_then_it_is_forgotten_until_refresh() {
        // given
        let mut sut = sut();
        sut.apply_results(Ok(vec![record("20261019010007", 3)]), NOW);
        let mut bets = BetFlow::new(WagerLimits::default(), 13);
        bets.select(Selection::Size(Size::Big), 60).unwrap();
        bets.enter_stake(500);
        bets.set_consent(true);

        // when
        sut.on_rollover(ONE);
        let submitted = bets.prepare(60, sut.current_round());

        // then
        assert!(sut.current_round().is_none());
        assert_eq!(submitted, Err(Rejection::RoundPending));
    }

    #[test]
    fn is_latest__when_a_newer_request_was_issued_then_older_ones_are_stale() {
        // given
        let mut sut = sut();
        let startup = sut.request_refresh(RefreshReason::Startup);

        // when
        let to_three = sut.select_duration(THREE);
        let back_to_one = sut.select_duration(ONE);

        // then
        assert_eq!(startup.duration, back_to_one.duration);
        assert!(!sut.is_latest(&startup));
        assert!(!sut.is_latest(&to_three));
        assert!(sut.is_latest(&back_to_one));
    }
}
