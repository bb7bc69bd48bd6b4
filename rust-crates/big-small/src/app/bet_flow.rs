use crate::{
    Error,
    app::remote::{
        BetApi,
        BetReceipt,
    },
    records::RoundId,
    wager::{
        BetRequest,
        Rejection,
        Selection,
        StakeEntry,
        WagerDraft,
        WagerLimits,
        validate,
    },
};

/// The wager being composed and, while the server is deciding on it, the
/// request that was sent.
pub struct BetFlow {
    limits: WagerLimits,
    user_id: u64,
    draft: WagerDraft,
    in_flight: Option<BetRequest>,
}

impl BetFlow {
    pub fn new(limits: WagerLimits, user_id: u64) -> Self {
        Self {
            limits,
            user_id,
            draft: WagerDraft::default(),
            in_flight: None,
        }
    }

    pub fn draft(&self) -> &WagerDraft {
        &self.draft
    }

    pub fn limits(&self) -> &WagerLimits {
        &self.limits
    }

    pub fn is_submitting(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Opens a draft on `selection`. Refused once the round is inside its
    /// cutoff; an existing draft is left as it was.
    pub fn select(&mut self, selection: Selection, remaining: u32) -> Result<(), Rejection> {
        if self.limits.betting_closed(remaining) {
            return Err(Rejection::BettingClosed {
                remaining,
                cutoff: self.limits.cutoff_seconds,
            });
        }
        self.draft.selection = Some(selection);
        Ok(())
    }

    pub fn enter_stake(&mut self, requested: u64) -> StakeEntry {
        let entry = self.limits.enter_stake(requested);
        self.draft.stake = Some(entry.stake());
        entry
    }

    pub fn set_consent(&mut self, consent: bool) {
        self.draft.consent = consent;
    }

    pub fn cancel(&mut self) {
        self.draft.clear();
    }

    /// Validates the draft against the round open right now and marks the
    /// resulting request as in flight.
    pub fn prepare(
        &mut self,
        remaining: u32,
        round: Option<&RoundId>,
    ) -> Result<BetRequest, Rejection> {
        if self.in_flight.is_some() {
            return Err(Rejection::SubmissionInFlight);
        }
        let wager = validate(&self.draft, remaining, &self.limits)?;
        let round = round.ok_or(Rejection::RoundPending)?;
        let request = BetRequest::new(&wager, round, self.user_id);
        self.in_flight = Some(request.clone());
        Ok(request)
    }

    /// Settles the in-flight request. Success clears the draft; failure keeps
    /// it so the user can try again.
    pub fn complete(&mut self, outcome: anyhow::Result<BetReceipt>) -> crate::Result<BetReceipt> {
        let request = self.in_flight.take();
        match outcome {
            Ok(receipt) => {
                if let Some(request) = request {
                    tracing::info!(period = %request.period_number, amount = request.amount, "Bet accepted");
                }
                self.draft.clear();
                Ok(receipt)
            }
            Err(err) => {
                tracing::warn!("Bet submission failed: {err:#}");
                Err(Error::SubmitFailed(err))
            }
        }
    }

    /// Prepares, sends and settles in one go.
    pub async fn submit(
        &mut self,
        api: &impl BetApi,
        remaining: u32,
        round: Option<&RoundId>,
    ) -> crate::Result<BetReceipt> {
        let request = self.prepare(remaining, round)?;
        let outcome = api.place_bet(&request).await;
        self.complete(outcome)
    }
}
