use serde::{
    Deserialize,
    Serialize,
};
use std::{
    fmt,
    str::FromStr,
};

use crate::records::{
    Color,
    Digit,
    RoundId,
    Size,
};

pub const MIN_STAKE: u64 = 10;
pub const MAX_STAKE: u64 = 100_000;
pub const CUTOFF_SECONDS: u32 = 10;

/// What a wager is placed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Selection {
    Digit(Digit),
    Color(Color),
    Size(Size),
}

impl Selection {
    pub fn bet_type(self) -> BetType {
        match self {
            Selection::Digit(_) => BetType::Number,
            Selection::Color(_) => BetType::Color,
            Selection::Size(_) => BetType::Size,
        }
    }

    pub fn bet_value(self) -> String {
        match self {
            Selection::Digit(digit) => digit.to_string(),
            Selection::Color(color) => color.tag().to_string(),
            Selection::Size(size) => size.tag().to_string(),
        }
    }

    /// Popup heading, e.g. "Number 5 Selected" or "Big Selected".
    pub fn describe(self) -> String {
        match self {
            Selection::Digit(digit) => format!("Number {digit} Selected"),
            Selection::Color(color) => format!("{color} Selected"),
            Selection::Size(size) => format!("{size} Selected"),
        }
    }
}

impl FromStr for Selection {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();
        if let Ok(value) = raw.parse::<u8>() {
            return Digit::new(value)
                .map(Selection::Digit)
                .ok_or_else(|| anyhow::anyhow!("number must be between 0 and 9"));
        }
        if let Ok(size) = raw.parse::<Size>() {
            return Ok(Selection::Size(size));
        }
        match raw.to_ascii_lowercase().as_str() {
            "red" => Ok(Selection::Color(Color::Red)),
            "green" => Ok(Selection::Color(Color::Green)),
            "violet" => Ok(Selection::Color(Color::Violet)),
            _ => Err(anyhow::anyhow!("unknown selection '{raw}'")),
        }
    }
}

impl fmt::Display for Selection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selection::Digit(digit) => write!(f, "{digit}"),
            Selection::Color(color) => write!(f, "{color}"),
            Selection::Size(size) => write!(f, "{size}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BetType {
    Number,
    Color,
    Size,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WagerLimits {
    pub min_stake: u64,
    pub max_stake: u64,
    pub cutoff_seconds: u32,
}

impl Default for WagerLimits {
    fn default() -> Self {
        Self {
            min_stake: MIN_STAKE,
            max_stake: MAX_STAKE,
            cutoff_seconds: CUTOFF_SECONDS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StakeEntry {
    Accepted(u64),
    /// Kept in the draft, but submit stays disabled until it is raised.
    BelowMinimum { stake: u64, min: u64 },
    /// Entered above the maximum and lowered to it.
    Clamped { requested: u64, stake: u64 },
}

impl WagerLimits {
    /// Selection and submission are refused in the trailing window of a round.
    pub fn betting_closed(&self, remaining_seconds: u32) -> bool {
        remaining_seconds < self.cutoff_seconds
    }

    pub fn enter_stake(&self, requested: u64) -> StakeEntry {
        if requested > self.max_stake {
            StakeEntry::Clamped {
                requested,
                stake: self.max_stake,
            }
        } else if requested < self.min_stake {
            StakeEntry::BelowMinimum {
                stake: requested,
                min: self.min_stake,
            }
        } else {
            StakeEntry::Accepted(requested)
        }
    }
}

impl StakeEntry {
    pub fn stake(self) -> u64 {
        match self {
            StakeEntry::Accepted(stake)
            | StakeEntry::BelowMinimum { stake, .. }
            | StakeEntry::Clamped { stake, .. } => stake,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WagerDraft {
    pub selection: Option<Selection>,
    pub stake: Option<u64>,
    pub consent: bool,
}

impl WagerDraft {
    pub fn clear(&mut self) {
        *self = WagerDraft::default();
    }

    pub fn is_open(&self) -> bool {
        self.selection.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum Rejection {
    #[error("nothing selected")]
    NoSelection,
    #[error("no stake entered")]
    NoStake,
    #[error("minimum bet amount is {min}, got {stake}")]
    StakeBelowMinimum { stake: u64, min: u64 },
    #[error("maximum bet amount is {max}, got {stake}")]
    StakeAboveMaximum { stake: u64, max: u64 },
    #[error("terms must be accepted")]
    ConsentMissing,
    #[error("betting closed with {remaining}s left (cutoff {cutoff}s)")]
    BettingClosed { remaining: u32, cutoff: u32 },
    #[error("current round is not known yet")]
    RoundPending,
    #[error("a bet is already being submitted")]
    SubmissionInFlight,
}

/// A draft that passed validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Wager {
    pub selection: Selection,
    pub stake: u64,
}

pub fn validate(
    draft: &WagerDraft,
    remaining_seconds: u32,
    limits: &WagerLimits,
) -> Result<Wager, Rejection> {
    let selection = draft.selection.ok_or(Rejection::NoSelection)?;
    let stake = draft.stake.ok_or(Rejection::NoStake)?;
    if stake < limits.min_stake {
        return Err(Rejection::StakeBelowMinimum {
            stake,
            min: limits.min_stake,
        });
    }
    if stake > limits.max_stake {
        return Err(Rejection::StakeAboveMaximum {
            stake,
            max: limits.max_stake,
        });
    }
    if !draft.consent {
        return Err(Rejection::ConsentMissing);
    }
    if limits.betting_closed(remaining_seconds) {
        return Err(Rejection::BettingClosed {
            remaining: remaining_seconds,
            cutoff: limits.cutoff_seconds,
        });
    }
    Ok(Wager { selection, stake })
}

/// Body of the place-bet call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BetRequest {
    pub user_id: u64,
    pub bet_type: BetType,
    pub bet_value: String,
    pub amount: u64,
    pub period_number: String,
}

impl BetRequest {
    pub fn new(wager: &Wager, round: &RoundId, user_id: u64) -> Self {
        Self {
            user_id,
            bet_type: wager.selection.bet_type(),
            bet_value: wager.selection.bet_value(),
            amount: wager.stake,
            period_number: round.as_str().to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;

    fn draft(selection: Selection, stake: u64) -> WagerDraft {
        WagerDraft {
            selection: Some(selection),
            stake: Some(stake),
            consent: true,
        }
    }

    fn big() -> Selection {
        Selection::Size(Size::Big)
    }

    #[test]
    fn validate__stake_bounds_are_inclusive() {
        let limits = WagerLimits::default();

        assert_eq!(
            validate(&draft(big(), 9), 45, &limits),
            Err(Rejection::StakeBelowMinimum { stake: 9, min: 10 })
        );
        assert!(validate(&draft(big(), 10), 45, &limits).is_ok());
        assert!(validate(&draft(big(), 100_000), 45, &limits).is_ok());
        assert_eq!(
            validate(&draft(big(), 100_001), 45, &limits),
            Err(Rejection::StakeAboveMaximum {
                stake: 100_001,
                max: 100_000
            })
        );
    }

    #[test]
    fn validate__when_inside_cutoff_then_rejected() {
        // given
        let limits = WagerLimits::default();

        // when
        let at_nine = validate(&draft(big(), 500), 9, &limits);
        let at_ten = validate(&draft(big(), 500), 10, &limits);

        // then
        assert_eq!(
            at_nine,
            Err(Rejection::BettingClosed {
                remaining: 9,
                cutoff: 10
            })
        );
        assert!(at_ten.is_ok());
    }

    #[test]
    fn validate__requires_selection_stake_and_consent() {
        let limits = WagerLimits::default();
        let mut d = WagerDraft::default();
        assert_eq!(validate(&d, 45, &limits), Err(Rejection::NoSelection));

        d.selection = Some(big());
        assert_eq!(validate(&d, 45, &limits), Err(Rejection::NoStake));

        d.stake = Some(500);
        assert_eq!(validate(&d, 45, &limits), Err(Rejection::ConsentMissing));

        d.consent = true;
        assert_eq!(
            validate(&d, 45, &limits),
            Ok(Wager {
                selection: big(),
                stake: 500
            })
        );
    }

    #[test]
    fn enter_stake__clamps_above_maximum() {
        let limits = WagerLimits::default();

        assert_eq!(limits.enter_stake(500), StakeEntry::Accepted(500));
        assert_eq!(
            limits.enter_stake(9),
            StakeEntry::BelowMinimum { stake: 9, min: 10 }
        );
        assert_eq!(
            limits.enter_stake(100_001),
            StakeEntry::Clamped {
                requested: 100_001,
                stake: 100_000
            }
        );
    }

    #[test]
    fn bet_request__maps_each_selection_kind() {
        // given
        let round = RoundId::new("20261019010042");
        let cases = [
            (Selection::Digit(Digit::new(7).unwrap()), BetType::Number, "7"),
            (Selection::Color(Color::Violet), BetType::Color, "violet"),
            (Selection::Size(Size::Small), BetType::Size, "small"),
        ];

        for (selection, bet_type, bet_value) in cases {
            // when
            let request = BetRequest::new(&Wager { selection, stake: 50 }, &round, 13);

            // then
            assert_eq!(request.bet_type, bet_type);
            assert_eq!(request.bet_value, bet_value);
            assert_eq!(request.amount, 50);
            assert_eq!(request.period_number, "20261019010042");
            assert_eq!(request.user_id, 13);
        }
    }

    #[test]
    fn bet_request__serializes_camel_case_payload() {
        // given
        let request = BetRequest::new(
            &Wager {
                selection: big(),
                stake: 500,
            },
            &RoundId::new("42"),
            13,
        );

        // when
        let json = serde_json::to_value(&request).unwrap();

        // then
        assert_eq!(
            json,
            serde_json::json!({
                "userId": 13,
                "betType": "size",
                "betValue": "big",
                "amount": 500,
                "periodNumber": "42",
            })
        );
    }

    #[test]
    fn selection__parses_user_input() {
        assert_eq!(
            "5".parse::<Selection>().unwrap(),
            Selection::Digit(Digit::new(5).unwrap())
        );
        assert_eq!("Big".parse::<Selection>().unwrap(), big());
        assert_eq!(
            "RED".parse::<Selection>().unwrap(),
            Selection::Color(Color::Red)
        );
        assert!("12".parse::<Selection>().is_err());
        assert!("blue".parse::<Selection>().is_err());
    }

    #[test]
    fn selection__describe_matches_popup_heading() {
        assert_eq!(
            Selection::Digit(Digit::new(5).unwrap()).describe(),
            "Number 5 Selected"
        );
        assert_eq!(big().describe(), "Big Selected");
    }
}
