use crate::{
    app::round_controller::RefreshRequest,
    records::GameRecord,
    wager::BetRequest,
};
use anyhow::Context;
use std::future::Future;
use tokio::sync::mpsc;

/// Source of the recent results of the displayed game.
pub trait ResultsSource {
    fn fetch_results(&self) -> impl Future<Output = anyhow::Result<Vec<GameRecord>>> + Send;
}

/// Endpoint accepting wagers.
pub trait BetApi {
    fn place_bet(
        &self,
        request: &BetRequest,
    ) -> impl Future<Output = anyhow::Result<BetReceipt>> + Send;
}

/// Whatever the server answered to an accepted bet. Kept opaque.
#[derive(Debug, Clone, PartialEq)]
pub struct BetReceipt(pub serde_json::Value);

#[derive(Debug)]
pub enum RemoteRequest {
    FetchResults(RefreshRequest),
    PlaceBet(BetRequest),
    Shutdown,
}

#[derive(Debug)]
pub enum RemoteResponse {
    Results {
        request: RefreshRequest,
        outcome: anyhow::Result<Vec<GameRecord>>,
    },
    BetSettled(anyhow::Result<BetReceipt>),
}

/// Serves network calls away from the tick loop so a slow server never
/// stalls the countdown. Requests are handled one at a time, in order.
pub async fn remote_worker<Api>(
    api: Api,
    mut requests: mpsc::UnboundedReceiver<RemoteRequest>,
    responses: mpsc::UnboundedSender<RemoteResponse>,
) -> anyhow::Result<()>
where
    Api: ResultsSource + BetApi,
{
    while let Some(request) = requests.recv().await {
        let response = match request {
            RemoteRequest::FetchResults(refresh) => {
                tracing::debug!(duration = %refresh.duration, reason = ?refresh.reason, "Fetching results");
                RemoteResponse::Results {
                    request: refresh,
                    outcome: api.fetch_results().await,
                }
            }
            RemoteRequest::PlaceBet(bet) => {
                tracing::info!(
                    period = %bet.period_number,
                    amount = bet.amount,
                    bet_value = %bet.bet_value,
                    "Placing bet"
                );
                RemoteResponse::BetSettled(api.place_bet(&bet).await)
            }
            RemoteRequest::Shutdown => break,
        };
        responses
            .send(response)
            .context("remote response channel closed")?;
    }
    Ok(())
}
