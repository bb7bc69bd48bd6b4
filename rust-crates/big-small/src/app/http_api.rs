use crate::{
    app::remote::{
        BetApi,
        BetReceipt,
        ResultsSource,
    },
    records::{
        Color,
        Digit,
        GameRecord,
        Size,
    },
    wager::BetRequest,
};
use anyhow::{
    Context,
    Result,
    anyhow,
};
use serde::Deserialize;

/// HTTP client of the game server.
#[derive(Clone)]
pub struct GameApiClient {
    base_url: String,
    http: reqwest::Client,
}

impl GameApiClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let http = reqwest::Client::builder()
            .build()
            .context("failed to build HTTP client for game server")?;
        Ok(Self { base_url, http })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn recent_results(&self) -> Result<Vec<GameRecord>> {
        let url = format!("{}/color/results", self.base_url);
        let res = self
            .http
            .get(url)
            .send()
            .await
            .context("results request failed")?;
        let status = res.status();
        let bytes = res
            .bytes()
            .await
            .context("failed to read results response body")?;
        if !status.is_success() {
            let body = String::from_utf8_lossy(&bytes);
            return Err(anyhow!(
                "game server responded with {status} when fetching results: {body}"
            ));
        }
        let payload: ResultsPayload =
            serde_json::from_slice(&bytes).context("invalid results payload")?;
        Ok(payload
            .into_rows()
            .into_iter()
            .filter_map(|row| match GameRecord::try_from(row) {
                Ok(record) => Some(record),
                Err(err) => {
                    tracing::warn!("Skipping result row: {err:#}");
                    None
                }
            })
            .collect())
    }

    pub async fn submit_bet(&self, request: &BetRequest) -> Result<BetReceipt> {
        let url = format!("{}/place-bet", self.base_url);
        let res = self
            .http
            .post(url)
            .json(request)
            .send()
            .await
            .context("place-bet request failed")?;
        let status = res.status();
        if !status.is_success() {
            let body = res
                .text()
                .await
                .unwrap_or_else(|_| "<unavailable body>".to_string());
            return Err(anyhow!(
                "game server responded with {status} when placing bet: {body}"
            ));
        }
        let bytes = res
            .bytes()
            .await
            .context("failed to read place-bet response body")?;
        let value = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
        Ok(BetReceipt(value))
    }
}

impl ResultsSource for GameApiClient {
    async fn fetch_results(&self) -> Result<Vec<GameRecord>> {
        self.recent_results().await
    }
}

impl BetApi for GameApiClient {
    async fn place_bet(&self, request: &BetRequest) -> Result<BetReceipt> {
        self.submit_bet(request).await
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ResultsPayload {
    Rows(Vec<ResultRowDto>),
    Wrapped { data: Vec<ResultRowDto> },
}

impl ResultsPayload {
    fn into_rows(self) -> Vec<ResultRowDto> {
        match self {
            ResultsPayload::Rows(rows) | ResultsPayload::Wrapped { data: rows } => rows,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PeriodDto {
    Text(String),
    Number(u64),
}

#[derive(Debug, Deserialize)]
struct ResultRowDto {
    period: PeriodDto,
    number: i64,
    #[serde(default)]
    color: String,
    #[serde(default)]
    small_big: String,
}

impl TryFrom<ResultRowDto> for GameRecord {
    type Error = anyhow::Error;

    fn try_from(row: ResultRowDto) -> Result<Self> {
        let period = match row.period {
            PeriodDto::Text(text) => text,
            PeriodDto::Number(number) => number.to_string(),
        };
        let number = u8::try_from(row.number)
            .ok()
            .and_then(Digit::new)
            .ok_or_else(|| anyhow!("period {period} has invalid number {}", row.number))?;
        // labels the feed gets wrong or leaves out are derived from the number
        let color = row
            .color
            .parse()
            .unwrap_or_else(|_| Color::for_number(number));
        let size = row
            .small_big
            .parse()
            .unwrap_or_else(|_| Size::for_number(number));
        Ok(GameRecord {
            period,
            number,
            color,
            size,
        })
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use crate::{
        records::RoundId,
        wager::{
            Selection,
            Wager,
        },
    };
    use actix_web::{
        App as ActixApp,
        HttpResponse,
        HttpServer,
        dev::ServerHandle,
        web,
    };
    use std::{
        net::TcpListener,
        sync::{
            Arc,
            Mutex,
        },
    };

    #[derive(Clone, Default)]
    struct FakeState {
        results: Arc<Mutex<serde_json::Value>>,
        reject_bets: bool,
        received: Arc<Mutex<Vec<serde_json::Value>>>,
    }

    struct FakeGameServer {
        base_url: String,
        handle: ServerHandle,
        thread: Option<std::thread::JoinHandle<()>>,
    }

    impl FakeGameServer {
        fn start(state: FakeState) -> Self {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            let base_url = format!("http://{}", listener.local_addr().unwrap());
            let server = HttpServer::new(move || {
                ActixApp::new()
                    .app_data(web::Data::new(state.clone()))
                    .route("/color/results", web::get().to(results))
                    .route("/place-bet", web::post().to(place_bet))
            })
            .workers(1)
            .shutdown_timeout(1)
            .listen(listener)
            .unwrap()
            .run();
            let handle = server.handle();
            let thread = std::thread::spawn(move || {
                let sys = actix_web::rt::System::new();
                let _ = sys.block_on(server);
            });
            Self {
                base_url,
                handle,
                thread: Some(thread),
            }
        }

        async fn stop(mut self) {
            self.handle.stop(false).await;
            if let Some(thread) = self.thread.take() {
                let _ = thread.join();
            }
        }
    }

    async fn results(state: web::Data<FakeState>) -> HttpResponse {
        let body = state.results.lock().unwrap().clone();
        if body.is_null() {
            HttpResponse::ServiceUnavailable().body("maintenance")
        } else {
            HttpResponse::Ok().json(body)
        }
    }

    async fn place_bet(
        state: web::Data<FakeState>,
        body: web::Json<serde_json::Value>,
    ) -> HttpResponse {
        state.received.lock().unwrap().push(body.into_inner());
        if state.reject_bets {
            HttpResponse::BadRequest().body("period closed")
        } else {
            HttpResponse::Ok().json(serde_json::json!({ "success": true, "betId": 77 }))
        }
    }

    fn bet_request() -> BetRequest {
        let wager = Wager {
            selection: "big".parse::<Selection>().unwrap(),
            stake: 500,
        };
        BetRequest::new(&wager, &RoundId::new("20261019010008"), 13)
    }

    #[tokio::test]
    async fn recent_results__parses_rows_and_derives_missing_labels() {
        // given
        let state = FakeState::default();
        *state.results.lock().unwrap() = serde_json::json!([
            { "period": "20261019010007", "number": 3, "color": "red", "small_big": "Small" },
            { "period": 20261019010006u64, "number": 0, "color": "red,violet", "small_big": "" },
            { "period": "20261019010005", "number": 12, "color": "green", "small_big": "Big" }
        ]);
        let server = FakeGameServer::start(state);
        let client = GameApiClient::new(format!("{}/", server.base_url)).unwrap();

        // when
        let records = client.fetch_results().await;
        server.stop().await;

        // then
        let records = records.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].period, "20261019010007");
        assert_eq!(records[0].color, Color::Red);
        assert_eq!(records[0].size, Size::Small);
        assert_eq!(records[1].period, "20261019010006");
        assert_eq!(records[1].color, Color::Red);
        assert_eq!(records[1].size, Size::Small);
    }

    #[tokio::test]
    async fn recent_results__when_server_errors_then_body_is_reported() {
        // given
        let server = FakeGameServer::start(FakeState::default());
        let client = GameApiClient::new(server.base_url.clone()).unwrap();

        // when
        let result = client.fetch_results().await;
        server.stop().await;

        // then
        let err = result.unwrap_err();
        assert!(format!("{err:#}").contains("maintenance"));
    }

    #[tokio::test]
    async fn place_bet__posts_camel_case_payload() {
        // given
        let state = FakeState::default();
        let received = state.received.clone();
        let server = FakeGameServer::start(state);
        let client = GameApiClient::new(server.base_url.clone()).unwrap();

        // when
        let receipt = client.place_bet(&bet_request()).await;
        server.stop().await;

        // then
        assert_eq!(
            receipt.unwrap(),
            BetReceipt(serde_json::json!({ "success": true, "betId": 77 }))
        );
        let received = received.lock().unwrap();
        assert_eq!(
            received.as_slice(),
            &[serde_json::json!({
                "userId": 13,
                "betType": "size",
                "betValue": "big",
                "amount": 500,
                "periodNumber": "20261019010008"
            })]
        );
    }

    #[tokio::test]
    async fn place_bet__when_rejected_then_fails_with_status_and_body() {
        // given
        let state = FakeState {
            reject_bets: true,
            ..Default::default()
        };
        let server = FakeGameServer::start(state);
        let client = GameApiClient::new(server.base_url.clone()).unwrap();

        // when
        let result = client.place_bet(&bet_request()).await;
        server.stop().await;

        // then
        let message = format!("{:#}", result.unwrap_err());
        assert!(message.contains("400"));
        assert!(message.contains("period closed"));
    }
}
