//! Local Tesla Powerwall gateway API.

mod models;

use std::time::Duration;

use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;

pub use self::models::{BatteryPack, GridStatus, MeterAggregates, MeterReading, OperationMode};
use self::models::{
    GridStatusResponse,
    LoginRequest,
    LoginResponse,
    Operation,
    StateOfEnergy,
    SystemStatus,
};
use crate::{error::Error, prelude::*, quantity::Percentage, retry::Retry};

const SERVICE: &str = "gateway";

pub struct Credentials {
    pub email: String,
    pub password: String,
}

pub struct Client {
    inner: reqwest::Client,
    base_url: Url,
    credentials: Credentials,
    retry: Retry,

    /// Session token cached between the poll cycles.
    token: Mutex<Option<String>>,
}

/// What to read besides the always-needed values.
#[derive(Copy, Clone, Default)]
pub struct Extras {
    pub reserve: bool,
    pub batteries: bool,
}

/// Everything read from the gateway during one cycle.
#[must_use]
pub struct Readings {
    pub meters: MeterAggregates,
    pub operation_mode: OperationMode,
    pub grid_status: GridStatus,
    pub state_of_charge: Percentage,
    pub reserve: Option<Percentage>,
    pub batteries: Option<Vec<BatteryPack>>,
}

impl Client {
    /// Create a client for the gateway at `https://{address}/api/`.
    pub fn with_address(address: &str, credentials: Credentials) -> Result<Self> {
        let base_url = Url::parse(&format!("https://{address}/api/"))
            .with_context(|| format!("invalid gateway address `{address}`"))?;
        Self::new(base_url, credentials, Retry::patient())
    }

    pub fn new(base_url: Url, credentials: Credentials, retry: Retry) -> Result<Self> {
        let inner = reqwest::Client::builder()
            .user_agent(concat!("pwmon/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(10))
            .danger_accept_invalid_certs(true) // the gateway only has a self-signed certificate
            .build()?;
        Ok(Self { inner, base_url, credentials, retry, token: Mutex::new(None) })
    }

    /// Read everything needed for one snapshot, retrying transient failures.
    #[instrument(skip_all, fields(base_url = %self.base_url))]
    pub async fn read(&self, extras: Extras) -> Result<Readings, Error> {
        self.retry
            .run(move || async move {
                let session = self.connect().await?;
                match session.read(extras).await {
                    Err(Error::Auth { status, .. }) if session.is_reused => {
                        warn!(%status, "the session has expired, logging in again…");
                        self.connect().await?.read(extras).await
                    }
                    result => result,
                }
            })
            .await
    }

    /// Authenticate, unless there is a cached session token.
    pub async fn connect(&self) -> Result<Session<'_>, Error> {
        let mut cached = self.token.lock().await;
        let (token, is_reused) = match cached.as_ref() {
            Some(token) => (token.clone(), true),
            None => {
                let token = self.login().await?;
                *cached = Some(token.clone());
                (token, false)
            }
        };
        drop(cached);
        Ok(Session { client: self, token, is_reused })
    }

    #[instrument(skip_all)]
    async fn login(&self) -> Result<String, Error> {
        info!("logging in…");
        let request = LoginRequest {
            username: "customer",
            email: &self.credentials.email,
            password: &self.credentials.password,
            force_sm_off: false,
        };
        let response = self
            .inner
            .post(self.url("login/Basic"))
            .json(&request)
            .send()
            .await
            .map_err(|source| Error::Unreachable { service: SERVICE, source })?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::from_status(SERVICE, status));
        }
        let response: LoginResponse = response
            .json()
            .await
            .map_err(|source| Error::MalformedResponse { service: SERVICE, source })?;
        info!("logged in");
        Ok(response.token)
    }

    async fn forget_token(&self) {
        *self.token.lock().await = None;
    }

    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

/// Authenticated gateway session.
pub struct Session<'a> {
    client: &'a Client,
    token: String,
    is_reused: bool,
}

impl Session<'_> {
    pub async fn read(&self, extras: Extras) -> Result<Readings, Error> {
        let meters = self.read_meters().await?;
        let Operation { real_mode: operation_mode, backup_reserve } = self.operation().await?;
        let grid_status = self.grid_status().await?;
        let state_of_charge = self.state_of_charge().await?;
        let reserve = extras.reserve.then_some(backup_reserve);
        let batteries = if extras.batteries { Some(self.batteries().await?) } else { None };
        debug!(?meters, %operation_mode, %grid_status, ?state_of_charge, ?reserve, "read");
        Ok(Readings { meters, operation_mode, grid_status, state_of_charge, reserve, batteries })
    }

    pub async fn read_meters(&self) -> Result<MeterAggregates, Error> {
        self.get("meters/aggregates").await
    }

    pub async fn operation_mode(&self) -> Result<OperationMode, Error> {
        Ok(self.operation().await?.real_mode)
    }

    pub async fn reserve_percentage(&self) -> Result<Percentage, Error> {
        Ok(self.operation().await?.backup_reserve)
    }

    /// Both the operation mode and the backup reserve come from the same endpoint.
    async fn operation(&self) -> Result<Operation, Error> {
        self.get("operation").await
    }

    pub async fn grid_status(&self) -> Result<GridStatus, Error> {
        Ok(self.get::<GridStatusResponse>("system_status/grid_status").await?.grid_status)
    }

    pub async fn state_of_charge(&self) -> Result<Percentage, Error> {
        Ok(self.get::<StateOfEnergy>("system_status/soe").await?.percentage)
    }

    pub async fn batteries(&self) -> Result<Vec<BatteryPack>, Error> {
        Ok(self.get::<SystemStatus>("system_status").await?.battery_blocks)
    }

    #[instrument(skip_all, level = "debug", fields(path = path))]
    async fn get<R: DeserializeOwned>(&self, path: &str) -> Result<R, Error> {
        let response = self
            .client
            .inner
            .get(self.client.url(path))
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|source| Error::Unreachable { service: SERVICE, source })?;
        let status = response.status();
        if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
            self.client.forget_token().await;
        }
        if !status.is_success() {
            return Err(Error::from_status(SERVICE, status));
        }
        response.json().await.map_err(|source| Error::MalformedResponse { service: SERVICE, source })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    };

    use axum::{
        Json,
        Router,
        extract::State,
        http::{HeaderMap, header::AUTHORIZATION},
        response::{IntoResponse, Response},
        routing::{get, post},
    };
    use serde_json::{Value, json};

    use super::*;
    use crate::{quantity::WattHours, testing::serve};

    const TOKEN: &str = "t0k3n";
    const BEARER: &str = "Bearer t0k3n";

    #[derive(Default)]
    struct Gateway {
        n_logins: AtomicUsize,
        n_operation_reads: AtomicUsize,
        expire_next: AtomicBool,
        rate_limited: AtomicBool,
    }

    async fn login(State(gateway): State<Arc<Gateway>>, Json(body): Json<Value>) -> Response {
        if gateway.rate_limited.load(Ordering::SeqCst) {
            return StatusCode::TOO_MANY_REQUESTS.into_response();
        }
        if body["username"] != "customer" || body["password"] != "hunter2" {
            return StatusCode::UNAUTHORIZED.into_response();
        }
        gateway.n_logins.fetch_add(1, Ordering::SeqCst);
        Json(json!({"email": body["email"], "token": TOKEN, "loginTime": "2024-05-03T14:12:31"}))
            .into_response()
    }

    fn authorized(gateway: &Gateway, headers: &HeaderMap, body: Value) -> Response {
        if gateway.expire_next.swap(false, Ordering::SeqCst)
            || headers.get(AUTHORIZATION).and_then(|value| value.to_str().ok()) != Some(BEARER)
        {
            return StatusCode::UNAUTHORIZED.into_response();
        }
        Json(body).into_response()
    }

    fn meter(instant_power: f64) -> Value {
        json!({"instant_power": instant_power, "energy_exported": 1000.5, "energy_imported": 2000.25})
    }

    fn router(gateway: Arc<Gateway>) -> Router {
        Router::new()
            .route("/api/login/Basic", post(login))
            .route(
                "/api/meters/aggregates",
                get(|State(gateway): State<Arc<Gateway>>, headers: HeaderMap| async move {
                    let body = json!({
                        "site": meter(-150.0),
                        "battery": meter(-2000.0),
                        "load": meter(1100.0),
                        "solar": meter(3250.0),
                    });
                    authorized(&gateway, &headers, body)
                }),
            )
            .route(
                "/api/operation",
                get(|State(gateway): State<Arc<Gateway>>, headers: HeaderMap| async move {
                    gateway.n_operation_reads.fetch_add(1, Ordering::SeqCst);
                    let body = json!({"real_mode": "self_consumption", "backup_reserve_percent": 20});
                    authorized(&gateway, &headers, body)
                }),
            )
            .route(
                "/api/system_status/grid_status",
                get(|State(gateway): State<Arc<Gateway>>, headers: HeaderMap| async move {
                    authorized(&gateway, &headers, json!({"grid_status": "SystemGridConnected"}))
                }),
            )
            .route(
                "/api/system_status/soe",
                get(|State(gateway): State<Arc<Gateway>>, headers: HeaderMap| async move {
                    authorized(&gateway, &headers, json!({"percentage": 42.57}))
                }),
            )
            .route(
                "/api/system_status",
                get(|State(gateway): State<Arc<Gateway>>, headers: HeaderMap| async move {
                    let body = json!({
                        "battery_blocks": [
                            {"nominal_energy_remaining": 5000, "nominal_full_pack_energy": 13500},
                            {"nominal_energy_remaining": 6000, "nominal_full_pack_energy": 13600},
                        ],
                    });
                    authorized(&gateway, &headers, body)
                }),
            )
            .with_state(gateway)
    }

    async fn client(gateway: &Arc<Gateway>, password: &str) -> Result<Client> {
        let base_url = serve(router(gateway.clone())).await?.join("api/")?;
        let credentials =
            Credentials { email: "me@example.com".to_owned(), password: password.to_owned() };
        Client::new(base_url, credentials, Retry::new(2, Duration::ZERO..=Duration::ZERO))
    }

    #[tokio::test]
    async fn read_ok() -> Result {
        let gateway = Arc::new(Gateway::default());
        let readings = client(&gateway, "hunter2")
            .await?
            .read(Extras { reserve: true, batteries: true })
            .await?;
        assert_eq!(readings.meters.solar.instant_power.0, 3250.0);
        assert_eq!(readings.meters.load.energy_imported, WattHours(2000.25));
        assert_eq!(readings.operation_mode, OperationMode::SelfConsumption);
        assert_eq!(readings.grid_status, GridStatus::Connected);
        assert_eq!(readings.state_of_charge, Percentage(42.57));
        assert_eq!(readings.reserve, Some(Percentage(20.0)));
        assert_eq!(readings.batteries.map(|packs| packs.len()), Some(2));
        assert_eq!(gateway.n_operation_reads.load(Ordering::SeqCst), 1);
        Ok(())
    }

    #[tokio::test]
    async fn session_ok() -> Result {
        let gateway = Arc::new(Gateway::default());
        let client = client(&gateway, "hunter2").await?;
        let session = client.connect().await?;
        assert_eq!(session.operation_mode().await?, OperationMode::SelfConsumption);
        assert_eq!(session.reserve_percentage().await?, Percentage(20.0));
        assert_eq!(session.batteries().await?[1].capacity, WattHours(13_600.0));
        Ok(())
    }

    #[tokio::test]
    async fn skips_extras() -> Result {
        let gateway = Arc::new(Gateway::default());
        let readings = client(&gateway, "hunter2").await?.read(Extras::default()).await?;
        assert!(readings.reserve.is_none());
        assert!(readings.batteries.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn reuses_session() -> Result {
        let gateway = Arc::new(Gateway::default());
        let client = client(&gateway, "hunter2").await?;
        client.read(Extras::default()).await?;
        client.read(Extras::default()).await?;
        assert_eq!(gateway.n_logins.load(Ordering::SeqCst), 1);
        Ok(())
    }

    #[tokio::test]
    async fn logs_in_again_after_expiry() -> Result {
        let gateway = Arc::new(Gateway::default());
        let client = client(&gateway, "hunter2").await?;
        client.read(Extras::default()).await?;
        gateway.expire_next.store(true, Ordering::SeqCst);
        client.read(Extras::default()).await?;
        assert_eq!(gateway.n_logins.load(Ordering::SeqCst), 2);
        Ok(())
    }

    #[tokio::test]
    async fn wrong_password() -> Result {
        let gateway = Arc::new(Gateway::default());
        let result = client(&gateway, "letmein").await?.read(Extras::default()).await;
        assert!(
            matches!(result, Err(Error::Auth { status: StatusCode::UNAUTHORIZED, .. })),
            "{:?}",
            result.err(),
        );
        Ok(())
    }

    #[tokio::test]
    async fn rate_limited_login() -> Result {
        let gateway = Arc::new(Gateway::default());
        gateway.rate_limited.store(true, Ordering::SeqCst);
        let result = client(&gateway, "hunter2").await?.read(Extras::default()).await;
        assert!(matches!(result, Err(Error::RateLimited { service: SERVICE })));
        Ok(())
    }

    #[tokio::test]
    async fn unreachable() -> Result {
        let credentials = Credentials { email: String::new(), password: String::new() };
        let result = Client::new(
            Url::parse("http://127.0.0.1:1/api/")?,
            credentials,
            Retry::new(1, Duration::ZERO..=Duration::ZERO),
        )?
        .read(Extras::default())
        .await;
        assert!(matches!(result, Err(Error::Unreachable { .. })));
        Ok(())
    }
}
