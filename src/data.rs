//! The data object callers hold for one stop/route pair.
//!
//! [`BizkaibusData`] runs the whole pipeline (transport, envelope decode,
//! XML extraction, time normalization) and keeps the latest [`ResultSet`].
//! Any failure, and an empty match, leaves the single "n/a" sentinel in
//! place. The returned [`Outcome`] still tells the two apart.

use std::sync::{PoisonError, RwLock};

use chrono::NaiveDateTime;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::arrival::{ArrivalRecord, ResultSet, StopRoute};
use crate::config::Settings;
use crate::due::{Clock, TimeMode, normalize};
use crate::envelope::{self, Envelope};
use crate::error::Failure;
use crate::fetch::{self, BasicClient, HttpClient};
use crate::parser;

/// Externally visible lifecycle of the stored results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Constructed, never fetched. Results hold the sentinel.
    Fresh,
    /// Last fetch produced at least one arrival.
    Populated,
    /// Last fetch failed or matched nothing. Results hold the sentinel.
    Unavailable,
}

/// What the last [`BizkaibusData::fetch_next_arrivals`] call ended in.
#[derive(Debug)]
pub enum Outcome {
    Populated(usize),
    NoMatchingRecords,
    Unavailable(Failure),
}

impl Outcome {
    pub fn state(&self) -> State {
        match self {
            Outcome::Populated(_) => State::Populated,
            Outcome::NoMatchingRecords | Outcome::Unavailable(_) => State::Unavailable,
        }
    }
}

#[derive(Debug)]
struct Snapshot {
    state: State,
    results: ResultSet,
}

pub struct BizkaibusData<C = BasicClient> {
    client: C,
    stop_route: StopRoute,
    settings: Settings,
    fetch_lock: Mutex<()>,
    snapshot: RwLock<Snapshot>,
}

impl BizkaibusData<BasicClient> {
    /// Facade for `stop`/`route` against the public endpoint.
    pub fn new(stop: impl Into<String>, route: impl Into<String>) -> Self {
        Self::with_client(
            BasicClient::new(),
            StopRoute::new(stop, route),
            Settings::default(),
        )
    }
}

impl<C: HttpClient> BizkaibusData<C> {
    pub fn with_client(client: C, stop_route: StopRoute, settings: Settings) -> Self {
        let results = ResultSet::unavailable(stop_route.route());
        Self {
            client,
            stop_route,
            settings,
            fetch_lock: Mutex::new(()),
            snapshot: RwLock::new(Snapshot {
                state: State::Fresh,
                results,
            }),
        }
    }

    pub fn stop_route(&self) -> &StopRoute {
        &self.stop_route
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Checks that the endpoint answers with a decodable `OK` envelope.
    /// The XML payload is not looked at and stored results are untouched.
    #[tracing::instrument(skip(self), fields(stop = %self.stop_route.stop(), route = %self.stop_route.route()))]
    pub async fn test_connection(&self) -> bool {
        match self.fetch_envelope().await {
            Ok(_) => {
                info!("Connection test passed");
                true
            }
            Err(e) => {
                warn!(kind = e.kind(), error = %e, "Connection test failed");
                false
            }
        }
    }

    /// Runs the full pipeline without touching stored state.
    ///
    /// An empty `Vec` means the reply was fine but nothing matched the
    /// route.
    ///
    /// # Errors
    ///
    /// Returns the [`Failure`] of whichever stage broke first.
    pub async fn try_next_arrivals(
        &self,
        mode: TimeMode,
        clock: Clock,
    ) -> Result<Vec<ArrivalRecord>, Failure> {
        let envelope = self.fetch_envelope().await?;
        arrivals_from_payload(&envelope.payload, self.stop_route.route(), mode, clock.now())
    }

    /// Fetches upcoming arrivals and replaces the stored results.
    ///
    /// Never fails: on error or an empty match the stored results become
    /// the sentinel. Concurrent calls on one instance run one at a time.
    #[tracing::instrument(skip(self), fields(stop = %self.stop_route.stop(), route = %self.stop_route.route()))]
    pub async fn fetch_next_arrivals(&self, mode: TimeMode, clock: Clock) -> Outcome {
        let _guard = self.fetch_lock.lock().await;
        let route = self.stop_route.route();

        let (results, outcome) = match self.try_next_arrivals(mode, clock).await {
            Ok(records) if records.is_empty() => {
                info!("No passages for route");
                (ResultSet::unavailable(route), Outcome::NoMatchingRecords)
            }
            Ok(records) => {
                let count = records.len();
                info!(count, "Arrivals updated");
                (ResultSet::from_records(route, records), Outcome::Populated(count))
            }
            Err(e) => {
                warn!(kind = e.kind(), error = %e, "Fetch failed, arrivals unavailable");
                (ResultSet::unavailable(route), Outcome::Unavailable(e))
            }
        };

        let mut snapshot = self.snapshot.write().unwrap_or_else(PoisonError::into_inner);
        *snapshot = Snapshot {
            state: outcome.state(),
            results,
        };

        outcome
    }

    /// Latest results. Holds the sentinel unless the last fetch populated.
    pub fn results(&self) -> ResultSet {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .results
            .clone()
    }

    pub fn state(&self) -> State {
        self.snapshot
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .state
    }

    async fn fetch_envelope(&self) -> Result<Envelope, Failure> {
        let raw = fetch::connect(
            &self.client,
            &self.settings.endpoint,
            &self.stop_route,
            self.settings.timeout,
        )
        .await?;

        Ok(envelope::decode(&raw)?)
    }
}

/// Extracts the passages for `route` from the XML payload and renders their
/// due times against `now`.
///
/// A passage whose minutes cannot be rendered in absolute mode is dropped
/// on its own; the rest still come through.
///
/// # Errors
///
/// Returns [`Failure::Xml`] if the payload is not well-formed.
pub fn arrivals_from_payload(
    xml: &str,
    route: &str,
    mode: TimeMode,
    now: NaiveDateTime,
) -> Result<Vec<ArrivalRecord>, Failure> {
    let passages = parser::extract(xml, route)?;
    debug!(matched = passages.len(), "Passages extracted");

    let records = passages
        .into_iter()
        .filter_map(|p| match normalize(&p.minutes, mode, now) {
            Ok(due_in) => Some(ArrivalRecord {
                route_name: p.route_name,
                route: p.route,
                due_in,
            }),
            Err(e) => {
                warn!(route = %p.route, minutes = %p.minutes, error = %e, "Dropping passage");
                None
            }
        })
        .collect();

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{DecodeError, FetchError};
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use reqwest::{Request, Response, StatusCode};
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Serves one canned reply, optionally after a delay, and records every
    /// URL it was asked for.
    struct FakeClient {
        reply: std::sync::Mutex<(u16, String)>,
        delay: Option<Duration>,
        seen: std::sync::Mutex<Vec<String>>,
        in_flight: AtomicUsize,
        peak_in_flight: AtomicUsize,
    }

    impl FakeClient {
        fn new(status: u16, body: impl Into<String>) -> Self {
            Self {
                reply: std::sync::Mutex::new((status, body.into())),
                delay: None,
                seen: std::sync::Mutex::new(Vec::new()),
                in_flight: AtomicUsize::new(0),
                peak_in_flight: AtomicUsize::new(0),
            }
        }

        fn ok(xml: &str) -> Self {
            Self::new(200, envelope_reply("OK", xml))
        }

        fn set_reply(&self, status: u16, body: impl Into<String>) {
            *self.reply.lock().unwrap() = (status, body.into());
        }
    }

    #[async_trait]
    impl HttpClient for FakeClient {
        async fn execute(&self, req: Request) -> reqwest::Result<Response> {
            self.seen.lock().unwrap().push(req.url().to_string());
            let now_in_flight = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak_in_flight.fetch_max(now_in_flight, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            let (status, body) = self.reply.lock().unwrap().clone();
            let resp = http::Response::builder()
                .status(status)
                .body(body)
                .unwrap();
            Ok(Response::from(resp))
        }
    }

    fn envelope_reply(status: &str, xml: &str) -> String {
        format!("({{'STATUS':'{status}','Resultado':'{xml}'}});")
    }

    fn paso(linea: &str, ruta: &str, minutos: &str) -> String {
        format!(
            "<PasoParada><linea>{linea}</linea><ruta>{ruta}</ruta><e1><minutos>{minutos}</minutos></e1></PasoParada>"
        )
    }

    fn two_routes_xml() -> String {
        format!(
            "<Resultado>{}{}</Resultado>",
            paso("A3941", "Bilbao-Getxo", "5"),
            paso("B1000", "Other", "7")
        )
    }

    fn facade(client: FakeClient) -> BizkaibusData<FakeClient> {
        BizkaibusData::with_client(
            client,
            StopRoute::new("0252", "A3941"),
            Settings::default().with_endpoint("http://bizkaibus.test/paso"),
        )
    }

    fn new_year() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2024, 1, 1)
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    #[test]
    fn test_fresh_holds_sentinel() {
        let data = facade(FakeClient::ok(""));

        assert_eq!(data.state(), State::Fresh);
        assert_eq!(data.results(), ResultSet::unavailable("A3941"));
    }

    #[tokio::test]
    async fn test_fetch_populates_matching_route_only() {
        let data = facade(FakeClient::ok(&two_routes_xml()));

        let outcome = data.fetch_next_arrivals(TimeMode::Relative, Clock::Local).await;

        assert!(matches!(outcome, Outcome::Populated(1)));
        assert_eq!(data.state(), State::Populated);
        let results = data.results();
        assert_eq!(
            results.records(),
            &[ArrivalRecord {
                route_name: "Bilbao-Getxo".to_string(),
                route: "A3941".to_string(),
                due_in: "5".to_string(),
            }]
        );
        assert!(results.iter().all(|r| r.route == "A3941"));
    }

    #[tokio::test]
    async fn test_fetch_sends_stop_and_route() {
        let data = facade(FakeClient::ok(&two_routes_xml()));
        data.fetch_next_arrivals(TimeMode::Relative, Clock::Local).await;

        let seen = data.client.seen.lock().unwrap().clone();
        assert_eq!(
            seen,
            vec!["http://bizkaibus.test/paso?callback=&strLinea=A3941&strParada=0252".to_string()]
        );
    }

    #[tokio::test]
    async fn test_zero_matches_is_sentinel() {
        let xml = format!("<Resultado>{}</Resultado>", paso("B1000", "Other", "7"));
        let data = facade(FakeClient::ok(&xml));

        let outcome = data.fetch_next_arrivals(TimeMode::Relative, Clock::Local).await;

        assert!(matches!(outcome, Outcome::NoMatchingRecords));
        assert_eq!(data.state(), State::Unavailable);
        assert_eq!(data.results(), ResultSet::unavailable("A3941"));
    }

    #[tokio::test]
    async fn test_status_not_ok_is_sentinel() {
        let data = facade(FakeClient::new(200, envelope_reply("ERROR", &two_routes_xml())));

        let outcome = data.fetch_next_arrivals(TimeMode::Relative, Clock::Local).await;

        assert!(matches!(
            outcome,
            Outcome::Unavailable(Failure::Decode(DecodeError::NotOk(_)))
        ));
        assert_eq!(data.results(), ResultSet::unavailable("A3941"));
    }

    #[tokio::test]
    async fn test_http_error_is_sentinel() {
        let data = facade(FakeClient::new(500, envelope_reply("OK", &two_routes_xml())));

        let outcome = data.fetch_next_arrivals(TimeMode::Relative, Clock::Local).await;

        assert!(matches!(
            outcome,
            Outcome::Unavailable(Failure::Network(FetchError::Status(s)))
                if s == StatusCode::INTERNAL_SERVER_ERROR
        ));
        assert_eq!(data.state(), State::Unavailable);
        assert_eq!(data.results(), ResultSet::unavailable("A3941"));
    }

    #[tokio::test]
    async fn test_malformed_xml_is_sentinel() {
        let data = facade(FakeClient::ok("<Resultado><PasoParada></Resultado>"));

        let outcome = data.fetch_next_arrivals(TimeMode::Relative, Clock::Local).await;

        assert!(matches!(outcome, Outcome::Unavailable(Failure::Xml(_))));
        assert_eq!(data.results(), ResultSet::unavailable("A3941"));
    }

    #[tokio::test]
    async fn test_timeout_is_sentinel() {
        let mut client = FakeClient::ok(&two_routes_xml());
        client.delay = Some(Duration::from_secs(5));
        let data = BizkaibusData::with_client(
            client,
            StopRoute::new("0252", "A3941"),
            Settings::default()
                .with_endpoint("http://bizkaibus.test/paso")
                .with_timeout(Duration::from_millis(50)),
        );

        assert!(!data.test_connection().await);
        let outcome = data.fetch_next_arrivals(TimeMode::Relative, Clock::Local).await;

        assert!(matches!(
            outcome,
            Outcome::Unavailable(Failure::Network(FetchError::Timeout(_)))
        ));
        assert_eq!(data.results(), ResultSet::unavailable("A3941"));
    }

    #[tokio::test]
    async fn test_fetch_is_idempotent() {
        let data = facade(FakeClient::ok(&two_routes_xml()));

        data.fetch_next_arrivals(TimeMode::Relative, Clock::Local).await;
        let first = data.results();
        data.fetch_next_arrivals(TimeMode::Relative, Clock::Local).await;

        assert_eq!(first, data.results());
    }

    #[tokio::test]
    async fn test_failure_replaces_previous_results() {
        let data = facade(FakeClient::ok(&two_routes_xml()));
        data.fetch_next_arrivals(TimeMode::Relative, Clock::Local).await;
        assert_eq!(data.state(), State::Populated);

        data.client.set_reply(503, "");
        data.fetch_next_arrivals(TimeMode::Relative, Clock::Local).await;

        assert_eq!(data.state(), State::Unavailable);
        assert_eq!(data.results(), ResultSet::unavailable("A3941"));
    }

    #[tokio::test]
    async fn test_connection_ok_leaves_state_alone() {
        // Payload is not valid XML: connection test must not parse it.
        let data = facade(FakeClient::ok("not xml"));

        assert!(data.test_connection().await);
        assert_eq!(data.state(), State::Fresh);
        assert_eq!(data.results(), ResultSet::unavailable("A3941"));
    }

    #[tokio::test]
    async fn test_connection_fails_on_bad_status() {
        let data = facade(FakeClient::new(200, envelope_reply("NOK", "")));
        assert!(!data.test_connection().await);
    }

    #[tokio::test]
    async fn test_try_next_arrivals_reports_without_storing() {
        let data = facade(FakeClient::new(404, ""));

        let result = data.try_next_arrivals(TimeMode::Relative, Clock::Utc).await;

        assert!(matches!(result, Err(Failure::Network(FetchError::Status(_)))));
        assert_eq!(data.state(), State::Fresh);
    }

    #[tokio::test]
    async fn test_concurrent_fetches_serialize() {
        let mut client = FakeClient::ok(&two_routes_xml());
        client.delay = Some(Duration::from_millis(50));
        let data = Arc::new(facade(client));

        let (a, b) = tokio::join!(
            data.fetch_next_arrivals(TimeMode::Relative, Clock::Local),
            data.fetch_next_arrivals(TimeMode::Relative, Clock::Local)
        );

        assert!(matches!(a, Outcome::Populated(1)));
        assert!(matches!(b, Outcome::Populated(1)));
        assert_eq!(data.results().len(), 1);
        assert_eq!(data.client.seen.lock().unwrap().len(), 2);
        assert_eq!(data.client.peak_in_flight.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_connection_checks_are_not_serialized() {
        let mut client = FakeClient::ok("");
        client.delay = Some(Duration::from_millis(50));
        let data = facade(client);

        let (a, b) = tokio::join!(data.test_connection(), data.test_connection());

        assert!(a && b);
        assert_eq!(data.client.peak_in_flight.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_new_targets_public_endpoint() {
        let data = BizkaibusData::new("0252", "A3941");

        assert_eq!(data.stop_route(), &StopRoute::new("0252", "A3941"));
        assert_eq!(data.settings(), &Settings::default());
        assert_eq!(data.settings().endpoint, fetch::RESOURCE_URL);
        assert_eq!(data.state(), State::Fresh);
    }

    #[test]
    fn test_absolute_mode_with_fixed_clock() {
        let records =
            arrivals_from_payload(&two_routes_xml(), "A3941", TimeMode::Absolute, new_year())
                .unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].due_in, "2024-01-01T00:05:00");
    }

    #[test]
    fn test_unparsable_minutes_drops_only_that_passage() {
        let xml = format!(
            "<Resultado>{}{}</Resultado>",
            paso("A3941", "Bilbao", "soon"),
            paso("A3941", "Bilbao", "12")
        );

        let records = arrivals_from_payload(&xml, "A3941", TimeMode::Absolute, new_year()).unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].due_in, "2024-01-01T00:12:00");
    }

    #[test]
    fn test_unparsable_minutes_kept_in_relative_mode() {
        let xml = format!("<Resultado>{}</Resultado>", paso("A3941", "Bilbao", "soon"));

        let records = arrivals_from_payload(&xml, "A3941", TimeMode::Relative, new_year()).unwrap();

        assert_eq!(records[0].due_in, "soon");
    }

    #[test]
    fn test_outcome_states() {
        assert_eq!(Outcome::Populated(3).state(), State::Populated);
        assert_eq!(Outcome::NoMatchingRecords.state(), State::Unavailable);
    }
}
