// One watch run: compute range, fetch, resolve, notify when a slot is open

use crate::availability::{check_availability, AvailabilityStatus};
use crate::config::{MailConfig, WatchConfig};
use crate::date_range::DateRange;
use crate::event_data::{EventSource, QueryParameters};
use crate::notifier::{Notification, Notifier, NotifyError};

// How a run ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    Notified(AvailabilityStatus),
    NotNotified(AvailabilityStatus),
    // Fetch or decode failed; treated as "no news"
    FetchFailed(String),
}

impl RunOutcome {
    pub fn status(&self) -> Option<AvailabilityStatus> {
        match self {
            RunOutcome::Notified(status) | RunOutcome::NotNotified(status) => Some(*status),
            RunOutcome::FetchFailed(_) => None,
        }
    }
}

pub struct AvailabilityWatcher<S, N> {
    watch: WatchConfig,
    from_email: String,
    to_email: String,
    source: S,
    notifier: N,
}

impl<S, N> AvailabilityWatcher<S, N>
where
    S: EventSource,
    N: Notifier,
{
    pub fn new(watch: WatchConfig, mail: &MailConfig, source: S, notifier: N) -> Self {
        Self {
            watch,
            from_email: mail.from_email.clone(),
            to_email: mail.to_email.clone(),
            source,
            notifier,
        }
    }

    pub fn range(&self) -> DateRange {
        DateRange::for_target(self.watch.target_date, self.watch.range_policy)
    }

    pub fn query(&self) -> QueryParameters {
        QueryParameters::new(
            self.watch.master_no,
            self.watch.service_type1_id,
            self.watch.service_type2_id,
            self.range(),
        )
    }

    // Only a failed send is returned as an error; fetch problems end the run quietly
    pub async fn run(&self) -> Result<RunOutcome, NotifyError> {
        let query = self.query();
        tracing::debug!(
            hut = %self.watch.hut_name,
            master_no = query.master_no,
            start = %query.start_date,
            end = %query.end_date,
            policy = %self.watch.range_policy,
            days = self.range().days(),
            "Checking reservation calendar"
        );

        let status = match self.source.fetch_events(&query).await {
            Ok(events) => check_availability(&events, self.watch.target_date),
            Err(e) => {
                tracing::error!("取得エラー: {}", e);
                return Ok(RunOutcome::FetchFailed(e.to_string()));
            }
        };

        if !status.is_available() {
            tracing::info!("通知なし: {}", status);
            return Ok(RunOutcome::NotNotified(status));
        }

        let notification = Notification::for_status(
            &self.watch.hut_name,
            self.watch.target_date,
            status,
            &self.from_email,
            &self.to_email,
        );
        self.notifier.send(&notification).await?;
        tracing::info!("通知送信: {}", status);
        Ok(RunOutcome::Notified(status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::date_range::RangePolicy;
    use crate::event_data::EventDataClient;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use wiremock::matchers::{path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Clone, Default)]
    struct RecordingNotifier {
        sent: Arc<Mutex<Vec<Notification>>>,
        fail: bool,
    }

    impl RecordingNotifier {
        fn failing() -> Self {
            Self {
                fail: true,
                ..Default::default()
            }
        }

        fn sent(&self) -> Vec<Notification> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn send(&self, notification: &Notification) -> Result<(), NotifyError> {
            self.sent.lock().unwrap().push(notification.clone());
            if self.fail {
                return Err(NotifyError::Build("relay refused".to_string()));
            }
            Ok(())
        }
    }

    fn watch_config(policy: RangePolicy) -> WatchConfig {
        WatchConfig {
            hut_name: "北岳山荘".to_string(),
            master_no: 212,
            service_type1_id: 1,
            service_type2_id: 0,
            target_date: NaiveDate::from_ymd_opt(2025, 9, 27).unwrap(),
            range_policy: policy,
        }
    }

    fn mail_config() -> MailConfig {
        MailConfig {
            smtp_host: "127.0.0.1".to_string(),
            smtp_port: 1,
            from_email: "watcher@example.com".to_string(),
            to_email: "climber@example.com".to_string(),
            app_password: "secret".to_string(),
            timeout: Duration::from_secs(1),
        }
    }

    async fn upstream_returning(response: ResponseTemplate) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(path("/MountainHutInfolists"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(path("/MountainHutInfolists/GetEventData"))
            .respond_with(response)
            .mount(&server)
            .await;
        server
    }

    async fn run_against(
        server: &MockServer,
        notifier: &RecordingNotifier,
    ) -> Result<RunOutcome, NotifyError> {
        let source = EventDataClient::with_timeout(&server.uri(), Duration::from_secs(5)).unwrap();
        let watcher = AvailabilityWatcher::new(
            watch_config(RangePolicy::Month),
            &mail_config(),
            source,
            notifier.clone(),
        );
        watcher.run().await
    }

    #[test]
    fn test_query_uses_range_policy() {
        let month = AvailabilityWatcher::new(
            watch_config(RangePolicy::Month),
            &mail_config(),
            EventDataClient::with_timeout("http://localhost", Duration::from_secs(1)).unwrap(),
            RecordingNotifier::default(),
        )
        .query();
        assert_eq!(month.start_date, NaiveDate::from_ymd_opt(2025, 9, 1).unwrap());
        assert_eq!(month.end_date, NaiveDate::from_ymd_opt(2025, 9, 30).unwrap());

        let day = AvailabilityWatcher::new(
            watch_config(RangePolicy::SingleDay),
            &mail_config(),
            EventDataClient::with_timeout("http://localhost", Duration::from_secs(1)).unwrap(),
            RecordingNotifier::default(),
        )
        .query();
        assert_eq!(day.start_date, day.end_date);
        assert_eq!(day.master_no, 212);
    }

    #[tokio::test]
    async fn test_available_sends_one_email() {
        let server = upstream_returning(
            ResponseTemplate::new(200)
                .set_body_string(r#"[{"serviceDate":"2025/09/27T00:00:00","reservationCount":2}]"#),
        )
        .await;
        let notifier = RecordingNotifier::default();

        let outcome = run_against(&server, &notifier).await.unwrap();

        assert_eq!(outcome, RunOutcome::Notified(AvailabilityStatus::Available));
        let sent = notifier.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].subject.contains("9/27"));
        assert_eq!(sent[0].to, "climber@example.com");
        assert_eq!(sent[0].from, "watcher@example.com");
    }

    #[tokio::test]
    async fn test_full_sends_nothing() {
        let server = upstream_returning(
            ResponseTemplate::new(200)
                .set_body_string(r#"[{"serviceDate":"2025/09/27T00:00:00","reservationCount":0}]"#),
        )
        .await;
        let notifier = RecordingNotifier::default();

        let outcome = run_against(&server, &notifier).await.unwrap();

        assert_eq!(outcome, RunOutcome::NotNotified(AvailabilityStatus::Full));
        assert!(notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn test_empty_calendar_sends_nothing() {
        let server = upstream_returning(ResponseTemplate::new(200).set_body_string("[]")).await;
        let notifier = RecordingNotifier::default();

        let outcome = run_against(&server, &notifier).await.unwrap();

        assert_eq!(outcome, RunOutcome::NotNotified(AvailabilityStatus::Unknown));
        assert_eq!(outcome.status(), Some(AvailabilityStatus::Unknown));
        assert!(notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn test_server_error_ends_run_quietly() {
        let server = upstream_returning(ResponseTemplate::new(500)).await;
        let notifier = RecordingNotifier::default();

        let outcome = run_against(&server, &notifier).await.unwrap();

        assert!(matches!(outcome, RunOutcome::FetchFailed(ref msg) if msg.contains("500")));
        assert_eq!(outcome.status(), None);
        assert!(notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn test_unparseable_body_ends_run_quietly() {
        let server =
            upstream_returning(ResponseTemplate::new(200).set_body_string("<html></html>")).await;
        let notifier = RecordingNotifier::default();

        let outcome = run_against(&server, &notifier).await.unwrap();

        assert!(matches!(outcome, RunOutcome::FetchFailed(_)));
        assert!(notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn test_double_encoded_available() {
        let inner = r#"[{"serviceDate":"2025/09/27T00:00:00","reservationCount":1}]"#;
        let server = upstream_returning(
            ResponseTemplate::new(200).set_body_string(serde_json::to_string(inner).unwrap()),
        )
        .await;
        let notifier = RecordingNotifier::default();

        let outcome = run_against(&server, &notifier).await.unwrap();

        assert_eq!(outcome, RunOutcome::Notified(AvailabilityStatus::Available));
        assert_eq!(notifier.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_send_failure_propagates() {
        let server = upstream_returning(
            ResponseTemplate::new(200)
                .set_body_string(r#"[{"serviceDate":"2025/09/27T00:00:00","reservationCount":5}]"#),
        )
        .await;
        let notifier = RecordingNotifier::failing();

        let result = run_against(&server, &notifier).await;

        assert!(matches!(result, Err(NotifyError::Build(_))));
        assert_eq!(notifier.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_month_window_requested() {
        let server = MockServer::start().await;
        Mock::given(path("/MountainHutInfolists"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;
        Mock::given(path("/MountainHutInfolists/GetEventData"))
            .and(query_param("startDate", "2025-09-01"))
            .and(query_param("endDate", "2025-09-30"))
            .respond_with(ResponseTemplate::new(200).set_body_string("[]"))
            .expect(1)
            .mount(&server)
            .await;
        let notifier = RecordingNotifier::default();

        let outcome = run_against(&server, &notifier).await.unwrap();
        assert_eq!(outcome, RunOutcome::NotNotified(AvailabilityStatus::Unknown));
    }
}
