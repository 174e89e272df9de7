use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Server-side alert session, one per scheduled user.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub user_id: String,
    pub interval_minutes: u64,
    /// Session length in minutes; also caps the number of alerts sent.
    pub total_duration: Option<u64>,
    /// Unix millis.
    pub start_time: u64,
    pub alerts_sent: u64,
    pub is_active: bool,
}

impl Session {
    pub fn next_alert(&self) -> DateTime<Utc> {
        Utc::now() + Duration::minutes(self.interval_minutes as i64)
    }
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleRequest {
    pub user_id: String,
    pub interval_minutes: u64,
    #[serde(default)]
    pub total_duration: Option<u64>,
    #[serde(default)]
    pub start_time: Option<u64>,
}

#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CancelRequest {
    pub user_id: String,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleResponse {
    pub success: bool,
    pub message: &'static str,
    pub session: SessionSummary,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub user_id: String,
    pub interval_minutes: u64,
    pub total_duration: Option<u64>,
    pub next_alert: DateTime<Utc>,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct CancelResponse {
    pub success: bool,
    pub message: &'static str,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SessionStatusResponse {
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alerts_sent: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_time: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval_minutes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_duration: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_alert: Option<DateTime<Utc>>,
}

impl SessionStatusResponse {
    pub fn inactive() -> Self {
        Self {
            active: false,
            alerts_sent: None,
            start_time: None,
            interval_minutes: None,
            total_duration: None,
            next_alert: None,
        }
    }

    pub fn for_session(session: &Session) -> Self {
        Self {
            active: session.is_active,
            alerts_sent: Some(session.alerts_sent),
            start_time: Some(session.start_time),
            interval_minutes: Some(session.interval_minutes),
            total_duration: session.total_duration,
            next_alert: Some(session.next_alert()),
        }
    }
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub active_sessions: usize,
    pub scheduled_jobs: usize,
    pub uptime: f64,
}

#[derive(Deserialize, Clone, Debug)]
pub struct WebhookEvent {
    pub event: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

#[derive(Serialize, Debug)]
pub struct WebhookAck {
    pub received: bool,
}

#[derive(Serialize, Debug)]
pub struct ErrorResponse {
    pub error: &'static str,
}

/// Public vendor credentials served to the front-end; the REST key never
/// appears here.
#[derive(Serialize, Debug)]
pub struct ClientConfig {
    #[serde(rename = "ONESIGNAL_APP_ID")]
    pub app_id: String,
    #[serde(rename = "ONESIGNAL_SAFARI_WEB_ID", skip_serializing_if = "Option::is_none")]
    pub safari_web_id: Option<String>,
}

#[derive(Deserialize, Clone, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SendRequest {
    pub message: String,
    pub user_ids: Vec<String>,
}

#[derive(Serialize, Debug)]
pub struct SendResponse {
    pub success: bool,
    pub notification_id: String,
    pub recipients: u32,
}

#[cfg(test)]
mod tests {
    use super::{ScheduleRequest, Session, SessionStatusResponse};

    #[test]
    fn schedule_request_accepts_minimal_payload() {
        let request: ScheduleRequest =
            serde_json::from_str(r#"{"userId":"u-1","intervalMinutes":5}"#).expect("deserialize");
        assert_eq!(request.user_id, "u-1");
        assert_eq!(request.interval_minutes, 5);
        assert!(request.total_duration.is_none());
        assert!(request.start_time.is_none());
    }

    #[test]
    fn inactive_status_serializes_bare() {
        let json =
            serde_json::to_value(SessionStatusResponse::inactive()).expect("serialize");
        assert_eq!(json, serde_json::json!({ "active": false }));
    }

    #[test]
    fn active_status_includes_session_fields() {
        let session = Session {
            user_id: "u-1".to_string(),
            interval_minutes: 5,
            total_duration: Some(60),
            start_time: 1_700_000_000_000,
            alerts_sent: 3,
            is_active: true,
        };
        let json = serde_json::to_value(SessionStatusResponse::for_session(&session))
            .expect("serialize");
        assert_eq!(json["active"], true);
        assert_eq!(json["alertsSent"], 3);
        assert_eq!(json["intervalMinutes"], 5);
        assert_eq!(json["totalDuration"], 60);
        assert!(json["nextAlert"].is_string());
    }
}
