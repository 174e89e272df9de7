use std::sync::Arc;

use actix_web::{get, post, web, HttpResponse, Responder};
use log::{debug, error, info};
use tokio::sync::{mpsc, RwLock};

use crate::models::{
    CancelRequest, CancelResponse, ClientConfig, ErrorResponse, HealthResponse, ScheduleRequest,
    ScheduleResponse, SendRequest, SendResponse, Session, SessionStatusResponse, SessionSummary,
    WebhookAck, WebhookEvent,
};
use crate::onesignal::OneSignalClient;
use crate::timing::run_session_loop;
use crate::types::{CancelMap, SessionMap};
use crate::util::{self, ServerStart};

type Sessions = web::Data<Arc<RwLock<SessionMap>>>;
type CancelChannels = web::Data<Arc<RwLock<CancelMap>>>;
type PushClient = web::Data<Option<Arc<OneSignalClient>>>;

#[post("/api/schedule-mindfulness-alerts")]
pub async fn schedule_alerts(
    payload: web::Json<ScheduleRequest>,
    client: PushClient,
    sessions: Sessions,
    cancel_channels: CancelChannels,
) -> impl Responder {
    if payload.user_id.is_empty() || payload.interval_minutes == 0 {
        return HttpResponse::BadRequest().json(ErrorResponse {
            error: "Missing required parameters",
        });
    }

    let session = Session {
        user_id: payload.user_id.clone(),
        interval_minutes: payload.interval_minutes,
        total_duration: payload.total_duration,
        start_time: payload.start_time.unwrap_or_else(util::now_ms),
        alerts_sent: 0,
        is_active: true,
    };

    // Replace any prior job for this user: cancel it and take over its slot.
    let (cancel_tx, cancel_rx) = mpsc::channel(1);
    {
        let mut cancel_map = cancel_channels.write().await;
        if let Some(existing_cancel) = cancel_map.get(&session.user_id) {
            existing_cancel.send(true).await.ok();
        }
        cancel_map.insert(session.user_id.clone(), cancel_tx);
    }
    sessions
        .write()
        .await
        .insert(session.user_id.clone(), session.clone());

    info!(
        "schedule:: user ...{} every {} minutes (duration {:?})",
        util::short_id(&session.user_id),
        session.interval_minutes,
        session.total_duration
    );

    let summary = SessionSummary {
        user_id: session.user_id.clone(),
        interval_minutes: session.interval_minutes,
        total_duration: session.total_duration,
        next_alert: session.next_alert(),
    };
    tokio::spawn(run_session_loop(
        session,
        client.get_ref().clone(),
        cancel_rx,
        Arc::clone(sessions.get_ref()),
        Arc::clone(cancel_channels.get_ref()),
    ));

    HttpResponse::Ok().json(ScheduleResponse {
        success: true,
        message: "Alertas programadas correctamente",
        session: summary,
    })
}

#[post("/api/cancel-mindfulness-alerts")]
pub async fn cancel_alerts(
    payload: web::Json<CancelRequest>,
    sessions: Sessions,
    cancel_channels: CancelChannels,
) -> impl Responder {
    if payload.user_id.is_empty() {
        return HttpResponse::BadRequest().json(ErrorResponse {
            error: "Missing userId",
        });
    }

    let had_session = sessions.read().await.contains_key(&payload.user_id);
    if let Some(cancel) = cancel_channels.read().await.get(&payload.user_id) {
        cancel.send(true).await.ok();
    }
    cancel_channels.write().await.remove(&payload.user_id);
    sessions.write().await.remove(&payload.user_id);

    info!("cancel:: user ...{}", util::short_id(&payload.user_id));
    HttpResponse::Ok().json(CancelResponse {
        success: true,
        message: if had_session {
            "Alertas canceladas"
        } else {
            "No había alertas activas"
        },
    })
}

#[get("/api/session-status/{user_id}")]
pub async fn session_status(user_id: web::Path<String>, sessions: Sessions) -> impl Responder {
    match sessions.read().await.get(user_id.as_ref()) {
        Some(session) => HttpResponse::Ok().json(SessionStatusResponse::for_session(session)),
        None => HttpResponse::Ok().json(SessionStatusResponse::inactive()),
    }
}

#[get("/api/health")]
pub async fn health(
    sessions: Sessions,
    cancel_channels: CancelChannels,
    started: web::Data<ServerStart>,
) -> impl Responder {
    HttpResponse::Ok().json(HealthResponse {
        status: "ok",
        active_sessions: sessions.read().await.len(),
        scheduled_jobs: cancel_channels.read().await.len(),
        uptime: started.0.elapsed().as_secs_f64(),
    })
}

/// Vendor events are logged only; no side effects are defined for them.
#[post("/api/onesignal-webhook")]
pub async fn onesignal_webhook(payload: web::Json<WebhookEvent>) -> impl Responder {
    match payload.event.as_str() {
        "notification.clicked" => info!("webhook:: notification clicked: {}", payload.data),
        "session.duration" => info!("webhook:: session duration: {}", payload.data),
        other => debug!("webhook:: unknown event: {other}"),
    }
    HttpResponse::Ok().json(WebhookAck { received: true })
}

/// Public vendor credentials for the front-end; the REST key stays server-side.
#[get("/api/config")]
pub async fn client_config(client: PushClient) -> impl Responder {
    match client.get_ref() {
        Some(client) => HttpResponse::Ok().json(ClientConfig {
            app_id: client.app_id().to_string(),
            safari_web_id: client.safari_web_id().map(str::to_string),
        }),
        None => HttpResponse::InternalServerError().json(ErrorResponse {
            error: "OneSignal credentials not properly configured",
        }),
    }
}

/// Relay a single push send on behalf of the front-end.
#[post("/api/send-notification")]
pub async fn send_notification(
    payload: web::Json<SendRequest>,
    client: PushClient,
) -> impl Responder {
    let Some(client) = client.get_ref() else {
        return HttpResponse::InternalServerError().json(ErrorResponse {
            error: "OneSignal REST API Key not configured",
        });
    };

    match client
        .send_notification(&payload.user_ids, &payload.message)
        .await
    {
        Ok(receipt) => HttpResponse::Ok().json(SendResponse {
            success: true,
            notification_id: receipt.id,
            recipients: receipt.recipients,
        }),
        Err(err) => {
            error!("send:: delivery failed: {err}");
            HttpResponse::InternalServerError().json(ErrorResponse {
                error: "Failed to send notification",
            })
        }
    }
}
