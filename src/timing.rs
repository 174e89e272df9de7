use std::sync::Arc;

use log::{debug, error, info};
use rand::seq::SliceRandom;
use tokio::sync::{mpsc, RwLock};
use tokio::time::{Duration, Instant};

use crate::models::Session;
use crate::onesignal::OneSignalClient;
use crate::types::{CancelMap, SessionMap};
use crate::util;

/// Sessions with no explicit duration are swept after 8 hours.
pub const DEFAULT_SESSION_DURATION_MINUTES: u64 = 480;

pub const EXPIRY_SWEEP_INTERVAL: Duration = Duration::from_secs(60 * 60);

pub const RELAY_MESSAGES: [&str; 10] = [
    "🧘‍♀️ Momento de respirar conscientemente",
    "🌸 Pausa y observa el momento presente",
    "🍃 Toma tres respiraciones profundas",
    "💫 Conecta contigo misma",
    "🌊 Fluye con la tranquilidad del ahora",
    "🕯️ Aquí y ahora",
    "🦋 Suelta y permite que la paz llegue",
    "🌅 Abraza este momento",
    "🎋 Encuentra quietud en el movimiento",
    "🌙 Observa lo que surge sin aferrarte",
];

/// Periodic alert loop for one user session.
///
/// The session and its cancel channel are registered by the caller before
/// spawning, so a status request immediately after scheduling sees the
/// session. An external cancel leaves map cleanup to whoever sent it; the
/// expiry and alert-limit exits clean up here.
pub async fn run_session_loop(
    session: Session,
    client: Option<Arc<OneSignalClient>>,
    mut cancel: mpsc::Receiver<bool>,
    sessions: Arc<RwLock<SessionMap>>,
    cancel_channels: Arc<RwLock<CancelMap>>,
) {
    let user_id = session.user_id.clone();
    let short_user = util::short_id(&user_id);
    let interval = Duration::from_secs(session.interval_minutes * 60);
    let duration_minutes = session
        .total_duration
        .unwrap_or(DEFAULT_SESSION_DURATION_MINUTES);
    let deadline = Instant::now() + Duration::from_secs(duration_minutes * 60);

    loop {
        tokio::select! {
            biased;
            _ = cancel.recv() => {
                debug!("session_loop:: user ...{short_user} canceled");
                return;
            }
            _ = tokio::time::sleep(interval) => {}
            _ = tokio::time::sleep_until(deadline) => {
                info!("session_loop:: user ...{short_user} reached its duration limit");
                break;
            }
        }

        let message = pick_relay_message();
        if let Some(client) = &client {
            match client.send_notification(&[user_id.clone()], message).await {
                Ok(receipt) => debug!(
                    "session_loop:: user ...{short_user} alert delivered (id={})",
                    receipt.id
                ),
                Err(err) => error!("session_loop:: user ...{short_user} delivery failed: {err}"),
            }
        } else {
            debug!("session_loop:: user ...{short_user} push disabled, skipping delivery");
        }

        let alerts_sent = {
            let mut map = sessions.write().await;
            match map.get_mut(&user_id) {
                Some(session) => {
                    session.alerts_sent += 1;
                    session.alerts_sent
                }
                // Session was removed underneath us; stop quietly.
                None => return,
            }
        };

        if let Some(limit) = session.total_duration {
            if alerts_sent >= limit {
                info!("session_loop:: user ...{short_user} reached its alert limit");
                break;
            }
        }
    }

    remove_session(&user_id, &sessions, &cancel_channels).await;
}

/// Hourly sweep removing sessions older than their configured (or default
/// 8-hour) duration.
pub async fn expiry_sweep_loop(
    sessions: Arc<RwLock<SessionMap>>,
    cancel_channels: Arc<RwLock<CancelMap>>,
) {
    loop {
        tokio::time::sleep(EXPIRY_SWEEP_INTERVAL).await;

        let now_ms = util::now_ms();
        let expired: Vec<String> = sessions
            .read()
            .await
            .iter()
            .filter(|(_, session)| {
                let max_age_ms = session
                    .total_duration
                    .unwrap_or(DEFAULT_SESSION_DURATION_MINUTES)
                    * 60_000;
                now_ms.saturating_sub(session.start_time) > max_age_ms
            })
            .map(|(user_id, _)| user_id.clone())
            .collect();

        for user_id in &expired {
            info!("sweep:: cleaning expired session for user ...{}", util::short_id(user_id));
            if let Some(cancel) = cancel_channels.read().await.get(user_id) {
                cancel.send(true).await.ok();
            }
            remove_session(user_id, &sessions, &cancel_channels).await;
        }
        info!("sweep:: cleaned {} expired sessions", expired.len());
    }
}

async fn remove_session(
    user_id: &str,
    sessions: &Arc<RwLock<SessionMap>>,
    cancel_channels: &Arc<RwLock<CancelMap>>,
) {
    sessions.write().await.remove(user_id);
    cancel_channels.write().await.remove(user_id);
}

pub fn pick_relay_message() -> &'static str {
    RELAY_MESSAGES
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(RELAY_MESSAGES[0])
}
