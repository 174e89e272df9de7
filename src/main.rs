// A small service that relays periodic mindfulness alerts to OneSignal so
// subscribed browsers keep receiving them while the page is backgrounded.
use actix_web::{error, web::Data, App, HttpResponse, HttpServer};
use dotenv::dotenv;
use log::{error, info, warn};
use std::{collections::HashMap, env, sync::Arc, time::Instant};
use tokio::sync::RwLock;

use mindfulness_alert_service::onesignal::{OneSignalClient, OneSignalCredentials};
use mindfulness_alert_service::routes::{
    cancel_alerts, client_config, health, onesignal_webhook, schedule_alerts, send_notification,
    session_status,
};
use mindfulness_alert_service::timing::expiry_sweep_loop;
use mindfulness_alert_service::types::{CancelMap, SessionMap};
use mindfulness_alert_service::util::{self, ServerStart, HOST, PORT};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    util::init_logging();

    let client = match OneSignalCredentials::from_env() {
        Some(credentials) => {
            info!("OneSignal credentials configured");
            Some(Arc::new(OneSignalClient::new(credentials)))
        }
        None => {
            warn!(
                "OneSignal credentials missing or placeholder ({} / {}), push delivery disabled",
                util::VAR_APP_ID,
                util::VAR_REST_API_KEY
            );
            None
        }
    };
    let client_data = Data::new(client);

    let sessions: Arc<RwLock<SessionMap>> = Arc::new(RwLock::new(HashMap::new()));
    let sessions_data = Data::new(Arc::clone(&sessions));

    let cancel_channels: Arc<RwLock<CancelMap>> = Arc::new(RwLock::new(HashMap::new()));
    let cancel_channels_data = Data::new(Arc::clone(&cancel_channels));

    let started_data = Data::new(ServerStart(Instant::now()));

    let sweep_handle = tokio::spawn(expiry_sweep_loop(sessions, cancel_channels));

    let host = env::var(HOST).unwrap_or(String::from("127.0.0.1"));
    let port = env::var(PORT).unwrap_or(String::from("9797"));
    info!("listening on {}:{}", host, port);

    let server_handle = HttpServer::new(move || {
        let json_cfg = actix_web::web::JsonConfig::default().error_handler(|err, _req| {
            error!("Json config error: {}", err);
            error::InternalError::from_response(err, HttpResponse::BadRequest().into()).into()
        });
        App::new()
            .app_data(Data::clone(&client_data))
            .app_data(Data::clone(&sessions_data))
            .app_data(Data::clone(&cancel_channels_data))
            .app_data(Data::clone(&started_data))
            .app_data(json_cfg)
            .service(schedule_alerts)
            .service(cancel_alerts)
            .service(session_status)
            .service(health)
            .service(onesignal_webhook)
            .service(client_config)
            .service(send_notification)
    })
    .bind(format!("{}:{}", host, port))?
    .run();

    tokio::select! {
        _ = server_handle => {}
        _ = sweep_handle => {}
    }
    Ok(())
}
