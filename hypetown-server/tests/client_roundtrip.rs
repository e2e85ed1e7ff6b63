//! Client/Server Roundtrip
//!
//! Runs the real `ApiClient` and `SessionDriver` against the backend on a
//! loopback port.

use std::net::SocketAddr;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

use hypetown::{ApiClient, ClientConfig, GameApi, GameSession, SessionDriver, SyncError, WorldPoint};
use hypetown_server::{api, sign_init_data, ServerConfig};

const BOT_TOKEN: &str = "7000000:hypetown-roundtrip";

async fn spawn_server() -> SocketAddr {
    let config = ServerConfig {
        bot_token: BOT_TOKEN.to_string(),
        auto_register: true,
        ..Default::default()
    };
    let app = api::build_router(api::ApiState::new(config));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

fn client_config(addr: SocketAddr, init_data: String) -> ClientConfig {
    ClientConfig {
        api_base_url: format!("http://{}", addr),
        init_data,
        sync_interval: Duration::from_millis(50),
        request_timeout: Duration::from_secs(5),
        ..Default::default()
    }
}

fn init_data(tg_id: i64) -> String {
    let user = format!(r#"{{"id":{},"first_name":"Roundtrip"}}"#, tg_id);
    let auth_date = chrono::Utc::now().timestamp().to_string();
    sign_init_data(&[("user", &user), ("auth_date", &auth_date)], BOT_TOKEN).unwrap()
}

#[tokio::test]
async fn test_session_taps_reach_server() {
    let addr = spawn_server().await;
    let config = client_config(addr, init_data(4242));
    let api = ApiClient::new(&config).unwrap();

    let mut session = GameSession::new(api.clone(), config);
    session.load_state().await.unwrap();
    assert_eq!(session.player().tg_id, 4242);
    assert_eq!(session.player().name, "Roundtrip");
    assert_eq!(session.player().coins, 0);

    let (tap_tx, tap_rx) = mpsc::channel(64);
    let (stop_tx, stop_rx) = oneshot::channel();
    let driver = tokio::spawn(async move {
        SessionDriver::new(session).run(tap_rx, stop_rx, &mut ()).await
    });

    for i in 0..30 {
        tap_tx.send(WorldPoint::new(i as f32, 0.0, 0.0)).await.unwrap();
    }
    tokio::time::sleep(Duration::from_millis(300)).await;
    stop_tx.send(()).unwrap();

    let summary = driver.await.unwrap();
    assert_eq!(summary.taps_recorded, 30);
    assert_eq!(summary.taps_acknowledged, 30);
    assert_eq!(summary.taps_dropped, 0);
    assert_eq!(summary.final_coins, 30);

    let state = api.fetch_state().await.unwrap();
    assert_eq!(state.player.coins, Some(30));
}

#[tokio::test]
async fn test_model_and_wallet_roundtrip() {
    let addr = spawn_server().await;
    let config = client_config(addr, init_data(99));
    let api = ApiClient::new(&config).unwrap();

    let mut session = GameSession::new(api.clone(), config);
    session.load_state().await.unwrap();

    session.update_model_url("https://cdn.example/hero.glb").await.unwrap();
    session.connect_wallet("UQroundtrip").await.unwrap();
    assert_eq!(session.player().model_url.as_deref(), Some("https://cdn.example/hero.glb"));
    assert_eq!(session.player().ton_wallet.as_deref(), Some("UQroundtrip"));

    let state = api.fetch_state().await.unwrap();
    assert_eq!(state.player.model_url, Some(Some("https://cdn.example/hero.glb".to_string())));
    assert_eq!(state.player.ton_wallet, Some(Some("UQroundtrip".to_string())));

    let err = api.update_model_url("").await.unwrap_err();
    assert!(matches!(err, SyncError::Status { status: 400, .. }));
}

#[tokio::test]
async fn test_forged_init_data_unauthorized() {
    let addr = spawn_server().await;
    let forged = sign_init_data(&[("user", r#"{"id":1}"#)], "1:not-the-bot").unwrap();
    let api = ApiClient::new(&client_config(addr, forged)).unwrap();

    let err = api.fetch_state().await.unwrap_err();
    assert!(err.is_unauthorized());
}
