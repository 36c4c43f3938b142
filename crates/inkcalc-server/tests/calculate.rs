//! End-to-end: board → HTTP client → stub server.

use inkcalc_core::{
    Board, CalcConfig, CalcError, CalculateRequest, HttpBackend, RecognitionBackend,
    RecognitionResult, SessionState, ViewportConfig,
};
use inkcalc_server::{AppState, router};
use kurbo::Point;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

async fn spawn(state: AppState) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = router(Arc::new(state));
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn config(base_url: String) -> CalcConfig {
    CalcConfig {
        base_url,
        request_timeout: Some(Duration::from_secs(5)),
        ..CalcConfig::default()
    }
}

fn board(config: &CalcConfig) -> Board {
    let viewport = ViewportConfig {
        width: 320.0,
        height: 240.0,
        device_pixel_ratio: 1.0,
        ..ViewportConfig::default()
    };
    Board::new(config, &viewport).unwrap()
}

fn scribble(board: &mut Board) {
    board.pointer_down(Point::new(40.0, 40.0));
    board.pointer_move(Point::new(120.0, 90.0));
    board.pointer_move(Point::new(200.0, 60.0));
    board.pointer_up();
}

#[tokio::test]
async fn test_canned_answers_reach_the_board() {
    let base = spawn(AppState::with_responses(vec![
        RecognitionResult::new("x", "5", true),
        RecognitionResult::new("x+2", "7", false),
    ]))
    .await;
    let config = config(base);
    let backend = HttpBackend::new(&config).unwrap();
    let mut board = board(&config);
    scribble(&mut board);

    board.calculate(&backend).await.unwrap();
    board.tick(Instant::now() + Duration::from_secs(1));

    let snapshot = board.snapshot();
    assert_eq!(snapshot.state, SessionState::Idle);
    assert_eq!(snapshot.variables.get("x").map(String::as_str), Some("5"));
    assert_eq!(snapshot.annotations.len(), 2);
    assert_eq!(snapshot.annotations[1].content(), "\\(x+2 = 7\\)");
    assert_eq!(snapshot.annotations[0].position(), Point::new(160.0, 120.0));
    assert!(board.surface().is_blank());
}

#[tokio::test]
async fn test_ink_summary_without_canned_answers() {
    let config = config(spawn(AppState::new()).await);
    let backend = HttpBackend::new(&config).unwrap();
    let mut board = board(&config);
    scribble(&mut board);

    board.calculate(&backend).await.unwrap();
    board.tick(Instant::now() + Duration::from_secs(1));
    assert_eq!(board.latest_result().map(|(expr, _)| expr), Some("ink"));
}

#[tokio::test]
async fn test_server_errors_become_notices() {
    let config = config(spawn(AppState::with_responses(Vec::new())).await);
    let backend = HttpBackend::new(&config).unwrap();
    let mut board = board(&config);
    scribble(&mut board);

    let err = board.calculate(&backend).await.unwrap_err();
    assert_eq!(err, CalcError::backend("Error processing Drawing"));
    assert!(board.is_idle());
    assert!(!board.surface().is_blank());
    assert_eq!(
        board.notice(Instant::now()),
        Some("Server error: Error processing Drawing")
    );
}

#[tokio::test]
async fn test_invalid_image_is_rejected() {
    let config = config(spawn(AppState::new()).await);
    let backend = HttpBackend::new(&config).unwrap();
    let request = CalculateRequest {
        image: "data:image/png;base64,bm90IGEgcG5n".to_string(),
        dict_of_vars: BTreeMap::new(),
    };

    match backend.calculate(&request).await {
        Err(CalcError::Backend { message }) => {
            assert!(message.starts_with("Invalid Drawing data: "), "{}", message)
        }
        other => panic!("unexpected outcome: {:?}", other),
    }
}

#[tokio::test]
async fn test_unreachable_backend() {
    // Nothing listens on the discard port.
    let config = config("http://127.0.0.1:9".to_string());
    let backend = HttpBackend::new(&config).unwrap();
    let mut board = board(&config);
    scribble(&mut board);

    let err = board.calculate(&backend).await.unwrap_err();
    assert!(matches!(err, CalcError::Backend { .. }), "{:?}", err);
    assert!(board.is_idle());
    assert!(!board.surface().is_blank());
}

#[tokio::test]
async fn test_silent_backend_times_out() {
    // Accepts connections and never answers.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });

    let config = CalcConfig {
        request_timeout: Some(Duration::from_millis(300)),
        ..config(format!("http://{}", addr))
    };
    let backend = HttpBackend::new(&config).unwrap();
    let mut board = board(&config);
    scribble(&mut board);

    let err = board.calculate(&backend).await.unwrap_err();
    assert_eq!(err, CalcError::Timeout);
    assert!(board.is_idle());
    assert!(!board.surface().is_blank());
    assert_eq!(board.notice(Instant::now()), Some("Server error: request timed out"));
}

#[tokio::test]
async fn test_health() {
    let base = spawn(AppState::new()).await;
    let response = reqwest::get(format!("{}/health", base)).await.unwrap();
    assert_eq!(response.text().await.unwrap(), "ok");
}
