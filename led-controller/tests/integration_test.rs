//! Integration tests for the LED controller

use axum::body::Body;
use axum::http::{Request, StatusCode};
use led_controller::color::{BLUE, OFF, RED};
use led_controller::{
    api, spawn_controller, spawn_render_loop, spawn_scene_engine, Color, Command,
    ControllerConfig, ControllerError, ControllerHandle, Scene, SceneLibrary, SimulatedRenderer,
};
use std::time::Duration;
use tower::ServiceExt;

const LEDS: usize = 10;

fn library() -> SceneLibrary {
    let mut library = SceneLibrary::with_builtins();
    library.insert(Scene::solid("solid-red", RED));
    library
}

fn controller() -> ControllerHandle {
    let config = ControllerConfig {
        led_count: LEDS,
        ..Default::default()
    };
    spawn_controller(config, library()).unwrap().0
}

async fn eventually<F: Fn() -> bool>(timeout: Duration, check: F) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    check()
}

#[tokio::test]
async fn test_set_led_then_snapshot() {
    let handle = controller();

    for i in 0..LEDS {
        let color = Color::new(i as u8 * 10, 0, 0);
        let before = handle.snapshot();

        handle
            .submit(Command::SetLed { index: i, color })
            .await
            .unwrap();

        let after = handle.snapshot();
        for j in 0..LEDS {
            if j == i {
                assert_eq!(after.get(j).unwrap(), color);
            } else {
                assert_eq!(after.get(j).unwrap(), before.get(j).unwrap());
            }
        }
    }
}

#[tokio::test]
async fn test_invalid_brightness_leaves_state_unchanged() {
    let handle = controller();
    handle.submit(Command::SetBrightness(0.4)).await.unwrap();

    for value in [1.5, -0.2, f32::NAN, f32::INFINITY] {
        let err = handle.submit(Command::SetBrightness(value)).await.unwrap_err();
        assert!(matches!(err, ControllerError::InvalidValue(_)));
        assert_eq!(handle.snapshot().brightness(), 0.4);
    }
}

#[tokio::test]
async fn test_scene_tick_overwrites_direct_write() {
    let handle = controller();
    let _engine = spawn_scene_engine(handle.clone(), 30);

    handle
        .submit(Command::ActivateScene("solid-red".to_string()))
        .await
        .unwrap();
    handle
        .submit(Command::SetLed {
            index: 0,
            color: BLUE,
        })
        .await
        .unwrap();

    let restored = eventually(Duration::from_millis(500), || {
        handle.snapshot().leds().iter().all(|c| *c == RED)
    })
    .await;

    assert!(restored, "scene tick did not repaint LED 0");
    assert_eq!(handle.active_scene().unwrap().name(), "solid-red");
}

#[tokio::test]
async fn test_direct_write_persists_without_scene() {
    let handle = controller();
    let _engine = spawn_scene_engine(handle.clone(), 30);

    handle
        .submit(Command::ActivateScene("solid-red".to_string()))
        .await
        .unwrap();
    handle
        .submit(Command::ActivateScene("none".to_string()))
        .await
        .unwrap();
    handle
        .submit(Command::SetLed {
            index: 0,
            color: BLUE,
        })
        .await
        .unwrap();

    tokio::time::sleep(Duration::from_millis(150)).await;
    assert_eq!(handle.snapshot().get(0).unwrap(), BLUE);
    assert_eq!(handle.snapshot().get(1).unwrap(), RED);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_set_all_is_atomic() {
    let handle = controller();

    let reader = {
        let handle = handle.clone();
        tokio::spawn(async move {
            let mut observed = 0;
            for _ in 0..2000 {
                let snapshot = handle.snapshot();
                let first = snapshot.leds()[0];
                assert!(
                    snapshot.leds().iter().all(|c| *c == first),
                    "mixed snapshot: {:?}",
                    snapshot.leds()
                );
                observed += 1;
                tokio::task::yield_now().await;
            }
            observed
        })
    };

    let mut writers = Vec::new();
    for i in 0..200 {
        let handle = handle.clone();
        let color = if i % 2 == 0 { RED } else { BLUE };
        writers.push(tokio::spawn(async move {
            handle.submit(Command::SetAll(color)).await.unwrap()
        }));
    }

    let mut seqs = Vec::new();
    for writer in writers {
        seqs.push(writer.await.unwrap().seq);
    }
    assert_eq!(reader.await.unwrap(), 2000);

    // Every command got a distinct place in the total order
    seqs.sort_unstable();
    seqs.dedup();
    assert_eq!(seqs.len(), 200);

    let last = handle.snapshot();
    assert!(last.leds().iter().all(|c| *c == RED) || last.leds().iter().all(|c| *c == BLUE));
}

#[tokio::test]
async fn test_unknown_scene_keeps_current() {
    let handle = controller();
    handle
        .submit(Command::ActivateScene("dreamy".to_string()))
        .await
        .unwrap();
    let before = handle.active_scene().unwrap();

    let err = handle
        .submit(Command::ActivateScene("nonexistent".to_string()))
        .await
        .unwrap_err();
    assert!(matches!(err, ControllerError::NotFound { .. }));

    let after = handle.active_scene().unwrap();
    assert_eq!(after.name(), "dreamy");
    assert_eq!(after.generation, before.generation);
}

#[tokio::test]
async fn test_brightness_keeps_logical_colors() {
    let handle = controller();

    let boot = handle.snapshot();
    assert!(boot.leds().iter().all(|c| *c == OFF));

    handle.submit(Command::SetBrightness(0.5)).await.unwrap();

    let snapshot = handle.snapshot();
    assert_eq!(snapshot.leds(), boot.leds());
    assert_eq!(snapshot.brightness(), 0.5);
}

#[tokio::test]
async fn test_renderer_receives_scaled_frame() {
    let handle = controller();
    let renderer = SimulatedRenderer::new(LEDS);
    let probe = renderer.clone();
    let _render = spawn_render_loop(handle.clone(), Box::new(renderer), 60);

    handle.submit(Command::SetAll(Color::new(200, 100, 0))).await.unwrap();
    handle.submit(Command::SetBrightness(0.5)).await.unwrap();

    let rendered = eventually(Duration::from_millis(500), || {
        probe.last_frame() == vec![Color::new(100, 50, 0); LEDS]
    })
    .await;
    assert!(rendered);

    // Stored colors stay unscaled
    assert_eq!(handle.snapshot().get(0).unwrap(), Color::new(200, 100, 0));
}

#[tokio::test]
async fn test_wake_trigger_activates_wake_scene() {
    let handle = controller();
    handle.submit_nowait(Command::WakeTriggered).unwrap();

    let active = eventually(Duration::from_millis(500), || {
        handle.active_scene().map(|a| a.name().to_string()) == Some("idea".to_string())
    })
    .await;
    assert!(active);
}

// HTTP API

async fn call(
    app: axum::Router,
    method: &str,
    uri: &str,
    body: Option<&str>,
) -> (StatusCode, serde_json::Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null)
    };
    (status, json)
}

#[tokio::test]
async fn test_api_health() {
    let app = api::router(controller());
    let (status, body) = call(app, "GET", "/api/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_api_set_and_get_led() {
    let handle = controller();
    let app = api::router(handle.clone());

    let (status, body) = call(
        app.clone(),
        "PUT",
        "/api/leds/3",
        Some(r#"{"r": 0, "g": 0, "b": 255}"#),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["seq"].as_u64().unwrap() > 0);

    let (status, body) = call(app.clone(), "GET", "/api/leds/3", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["b"], 255);
    assert_eq!(body["hex"], "#0000FF");

    let (status, body) = call(app, "GET", "/api/leds", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], LEDS);
    assert_eq!(body["leds"][3]["b"], 255);
    assert_eq!(body["leds"][2]["b"], 0);
}

#[tokio::test]
async fn test_api_validation_errors() {
    let app = api::router(controller());

    let (status, _) = call(
        app.clone(),
        "PUT",
        "/api/leds/99",
        Some(r#"{"r": 1, "g": 1, "b": 1}"#),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(
        app.clone(),
        "PUT",
        "/api/leds",
        Some(r#"{"r": 300, "g": 0, "b": 0}"#),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(
        app.clone(),
        "PUT",
        "/api/brightness",
        Some(r#"{"brightness": 1.5}"#),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = call(app, "GET", "/api/brightness", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["brightness"], 1.0);
}

#[tokio::test]
async fn test_api_set_all_hex() {
    let handle = controller();
    let app = api::router(handle.clone());

    let (status, _) = call(app, "PUT", "/api/leds", Some(r##"{"hex": "#FF0000"}"##)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(handle.snapshot().leds().iter().all(|c| *c == RED));
}

#[tokio::test]
async fn test_api_scenes() {
    let handle = controller();
    let app = api::router(handle.clone());

    let (status, body) = call(app.clone(), "POST", "/api/scenes/solid-red", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["scene"], "solid-red");

    let (status, body) = call(app.clone(), "GET", "/api/scenes", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["current_scene"], "solid-red");
    assert_eq!(body["animated"], false);
    let names: Vec<String> = serde_json::from_value(body["scenes"].clone()).unwrap();
    assert!(names.contains(&"idea".to_string()));
    assert!(names.contains(&"solid-red".to_string()));

    let (status, body) = call(app, "POST", "/api/scenes/nonexistent", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["available_scenes"].as_array().unwrap().len() >= 12);
    assert_eq!(handle.active_scene().unwrap().name(), "solid-red");
}

#[tokio::test]
async fn test_api_malformed_bodies_are_bad_requests() {
    let handle = controller();
    let app = api::router(handle.clone());

    for (uri, body) in [
        ("/api/leds", r#"{"r": 1.5, "g": 0, "b": 0}"#),
        ("/api/leds/2", r#"{"r": "red"}"#),
        ("/api/leds", "not json"),
        ("/api/brightness", r#"{"brightness": "high"}"#),
        ("/api/brightness", r#"{}"#),
    ] {
        let (status, json) = call(app.clone(), "PUT", uri, Some(body)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{} {}", uri, body);
        assert!(json["error"].is_string(), "{} {}", uri, body);
    }

    let snapshot = handle.snapshot();
    assert!(snapshot.leds().iter().all(|c| *c == OFF));
    assert_eq!(snapshot.brightness(), 1.0);
}

#[test]
fn test_unacknowledged_submit_times_out() {
    let serializer_rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    let client_rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();

    // The serializer task only runs while serializer_rt is driven
    let handle = {
        let _guard = serializer_rt.enter();
        let config = ControllerConfig {
            led_count: LEDS,
            ack_timeout: Duration::from_millis(50),
            ..Default::default()
        };
        spawn_controller(config, library()).unwrap().0
    };

    let err = client_rt
        .block_on(handle.submit(Command::SetAll(RED)))
        .unwrap_err();
    assert!(matches!(err, ControllerError::SubmissionTimeout(_)));

    let (status, body) = client_rt.block_on(call(
        api::router(handle.clone()),
        "PUT",
        "/api/leds",
        Some(r#"{"r": 0, "g": 0, "b": 255}"#),
    ));
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert!(body["error"].is_string());
    assert!(handle.snapshot().leds().iter().all(|c| *c == OFF));

    // Timed-out commands still apply once the serializer gets to them
    serializer_rt.block_on(async { tokio::time::sleep(Duration::from_millis(20)).await });
    assert!(handle.snapshot().leds().iter().all(|c| *c == BLUE));

    let ack = serializer_rt
        .block_on(handle.submit(Command::SetBrightness(0.5)))
        .unwrap();
    assert_eq!(ack.seq, 3);
    assert_eq!(handle.snapshot().brightness(), 0.5);
}
