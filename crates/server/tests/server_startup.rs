use std::io::Write;
use std::net::TcpListener;
use std::path::Path;
use std::time::Duration;

use reqwest::Client;
use tempfile::{NamedTempFile, TempDir};
use tokio::time::{sleep, timeout};

/// Find an available port
fn get_available_port() -> u16 {
    TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}

/// Create a minimal valid config with the database inside `data_dir`
fn minimal_config(port: u16, data_dir: &Path) -> String {
    format!(
        r#"
[server]
host = "127.0.0.1"
port = {}

[database]
path = "{}"
"#,
        port,
        data_dir.join("manga-admin.db").display()
    )
}

fn write_config(content: &str) -> NamedTempFile {
    let mut temp_file = NamedTempFile::new().unwrap();
    temp_file.write_all(content.as_bytes()).unwrap();
    temp_file.flush().unwrap();
    temp_file
}

/// Spawn the server and return a handle
async fn spawn_server(config_path: &Path) -> tokio::process::Child {
    tokio::process::Command::new(env!("CARGO_BIN_EXE_manga-admin"))
        .env("MANGA_ADMIN_CONFIG", config_path)
        .env("RUST_LOG", "error") // Quiet logs during tests
        .kill_on_drop(true)
        .spawn()
        .expect("Failed to spawn server")
}

/// Run the binary to completion with the given config path
async fn run_to_exit(config_path: &Path) -> std::process::Output {
    timeout(
        Duration::from_secs(5),
        tokio::process::Command::new(env!("CARGO_BIN_EXE_manga-admin"))
            .env("MANGA_ADMIN_CONFIG", config_path)
            .env("RUST_LOG", "error")
            .output(),
    )
    .await
    .expect("Command timed out")
    .expect("Failed to execute command")
}

/// Wait for server to be ready
async fn wait_for_server(port: u16, max_attempts: u32) -> bool {
    let client = Client::new();
    for _ in 0..max_attempts {
        if client
            .get(format!("http://127.0.0.1:{}/api/v1/health", port))
            .send()
            .await
            .is_ok()
        {
            return true;
        }
        sleep(Duration::from_millis(50)).await;
    }
    false
}

#[tokio::test]
async fn test_health_endpoint() {
    let port = get_available_port();
    let data_dir = TempDir::new().unwrap();
    let config_file = write_config(&minimal_config(port, data_dir.path()));

    let mut server = spawn_server(config_file.path()).await;

    assert!(
        wait_for_server(port, 40).await,
        "Server did not start in time"
    );

    let client = Client::new();
    let response = client
        .get(format!("http://127.0.0.1:{}/api/v1/health", port))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let json: serde_json::Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(json["status"], "ok");

    server.kill().await.ok();
}

#[tokio::test]
async fn test_config_endpoint_reports_sequencer_settings() {
    let port = get_available_port();
    let data_dir = TempDir::new().unwrap();
    let config_file = write_config(&minimal_config(port, data_dir.path()));

    let mut server = spawn_server(config_file.path()).await;

    assert!(
        wait_for_server(port, 40).await,
        "Server did not start in time"
    );

    let client = Client::new();
    let response = client
        .get(format!("http://127.0.0.1:{}/api/v1/config", port))
        .send()
        .await
        .expect("Failed to send request");

    assert!(response.status().is_success());

    let json: serde_json::Value = response.json().await.expect("Failed to parse JSON");
    assert_eq!(json["server"]["port"], port);
    assert_eq!(json["sequencer"]["max_conflict_retries"], 1);
    assert_eq!(json["sequencer"]["chapter_turns"], "auto");

    server.kill().await.ok();
}

#[tokio::test]
async fn test_upload_against_running_server() {
    let port = get_available_port();
    let data_dir = TempDir::new().unwrap();
    let config_file = write_config(&minimal_config(port, data_dir.path()));

    let mut server = spawn_server(config_file.path()).await;

    assert!(
        wait_for_server(port, 40).await,
        "Server did not start in time"
    );

    let client = Client::new();
    let base = format!("http://127.0.0.1:{}/api/v1", port);

    let manga: serde_json::Value = client
        .post(format!("{}/manga", base))
        .json(&serde_json::json!({ "title": "Startup Check" }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let chapter: serde_json::Value = client
        .post(format!("{}/manga/{}/chapters", base, manga["id"].as_str().unwrap()))
        .json(&serde_json::json!({ "chapter_number": 1 }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let response = client
        .post(format!(
            "{}/chapters/{}/pages",
            base,
            chapter["id"].as_str().unwrap()
        ))
        .header("X-Requested-By", "startup-test")
        .json(&serde_json::json!({ "files": ["a.png", "b.png"] }))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), reqwest::StatusCode::CREATED);
    let outcome: serde_json::Value = response.json().await.unwrap();
    assert_eq!(outcome["start"], 1);
    assert_eq!(outcome["end"], 2);

    server.kill().await.ok();
}

#[tokio::test]
async fn test_missing_config_file_exits_with_error() {
    let result = run_to_exit(Path::new("/nonexistent/config.toml")).await;
    assert!(!result.status.success());
}

#[tokio::test]
async fn test_zero_port_exits_with_error() {
    let config_file = write_config(
        r#"
[server]
port = 0
"#,
    );

    let result = run_to_exit(config_file.path()).await;
    assert!(!result.status.success());
}

#[tokio::test]
async fn test_excessive_conflict_retries_exits_with_error() {
    let data_dir = TempDir::new().unwrap();
    let config = format!(
        "{}\n[sequencer]\nmax_conflict_retries = 9\n",
        minimal_config(get_available_port(), data_dir.path())
    );
    let config_file = write_config(&config);

    let result = run_to_exit(config_file.path()).await;
    assert!(!result.status.success());
}
