#![allow(dead_code)]

use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use reqwest::StatusCode;

pub const PASSWORD: &str = "s3cret";
// sha256("s3cret")
const PASSWORD_SHA256: &str = "1ec1c26b50d5d3c58d9583181af8076655fe00756bf7285940ba3670f99fcba0";

pub struct TestServer {
    pub port: u16,
    pub base_url: String,
    child: Child,
    scratch: PathBuf,
}

impl TestServer {
    fn spawn() -> Result<Self> {
        // Pick an unused port for isolation
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);

        let scratch = scratch_dir("server")?;
        let users_file = scratch.join("users.yaml");
        std::fs::write(&users_file, users_yaml())?;

        // Nothing listens on this port, so every model probe fails fast
        let dead_port = portpicker::pick_unused_port().context("failed to pick free port")?;

        let mut cmd = Command::new(env!("CARGO_BIN_EXE_projectdesk-server"));
        cmd.env("PROJECTDESK_PORT", port.to_string())
            .env("APP_ENV", "development")
            .env("JWT_SECRET", "integration-test-secret")
            .env("PROJECTDESK_USERS_FILE", &users_file)
            .env("CHAT_BASE_URL", format!("http://127.0.0.1:{}", dead_port))
            .env("CHAT_PROBE_TIMEOUT_SECS", "2")
            .env("GEMINI_API_KEY", "test-key")
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());

        let child = cmd.spawn().context("failed to spawn server binary")?;

        Ok(Self { port, base_url, child, scratch })
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let client = reqwest::Client::new();
        let deadline = Instant::now() + timeout;
        loop {
            if Instant::now() > deadline { break; }
            let url = format!("{}/health", self.base_url);
            if let Ok(resp) = client.get(&url).send().await {
                if resp.status() == StatusCode::OK {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(150)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
        let _ = std::fs::remove_dir_all(&self.scratch);
    }
}

pub async fn start_server() -> Result<TestServer> {
    let server = TestServer::spawn()?;
    server.wait_ready(Duration::from_secs(10)).await?;
    Ok(server)
}

pub fn scratch_dir(label: &str) -> Result<PathBuf> {
    let dir = std::env::temp_dir().join(format!(
        "projectdesk-{}-{}-{}",
        label,
        std::process::id(),
        portpicker::pick_unused_port().unwrap_or(0)
    ));
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

fn users_yaml() -> String {
    format!(
        r#"users:
  - email: admin@example.com
    name: Ada Admin
    role: Admin
    password_sha256: {hash}
  - email: client@example.com
    name: Cid Client
    role: Client
    password_sha256: {hash}
"#,
        hash = PASSWORD_SHA256
    )
}

pub async fn login(server: &TestServer, email: &str) -> Result<String> {
    let res = reqwest::Client::new()
        .post(format!("{}/auth/login", server.base_url))
        .json(&serde_json::json!({ "email": email, "password": PASSWORD }))
        .send()
        .await?;
    anyhow::ensure!(res.status() == StatusCode::OK, "login failed: {}", res.status());

    let body = res.json::<serde_json::Value>().await?;
    body["token"]
        .as_str()
        .map(str::to_string)
        .context("login response has no token")
}
