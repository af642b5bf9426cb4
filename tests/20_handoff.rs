mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::json;

#[tokio::test]
async fn handoff_code_round_trip_is_single_use() -> Result<()> {
    let server = common::start_server().await?;
    let client = reqwest::Client::new();
    let token = common::login(&server, "client@example.com").await?;

    let issued = client
        .post(format!("{}/auth/handoff", server.base_url))
        .bearer_auth(&token)
        .send()
        .await?;
    assert_eq!(issued.status(), StatusCode::OK);
    let issued = issued.json::<serde_json::Value>().await?;
    let code = issued["code"].as_str().expect("code").to_string();
    assert!(issued["expires_at"].is_string());

    let exchange = |code: String| {
        let client = client.clone();
        let url = format!("{}/auth/handoff/exchange", server.base_url);
        async move { client.post(url).json(&json!({ "code": code })).send().await }
    };

    let first = exchange(code.clone()).await?;
    assert_eq!(first.status(), StatusCode::OK);
    let parcel = first.json::<serde_json::Value>().await?;
    assert_eq!(parcel["token"], token.as_str());
    assert_eq!(parcel["role"], "Client");

    let second = exchange(code).await?;
    assert_eq!(second.status(), StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn handoff_issue_requires_token() -> Result<()> {
    let server = common::start_server().await?;

    let res = reqwest::Client::new()
        .post(format!("{}/auth/handoff", server.base_url))
        .send()
        .await?;

    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    Ok(())
}
