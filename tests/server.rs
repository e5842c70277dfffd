//! HTTP end-to-end tests.
//!
//! Start the real server with the offline provider (template replies and
//! heuristic extraction) on a free port and drive it with `reqwest`.

use catalog_assistant::config::{parse_config, Config};
use catalog_assistant::server::run_server;
use serde_json::{json, Value};
use std::fs;
use tempfile::TempDir;

const CATALOG: &str = r#"{
  "products": [
    {
      "name": "Nano Silver Powder",
      "search_keywords": "gümüş, silver, ag",
      "applications": ["conductive ink", "antibacterial coating"],
      "price": 1250,
      "stock_status": "in stock"
    },
    {
      "name": "Copper Nanoparticles",
      "searchKeywords": ["bakır", "copper"],
      "currency": "USD"
    },
    { "name": "Graphene Oxide", "category": "Carbon" }
  ]
}"#;

fn test_config(tmp: &TempDir, port: u16) -> Config {
    let root = tmp.path();
    fs::write(root.join("products.json"), CATALOG).unwrap();
    let content = format!(
        r#"
[server]
bind = "127.0.0.1:{port}"

[catalog]
path = "{root}/products.json"
base_url = "https://www.example.com/arama"

[leads]
path = "{root}/leads/leads.jsonl"
"#,
        port = port,
        root = root.display()
    );
    parse_config(&content).unwrap()
}

fn find_free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

async fn wait_for_server(port: u16) {
    let client = reqwest::Client::new();
    let url = format!("http://127.0.0.1:{}/health", port);
    for _ in 0..50 {
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        if let Ok(resp) = client.get(&url).send().await {
            if resp.status().is_success() {
                return;
            }
        }
    }
    panic!("Server did not become ready within 5 seconds");
}

async fn start(tmp: &TempDir) -> (u16, tokio::task::JoinHandle<()>) {
    let port = find_free_port();
    let cfg = test_config(tmp, port);
    let handle = tokio::spawn(async move {
        run_server(&cfg).await.ok();
    });
    wait_for_server(port).await;
    (port, handle)
}

async fn chat(port: u16, body: Value) -> (u16, Value) {
    let resp = reqwest::Client::new()
        .post(format!("http://127.0.0.1:{}/api/chat", port))
        .json(&body)
        .send()
        .await
        .unwrap();
    let status = resp.status().as_u16();
    (status, resp.json().await.unwrap())
}

#[tokio::test]
async fn test_health_reports_catalog_size() {
    let tmp = TempDir::new().unwrap();
    let (port, handle) = start(&tmp).await;

    let body: Value = reqwest::get(format!("http://127.0.0.1:{}/health", port))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["products"], 3);
    assert!(body["version"].is_string());

    handle.abort();
}

#[tokio::test]
async fn test_empty_messages_is_bad_request() {
    let tmp = TempDir::new().unwrap();
    let (port, handle) = start(&tmp).await;

    let (status, body) = chat(port, json!({"messages": []})).await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "bad_request");

    let (status, _) = chat(port, json!({"messages": [{"role": "user", "content": "  "}]})).await;
    assert_eq!(status, 400);

    handle.abort();
}

#[tokio::test]
async fn test_product_question_gets_linked_reply() {
    let tmp = TempDir::new().unwrap();
    let (port, handle) = start(&tmp).await;

    let (status, body) = chat(
        port,
        json!({"messages": [{"role": "user", "content": "nano gümüş fiyatı"}], "sessionId": "web-1"}),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(body["success"], true);
    let message = body["message"].as_str().unwrap();
    assert!(
        message.contains(
            r#"<a href="https://www.example.com/arama?ara=Nano%20Silver%20Powder" target="_blank">Nano Silver Powder</a>, 1250 TL (in stock)"#
        ),
        "message was: {}",
        message
    );
    assert!(!message.contains("</a></a>"));

    handle.abort();
}

#[tokio::test]
async fn test_unmatched_query_then_contact_details_over_http() {
    let tmp = TempDir::new().unwrap();
    let (port, handle) = start(&tmp).await;

    let (status, first) = chat(
        port,
        json!({"messages": [{"role": "user", "content": "Epoksi ile 600 derece"}], "sessionId": "web-2"}),
    )
    .await;
    assert_eq!(status, 200);
    assert!(first["message"].as_str().unwrap().contains("phone number"));

    let (status, second) = chat(
        port,
        json!({
            "messages": [
                {"role": "user", "content": "Epoksi ile 600 derece"},
                {"role": "assistant", "content": first["message"]},
                {"role": "user", "content": "Ali Veli 05321234567"}
            ],
            "sessionId": "web-2"
        }),
    )
    .await;
    assert_eq!(status, 200);
    assert!(second["message"].as_str().unwrap().contains("Ali Veli"));

    let leads = fs::read_to_string(tmp.path().join("leads/leads.jsonl")).unwrap();
    let records: Vec<Value> = leads.lines().map(|l| serde_json::from_str(l).unwrap()).collect();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["name"], "Ali Veli");
    assert_eq!(records[0]["phone"], "05321234567");
    assert_eq!(records[0]["associated_product_query"], "Epoksi ile 600 derece");
    assert_eq!(records[0]["session_id"], "web-2");

    handle.abort();
}

#[tokio::test]
async fn test_catalog_reload() {
    let tmp = TempDir::new().unwrap();
    let (port, handle) = start(&tmp).await;

    fs::write(
        tmp.path().join("products.json"),
        r#"[{"name": "Zinc Oxide"}, {"name": "Titanium Dioxide"}]"#,
    )
    .unwrap();

    let client = reqwest::Client::new();
    let body: Value = client
        .post(format!("http://127.0.0.1:{}/api/catalog/reload", port))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["products"], 2);

    fs::write(tmp.path().join("products.json"), "not json").unwrap();
    let resp = client
        .post(format!("http://127.0.0.1:{}/api/catalog/reload", port))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 500);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "internal");

    let health: Value = client
        .get(format!("http://127.0.0.1:{}/health", port))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["products"], 2);

    handle.abort();
}
