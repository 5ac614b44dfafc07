use reqwest::Url;
use wiremock::{
    matchers::{body_json, header, method, path, query_param},
    Mock, MockServer, ResponseTemplate,
};

use tapdeck::{
    config::Config,
    remote::{Client, Volume},
    retry::RetryPolicy,
    secrets::RefreshSecret,
};

const DEVICES: &str = r#"{
    "devices": [
        {"id": "xyz", "name": "Office", "type": "Computer", "is_active": true},
        {"id": "abc", "name": "Kitchen", "type": "Speaker", "volume_percent": 35, "supports_volume": true}
    ]
}"#;

fn client(server: &MockServer) -> Client {
    let secret = RefreshSecret {
        client_id: "id".to_owned(),
        client_secret: "secret".to_owned(),
        refresh_token: "refresh".to_owned(),
    };
    let config = Config::new(secret, "Kitchen")
        .unwrap()
        .with_base_url(&Url::parse(&server.uri()).unwrap())
        .with_retry(RetryPolicy::immediate(3));
    Client::new(&config).unwrap()
}

async fn mount_token(server: &MockServer, expected: u64) {
    Mock::given(method("POST"))
        .and(path("/api/token"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(r#"{"access_token":"tok","token_type":"Bearer","expires_in":3600}"#),
        )
        .expect(expected)
        .mount(server)
        .await;
}

async fn mount_devices(server: &MockServer, body: &str, expected: u64) {
    Mock::given(method("GET"))
        .and(path("/v1/me/player/devices"))
        .and(header("authorization", "Bearer tok"))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .expect(expected)
        .mount(server)
        .await;
}

#[tokio::test]
async fn cold_start_plays_on_named_device() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    mount_devices(&server, DEVICES, 1).await;
    Mock::given(method("PUT"))
        .and(path("/v1/me/player/play"))
        .and(query_param("device_id", "abc"))
        .and(body_json(serde_json::json!({
            "context_uri": "spotify:album:1DFixLWuPkv3KT3TnV35m3",
            "offset": {"position": 0, "position_ms": 0}
        })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let mut client = client(&server);
    assert_eq!(client.play("spotify:album:1DFixLWuPkv3KT3TnV35m3").await, 204);
    assert_eq!(client.device_id(), Some("abc"));
    assert!(client.is_token_valid());
}

#[tokio::test]
async fn device_id_is_reused() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    mount_devices(&server, DEVICES, 1).await;
    Mock::given(method("PUT"))
        .and(path("/v1/me/player/play"))
        .respond_with(ResponseTemplate::new(204))
        .expect(2)
        .mount(&server)
        .await;

    let mut client = client(&server);
    assert_eq!(client.play("spotify:playlist:37i9dQZF1DXcBWIGoYBM5M").await, 204);
    assert_eq!(client.play("spotify:playlist:37i9dQZF1DXcBWIGoYBM5M").await, 204);
}

#[tokio::test]
async fn track_links_are_sent_as_uris() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    mount_devices(&server, DEVICES, 1).await;
    Mock::given(method("PUT"))
        .and(path("/v1/me/player/play"))
        .and(body_json(serde_json::json!({
            "uris": ["spotify:track:4uLU6hMCjMI75M1A2tKUQC"],
            "offset": {"position": 0, "position_ms": 0}
        })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let mut client = client(&server);
    let status = client
        .play("https://open.spotify.com/intl-de/track/4uLU6hMCjMI75M1A2tKUQC?si=abc")
        .await;
    assert_eq!(status, 204);
}

#[tokio::test]
async fn play_without_device_is_not_found() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    mount_devices(&server, r#"{"devices":[]}"#, 3).await;
    Mock::given(path("/v1/me/player/play"))
        .respond_with(ResponseTemplate::new(204))
        .expect(0)
        .mount(&server)
        .await;

    let mut client = client(&server);
    assert_eq!(client.play("spotify:album:1DFixLWuPkv3KT3TnV35m3").await, 404);
    assert_eq!(client.device_id(), None);
}

#[tokio::test]
async fn play_without_token_is_unauthorized() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/token"))
        .respond_with(ResponseTemplate::new(400).set_body_string(r#"{"error":"invalid_grant"}"#))
        .expect(3)
        .mount(&server)
        .await;
    Mock::given(path("/v1/me/player/devices"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;
    Mock::given(path("/v1/me/player/play"))
        .respond_with(ResponseTemplate::new(204))
        .expect(0)
        .mount(&server)
        .await;

    let mut client = client(&server);
    assert_eq!(client.play("spotify:album:1DFixLWuPkv3KT3TnV35m3").await, 401);
    assert!(!client.is_token_valid());
}

#[tokio::test]
async fn shuffle_targets_device() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    mount_devices(&server, DEVICES, 1).await;
    Mock::given(method("PUT"))
        .and(path("/v1/me/player/shuffle"))
        .and(query_param("state", "true"))
        .and(query_param("device_id", "abc"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/v1/me/player/shuffle"))
        .and(query_param("state", "false"))
        .and(query_param("device_id", "abc"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let mut client = client(&server);
    assert_eq!(client.shuffle().await, 204);
    assert_eq!(client.set_shuffle(false).await, 204);

    let shuffle = server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .find(|request| request.url.path() == "/v1/me/player/shuffle")
        .unwrap();
    assert_eq!(shuffle.url.query(), Some("state=true&device_id=abc"));
}

#[tokio::test]
async fn skip_without_device_goes_to_active_device() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    mount_devices(&server, r#"{"devices":[{"id":"xyz","name":"Office"}]}"#, 3).await;
    Mock::given(method("POST"))
        .and(path("/v1/me/player/next"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let mut client = client(&server);
    assert_eq!(client.next().await, 204);

    let next = server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .find(|request| request.url.path() == "/v1/me/player/next")
        .unwrap();
    assert_eq!(next.url.query(), None);
    assert_eq!(next.body, b"{}");
}

#[tokio::test]
async fn vanished_device_is_looked_up_again() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    mount_devices(&server, DEVICES, 2).await;
    Mock::given(method("POST"))
        .and(path("/v1/me/player/next"))
        .respond_with(ResponseTemplate::new(404))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/me/player/next"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let mut client = client(&server);
    assert_eq!(client.next().await, 404);
    assert_eq!(client.device_id(), None);
    assert_eq!(client.next().await, 204);
    assert_eq!(client.device_id(), Some("abc"));
}

#[tokio::test]
async fn volume_is_set_on_device() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    mount_devices(&server, DEVICES, 1).await;
    Mock::given(method("PUT"))
        .and(path("/v1/me/player/volume"))
        .and(query_param("volume_percent", "40"))
        .and(query_param("device_id", "abc"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let mut client = client(&server);
    let volume = Volume::try_from(40_u8).unwrap();
    assert_eq!(client.set_volume(volume).await, 204);
}

#[tokio::test]
async fn volume_is_sent_to_device_without_volume_support() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    mount_devices(
        &server,
        r#"{"devices":[{"id":"abc","name":"Kitchen","supports_volume":false}]}"#,
        1,
    )
    .await;
    Mock::given(method("PUT"))
        .and(path("/v1/me/player/volume"))
        .and(query_param("volume_percent", "40"))
        .and(query_param("device_id", "abc"))
        .respond_with(ResponseTemplate::new(403))
        .expect(1)
        .mount(&server)
        .await;

    let mut client = client(&server);
    let volume = "40%".parse::<Volume>().unwrap();
    assert_eq!(client.set_volume(volume).await, 403);

    let device = client.device().unwrap();
    assert_eq!(device.id(), Some("abc"));
    assert!(!device.supports_volume);
}

#[tokio::test]
async fn reset_state_looks_up_device_again() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    mount_devices(&server, DEVICES, 2).await;

    let mut client = client(&server);
    assert_eq!(client.resolve_device().await.as_deref(), Some("abc"));

    client.reset_state().await;
    assert_eq!(client.device_id(), Some("abc"));
    assert!(client.is_token_valid());
}

#[tokio::test]
async fn devices_are_listed() {
    let server = MockServer::start().await;
    mount_token(&server, 1).await;
    mount_devices(&server, DEVICES, 1).await;

    let mut client = client(&server);
    let devices = client.devices().await.unwrap();
    assert_eq!(devices.len(), 2);

    let kitchen = devices.find("Kitchen").unwrap();
    assert_eq!(kitchen.id(), Some("abc"));
    assert_eq!(kitchen.volume_percent, Some(35));
    assert_eq!(kitchen.to_string(), "Kitchen (abc) [Speaker] volume 35%");
}
