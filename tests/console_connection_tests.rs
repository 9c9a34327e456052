mod common;

use common::{AuthMode, FakeConsoleServer, TEST_PASSWORD};
use rcon_relay::{Console, RconConnection, RconError};

#[tokio::test]
async fn test_connect_authenticates_and_executes() {
    let server = FakeConsoleServer::start().await;

    let mut connection = RconConnection::connect(&server.console_config(TEST_PASSWORD))
        .await
        .expect("handshake should succeed");

    assert_eq!(connection.execute("list").await.unwrap(), "ack:list");
    assert_eq!(connection.execute("time set day").await.unwrap(), "ack:time set day");
    connection.close().await.unwrap();

    assert_eq!(server.auth_attempts(), vec![TEST_PASSWORD.to_string()]);
    assert_eq!(server.received(), vec!["list", "time set day"]);
}

#[tokio::test]
async fn test_wrong_password_is_authentication_failure() {
    let server = FakeConsoleServer::start().await;

    let err = RconConnection::connect(&server.console_config("wrong"))
        .await
        .unwrap_err();

    assert!(err.is_authentication_failure(), "unexpected error: {err}");
    assert!(matches!(err, RconError::AuthenticationFailed { request_id: -1, .. }));
    assert!(server.received().is_empty());
}

#[tokio::test]
async fn test_wrong_response_type_is_authentication_failure() {
    let server = FakeConsoleServer::start_with(AuthMode::WrongType).await;

    let err = RconConnection::connect(&server.console_config(TEST_PASSWORD))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        RconError::AuthenticationFailed { packet_type: 0, .. }
    ));
}

#[tokio::test]
async fn test_server_hangup_during_handshake() {
    let server = FakeConsoleServer::start_with(AuthMode::Hangup).await;

    let err = RconConnection::connect(&server.console_config(TEST_PASSWORD))
        .await
        .unwrap_err();

    assert!(err.is_connection_closed(), "unexpected error: {err}");
    assert!(!err.is_authentication_failure());
}

#[tokio::test]
async fn test_refused_connection_is_transport_error() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let config = rcon_relay::config::ConsoleConfig {
        port,
        password: TEST_PASSWORD.to_string(),
        ..Default::default()
    };

    let err = RconConnection::connect(&config).await.unwrap_err();
    assert!(err.is_transport_error());
}
