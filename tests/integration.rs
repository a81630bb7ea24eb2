use tcl_ac::{AcMonitor, TclClient};

/// Live-cloud smoke test. Run with:
///   TCL_USERNAME=... TCL_PASSWORD=... cargo test --test integration -- --ignored
#[tokio::test]
#[ignore]
async fn login_discover_and_poll() {
    tracing_subscriber::fmt().try_init().ok();

    let username = std::env::var("TCL_USERNAME").expect("TCL_USERNAME not set");
    let password = std::env::var("TCL_PASSWORD").expect("TCL_PASSWORD not set");

    let client = TclClient::builder(username, password).build();
    client
        .validate_credentials()
        .await
        .expect("credential validation failed");

    let devices = client.get_devices().await.expect("device listing failed");
    assert!(!devices.is_empty(), "account should have at least one device");
    for device in &devices {
        println!("{} ({})", device.nick_name, device.device_id);
    }

    let monitor = AcMonitor::builder(client)
        .devices(devices.iter().map(|d| d.device_id.clone()))
        .build();

    let first = &devices[0].device_id;
    let state = monitor.poll_now(first).await.expect("poll failed");
    println!("{first} -> {state:?}");
    assert!(monitor.available(first).unwrap_or(false));
}
