//! Settings file round-trip tests

use ovpman_core::settings::Settings;
use ovpman_core::vpn::bandwidth::StatsSource;

#[test]
fn settings_round_trip_through_toml() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");

    let mut settings = Settings::default();
    settings.poll.reconcile_secs = 7;
    settings.bandwidth.capacity = 7200;
    settings.bandwidth.source = StatsSource::Device;
    settings.bus.session_service = "net.openvpn.v3.sessions.test".to_string();

    settings.to_file(&path).unwrap();
    let loaded = Settings::from_file(&path).unwrap();

    assert_eq!(loaded.poll.reconcile_secs, 7);
    assert_eq!(loaded.poll.display_secs, 1);
    assert_eq!(loaded.bandwidth.capacity, 7200);
    assert_eq!(loaded.bandwidth.source, StatsSource::Device);
    assert_eq!(loaded.bus.session_service, "net.openvpn.v3.sessions.test");
}

#[test]
fn to_file_creates_parent_directories() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("ovpman").join("config.toml");

    Settings::default().to_file(&path).unwrap();
    assert!(path.exists());
}

#[test]
fn loading_garbage_is_a_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "this is not toml = = =").unwrap();

    assert!(Settings::from_file(&path).is_err());
}
