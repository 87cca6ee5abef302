// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::support::{settle, Harness};
use sg_core::{StopStatus, TransportEvent};
use sg_daemon::{ExitKind, RESTART_EXIT_CODE};
use std::time::Duration;

// A restart request stops the fleet, archives the request,
// and the daemon asks to exit with the respawn code.
#[tokio::test]
async fn restart_request_stops_the_fleet_and_maps_to_exit_75() {
    assert_eq!(RESTART_EXIT_CODE, 75);

    let h = Harness::start();
    let mut events = h.daemon.events().subscribe();

    let requests = h.base.join("tmp/restart/requests");
    let rq = requests.clone();
    settle("restart queue ready", || rq.exists()).await;
    std::fs::write(requests.join("r1.json"), br#"{"reason":"config changed"}"#).unwrap();

    let kind = tokio::time::timeout(Duration::from_secs(5), h.daemon.wait())
        .await
        .expect("daemon did not shut down");
    assert_eq!(kind, ExitKind::Restart);

    // The request was archived, not left behind.
    assert!(h.base.join("tmp/restart/history/r1.json").exists());
    assert!(!h.base.join("tmp/restart/requests/r1.json").exists());
    assert!(!h.base.join("tmp/restart/processing/r1.json").exists());

    // The fleet stop was bracketed by stop events.
    let mut stops = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let TransportEvent::Stop { status } = event {
            stops.push(status);
        }
    }
    assert!(stops.contains(&StopStatus::Requested));
    assert!(stops.contains(&StopStatus::Completed));
}
