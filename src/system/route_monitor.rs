//! Follows default-route changes reported by `ip monitor route` and feeds
//! them into a [`ConnectivityObserver`].

use std::future::Future;
use std::process::Stdio;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::connectivity::ConnectivityObserver;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteEvent {
    DefaultAdded,
    DefaultDeleted,
}

/// Classify one line of `ip monitor route` output. Only default routes count.
///
/// format: [ROUTE]default via 192.168.1.1 dev eth0 proto dhcp metric 100
///         Deleted default via 192.168.1.1 dev eth0 ...
pub fn parse_monitor_line(line: &str) -> Option<RouteEvent> {
    let line = line.trim();
    let line = line.strip_prefix("[ROUTE]").unwrap_or(line).trim_start();
    match line.strip_prefix("Deleted ") {
        Some(route) => is_default(route).then_some(RouteEvent::DefaultDeleted),
        None => is_default(line).then_some(RouteEvent::DefaultAdded),
    }
}

fn is_default(route: &str) -> bool {
    route.split_whitespace().next() == Some("default")
}

/// Apply every default-route change read from `lines` to `observer`.
///
/// Each event is confirmed with `recheck`, since deleting one default route
/// may leave another in place. When the recheck cannot tell, the event itself
/// decides. Returns when the stream ends.
pub async fn follow<R, F, Fut>(
    lines: R,
    observer: &ConnectivityObserver,
    mut recheck: F,
) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    F: FnMut() -> Fut,
    Fut: Future<Output = Option<bool>>,
{
    let mut lines = lines.lines();
    while let Some(line) = lines.next_line().await? {
        let Some(event) = parse_monitor_line(&line) else {
            continue;
        };
        let reachable = recheck()
            .await
            .unwrap_or(event == RouteEvent::DefaultAdded);
        debug!(?event, reachable, "default route changed");
        observer.set_reachable(reachable);
    }
    Ok(())
}

/// Run `ip monitor route` until `shutdown` fires, keeping `observer` in step
/// with the default route. Without `ip` the observer keeps its initial state.
pub async fn watch_default_route(observer: ConnectivityObserver, shutdown: CancellationToken) {
    let spawned = tokio::process::Command::new("ip")
        .args(["monitor", "route"])
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn();
    let mut child = match spawned {
        Ok(child) => child,
        Err(e) => {
            warn!(error = %e, "cannot run 'ip monitor route', connectivity will not be tracked");
            return;
        }
    };
    let Some(stdout) = child.stdout.take() else {
        return;
    };

    info!("watching default route changes");
    tokio::select! {
        _ = shutdown.cancelled() => debug!("route monitor stopped"),
        res = follow(BufReader::new(stdout), &observer, current_reachability) => match res {
            Ok(()) => warn!("'ip monitor route' exited, connectivity no longer tracked"),
            Err(e) => warn!(error = %e, "reading route monitor output failed"),
        },
    }
}

async fn current_reachability() -> Option<bool> {
    tokio::task::spawn_blocking(super::network::reachability)
        .await
        .ok()
        .flatten()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connectivity::ConnectivityState;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_parse_monitor_line() {
        assert_eq!(
            parse_monitor_line("default via 192.168.1.1 dev eth0 proto dhcp metric 100"),
            Some(RouteEvent::DefaultAdded)
        );
        assert_eq!(
            parse_monitor_line("[ROUTE]default via fe80::1 dev wlan0 proto ra metric 600"),
            Some(RouteEvent::DefaultAdded)
        );
        assert_eq!(
            parse_monitor_line("Deleted default via 192.168.1.1 dev eth0 proto dhcp metric 100"),
            Some(RouteEvent::DefaultDeleted)
        );
        assert_eq!(parse_monitor_line("192.168.1.0/24 dev eth0 proto kernel scope link"), None);
        assert_eq!(parse_monitor_line("Deleted 10.0.0.0/8 via 10.1.1.1 dev tun0"), None);
        assert_eq!(parse_monitor_line(""), None);
    }

    #[tokio::test]
    async fn test_follow_drives_observer_transitions() {
        let output: &[u8] = b"192.168.1.0/24 dev eth0 proto kernel scope link\n\
            Deleted default via 192.168.1.1 dev eth0 proto dhcp metric 100\n\
            default via 192.168.1.1 dev eth0 proto dhcp metric 100\n";

        let observer = ConnectivityObserver::new(Some(true));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let _sub = observer.subscribe(move |state| sink.lock().unwrap().push(state));

        follow(output, &observer, || async { None }).await.unwrap();

        assert_eq!(
            *seen.lock().unwrap(),
            vec![ConnectivityState::Offline, ConnectivityState::Online]
        );
        assert_eq!(observer.current(), ConnectivityState::Online);
    }

    #[tokio::test]
    async fn test_follow_trusts_recheck_over_event() {
        // A second default route survives the deletion.
        let output: &[u8] = b"Deleted default via 10.0.0.1 dev wg0\n";
        let observer = ConnectivityObserver::new(Some(true));

        follow(output, &observer, || async { Some(true) }).await.unwrap();
        assert_eq!(observer.current(), ConnectivityState::Online);

        let output: &[u8] = b"Deleted default via 192.168.1.1 dev eth0\n";
        follow(output, &observer, || async { Some(false) }).await.unwrap();
        assert_eq!(observer.current(), ConnectivityState::Offline);
    }
}
