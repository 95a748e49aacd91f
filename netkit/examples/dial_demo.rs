//! Dial demo against the in-memory host.
//!
//! Shows first-success-wins over several candidates, a probed connect, and
//! the error surface of a dial that times out.
//!
//! Run with `RUST_LOG=debug cargo run --example dial_demo` to see the
//! `[RESOLVE]`/`[DIAL]`/`[CONNECT]` logs.

use netkit::memory::{ConnectBehavior, MemoryHost};
use netkit::prelude::*;
use std::time::Duration;

#[compio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    netkit::dev_tracing::init_tracing();

    let host = MemoryHost::new();
    host.add_host(
        "service.local",
        &["10.0.0.1".parse()?, "10.0.0.2".parse()?, "10.0.0.3".parse()?],
    );
    // 10.0.0.1 is unrouted and refuses; 10.0.0.2 completes after a few probes
    host.route_inet("10.0.0.2:8080".parse()?, ConnectBehavior::Pending { probes: 3 });
    host.route_inet("10.0.0.3:8080".parse()?, ConnectBehavior::Immediate);

    let dialer = Dialer::with_options(
        host.clone(),
        DialOptions::new().with_timeout(Duration::from_secs(2)),
    );

    for endpoint in dialer.resolve("tcp", "service.local:8080")? {
        println!("candidate: {endpoint}");
    }

    let mut conn = dialer.dial("tcp", "service.local:8080").await?;
    println!(
        "connected {} -> {}",
        conn.local_endpoint(),
        conn.remote_endpoint()
    );
    conn.write(b"ping").await?;
    conn.close()?;

    host.route_inet("10.0.0.9:8080".parse()?, ConnectBehavior::Never);
    match dialer
        .dial_timeout("tcp", "10.0.0.9:8080", Duration::from_millis(100))
        .await
    {
        Ok(_) => println!("unexpected success"),
        Err(err) => println!("dial failed: {err} (timeout: {})", err.is_timeout()),
    }

    Ok(())
}
