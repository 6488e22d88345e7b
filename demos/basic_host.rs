//! Host-side management binary example.
//!
//! Demonstrates wiring the shared proxy for a VPS: root
//! configuration, layout, snapshot retention, and the systemd/caddy
//! service adapter.
//!
//! ```sh
//! # Once, at bootstrap
//! trellis init
//!
//! # From each application's deploy job
//! trellis deploy --name app1 --domain app1.example.com --port 8080
//!
//! # Inspect the host
//! trellis status --json
//! ```

use std::time::Duration;

use trellis::{CaddyService, Layout, Proxy, RootConfig};

fn main() -> anyhow::Result<()> {
    let root = RootConfig::new("admin@example.com").admin("localhost:2019");

    let proxy = Proxy::new(root)
        .layout(Layout::default())
        .service(CaddyService::new().unit("caddy"))
        .keep_snapshots(10)
        .validation_timeout(Duration::from_secs(10));

    proxy.run()?;
    Ok(())
}
