//! Programmatic tenant deploy example.
//!
//! Instead of the CLI, an application's deploy job can link the
//! crate and push its fragment directly - useful when the job
//! already runs on the host.

use trellis::{Fragment, Proxy, RootConfig};

fn main() -> anyhow::Result<()> {
    let proxy = Proxy::new(RootConfig::new("admin@example.com"));

    let fragment = Fragment::new("app1", "app1.example.com", 8080)
        .security_headers()
        .gzip()
        .header("X-Robots-Tag", "noindex");

    match proxy.deploy(&fragment, true)? {
        Some(result) if result.valid => {
            println!("app1.example.com is live");
        }
        Some(result) => {
            eprintln!("rejected:");
            for diagnostic in &result.diagnostics {
                eprintln!("  {diagnostic}");
            }
        }
        None => {}
    }
    Ok(())
}
