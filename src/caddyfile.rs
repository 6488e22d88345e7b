use std::fmt::Write;

use crate::fragment::Fragment;
use crate::layout::Layout;
use crate::root::RootConfig;

/// Render one tenant's site block. The output is a complete,
/// self-contained Caddyfile fragment: one site block routing the
/// public domain to the upstream, with the access log at the path
/// derived from the fragment name.
#[must_use]
pub fn render_fragment(fragment: &Fragment, layout: &Layout) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "{} {{", fragment.domain);
    let _ = writeln!(out, "\treverse_proxy {}", fragment.upstream());

    for (name, value) in &fragment.headers {
        let _ = writeln!(out, "\theader {name} {}", quote(value));
    }

    if fragment.gzip {
        out.push_str("\tencode gzip\n");
    }

    let _ = writeln!(out, "\tlog {{");
    let _ = writeln!(
        out,
        "\t\toutput file {}",
        layout.access_log_path(&fragment.name).display()
    );
    out.push_str("\t}\n");

    for directive in &fragment.extra_directives {
        let _ = writeln!(out, "\t{directive}");
    }

    out.push_str("}\n");
    out
}

/// Render the root configuration: a global options block and the
/// wildcard import that pulls in every active fragment. Never any
/// application routing.
#[must_use]
pub fn render_root(root: &RootConfig, layout: &Layout) -> String {
    let mut out = String::new();

    out.push_str("{\n");
    let _ = writeln!(out, "\temail {}", root.email);
    let _ = writeln!(out, "\tadmin {}", root.admin);
    for directive in &root.extra_globals {
        let _ = writeln!(out, "\t{directive}");
    }
    out.push_str("}\n\n");

    let _ = writeln!(out, "import {}", layout.import_pattern());
    out
}

fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('"', "\\\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use caddyfile_rs::{parse, tokenize};
    use std::path::Path;

    fn layout() -> Layout {
        Layout::under(Path::new("/tmp/trellis"))
    }

    #[test]
    fn full_fragment() {
        let fragment = Fragment::new("app1", "app1.example.com", 8080)
            .security_headers()
            .gzip()
            .directive("tls internal");

        let result = render_fragment(&fragment, &layout());

        assert!(result.contains("app1.example.com {"));
        assert!(result.contains("reverse_proxy localhost:8080"));
        assert!(result.contains("header X-Frame-Options \"DENY\""));
        assert!(result.contains("encode gzip"));
        assert!(result.contains("output file /tmp/trellis/log/app1.log"));
        assert!(result.contains("\ttls internal"));
    }

    #[test]
    fn minimal_fragment() {
        let fragment = Fragment::new("svc", "svc.dev", 3000);

        let result = render_fragment(&fragment, &layout());

        assert!(result.contains("svc.dev {"));
        assert!(result.contains("reverse_proxy localhost:3000"));
        assert!(!result.contains("header"));
        assert!(!result.contains("encode"));
    }

    #[test]
    fn custom_upstream_host() {
        let fragment = Fragment::new("svc", "svc.dev", 3000).upstream_host("127.0.0.1");

        let result = render_fragment(&fragment, &layout());

        assert!(result.contains("reverse_proxy 127.0.0.1:3000"));
    }

    #[test]
    fn header_values_are_quoted() {
        let fragment =
            Fragment::new("svc", "svc.dev", 3000).header("X-XSS-Protection", "1; mode=block");

        let result = render_fragment(&fragment, &layout());

        assert!(result.contains("header X-XSS-Protection \"1; mode=block\""));
    }

    #[test]
    fn fragment_parses_back() {
        let fragment = Fragment::new("app1", "app1.example.com", 8080)
            .security_headers()
            .gzip();

        let result = render_fragment(&fragment, &layout());

        let tokens = tokenize(&result).expect("tokenize failed");
        let parsed = parse(&tokens).expect("parse failed");
        assert_eq!(parsed.sites.len(), 1);
    }

    #[test]
    fn root_carries_globals_and_import() {
        let root = RootConfig::new("admin@example.com").global("grace_period 10s");

        let result = render_root(&root, &layout());

        assert!(result.starts_with("{\n"));
        assert!(result.contains("\temail admin@example.com"));
        assert!(result.contains("\tadmin localhost:2019"));
        assert!(result.contains("\tgrace_period 10s"));
        assert!(result.contains("import /tmp/trellis/sites.d/*.caddy"));
    }

    #[test]
    fn root_has_no_routing() {
        let root = RootConfig::new("admin@example.com");

        let result = render_root(&root, &layout());

        assert!(!result.contains("reverse_proxy"));
        assert!(!result.contains("header"));
    }
}
