//! Resolution scenarios and properties, exercised through the public API.

use std::collections::BTreeMap;

use pretty_assertions::assert_eq;
use storefront_tenant::reserved::{DEFAULT_RESERVED_ROUTES, DEFAULT_RESERVED_SUBDOMAINS};
use storefront_tenant::resolver::strip_tenant_prefix;
use storefront_tenant::{
    EdgeDecision, EdgeTagger, Resolution, ResolveInput, Resolver, TenantConfig, TenantId,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn edge_headers(host: &str, path: &str) -> (EdgeDecision, BTreeMap<String, String>) {
    let mut headers = BTreeMap::new();
    let decision = EdgeTagger::default().tag(host, path, &mut headers);
    (decision, headers)
}

fn resolved(resolver: &Resolver, host: &str, path: &str) -> Option<String> {
    resolver
        .resolve(&ResolveInput::new(host, path))
        .into_tenant()
        .map(String::from)
}

fn both_resolvers() -> [Resolver; 2] {
    [Resolver::edge(), Resolver::client()]
}

// ===========================================================================
// Scenarios
// ===========================================================================

#[test]
fn production_subdomain_is_tagged() {
    let (decision, headers) = edge_headers("loja1.mercancy.com.br", "/products");
    assert_eq!(
        decision,
        EdgeDecision::Tagged {
            tenant: TenantId::parse("loja1").unwrap()
        }
    );
    assert_eq!(
        headers,
        BTreeMap::from([
            ("x-tenant".to_string(), "loja1".to_string()),
            ("x-tenant-schema".to_string(), "loja1".to_string()),
        ])
    );
}

#[test]
fn www_is_never_a_tenant() {
    for path in ["/", "/acme", "/acme/products", "/login"] {
        let (decision, headers) = edge_headers("www.mercancy.com.br", path);
        assert_eq!(decision, EdgeDecision::Untagged, "path {path}");
        assert!(headers.is_empty());
    }
}

#[test]
fn localhost_path_prefix() {
    let (decision, headers) = edge_headers("localhost:3000", "/acme/products?filter=featured");
    assert_eq!(decision.tenant().map(TenantId::as_str), Some("acme"));
    assert_eq!(headers.get("x-tenant-schema").map(String::as_str), Some("acme"));

    let client = Resolver::client();
    let input = ResolveInput::new("localhost:3000", "/acme/products?filter=featured");
    assert_eq!(client.in_tenant_route(&input), "/products");
}

#[test]
fn localhost_reserved_route_passes_untagged() {
    let (decision, headers) = edge_headers("localhost:3000", "/login");
    assert_eq!(decision, EdgeDecision::Untagged);
    assert!(headers.is_empty());
}

#[test]
fn admin_subdomain_is_reserved_despite_valid_grammar() {
    assert!(TenantId::parse("admin").is_some());
    for resolver in both_resolvers() {
        assert_eq!(resolved(&resolver, "admin.mercancy.com.br", "/"), None);
    }
}

#[test]
fn assets_and_api_bypass_resolution() {
    for path in ["/_next/static/app.js", "/api/v1/config", "/favicon.ico", "/acme/logo.svg"] {
        let (decision, headers) = edge_headers("loja1.mercancy.com.br", path);
        assert_eq!(decision, EdgeDecision::Bypass, "path {path}");
        assert!(headers.is_empty());
    }
}

#[test]
fn public_ipv4_host_is_tagged_by_first_octet() {
    let (decision, headers) = edge_headers("203.0.113.7", "/");
    assert_eq!(decision.tenant().map(TenantId::as_str), Some("203"));
    assert_eq!(headers.get("x-tenant").map(String::as_str), Some("203"));
    assert_eq!(headers.get("x-tenant-schema").map(String::as_str), Some("203"));

    let (decision, _) = edge_headers("127.0.0.1:3000", "/acme");
    assert_eq!(decision.tenant().map(TenantId::as_str), Some("acme"));
}

#[test]
fn tenant_slugs_starting_with_api_still_resolve() {
    let (decision, headers) = edge_headers("localhost:3000", "/apiary/products");
    assert_eq!(decision.tenant().map(TenantId::as_str), Some("apiary"));
    assert_eq!(headers.get("x-tenant").map(String::as_str), Some("apiary"));

    let (decision, _) = edge_headers("localhost:3000", "/api/v1/config");
    assert_eq!(decision, EdgeDecision::Bypass);
}

// ===========================================================================
// Properties
// ===========================================================================

#[test]
fn two_label_hosts_never_resolve_by_subdomain() {
    let hosts = ["mercancy.com", "acme.com", "shop.io:8443", "loja1.br"];
    let paths = ["/", "/acme", "/loja1/products", "/login"];
    for resolver in both_resolvers() {
        for host in hosts {
            assert_eq!(resolver.from_subdomain(host), None, "host {host}");
            for path in paths {
                assert_eq!(resolved(&resolver, host, path), None, "{host}{path}");
            }
        }
    }
}

#[test]
fn reserved_subdomains_block_path_fallback() {
    for resolver in both_resolvers() {
        for word in DEFAULT_RESERVED_SUBDOMAINS {
            let host = format!("{word}.mercancy.com.br");
            assert_eq!(resolved(&resolver, &host, "/acme/products"), None, "host {host}");
            let upper = format!("{}.mercancy.com.br", word.to_uppercase());
            assert_eq!(resolved(&resolver, &upper, "/acme"), None, "host {upper}");
        }
    }
}

#[test]
fn reserved_routes_block_path_resolution() {
    let resolver = Resolver::edge();
    for word in DEFAULT_RESERVED_ROUTES {
        let path = format!("/{word}/anything");
        assert_eq!(resolved(&resolver, "localhost", &path), None, "path {path}");
    }
}

#[test]
fn grammar_accepts_valid_tokens_case_folded() {
    let longest = "z".repeat(50);
    let tokens = ["abc", "Loja_1", "my-store", "ACME", longest.as_str(), "a1-_b"];
    let resolver = Resolver::edge();
    for token in tokens {
        let expected = Some(token.to_ascii_lowercase());
        assert_eq!(
            resolved(&resolver, &format!("{token}.mercancy.com.br"), "/"),
            expected,
            "subdomain {token}"
        );
        assert_eq!(
            resolved(&resolver, "localhost", &format!("/{token}/cart")),
            expected,
            "path {token}"
        );
    }
}

#[test]
fn grammar_rejects_invalid_tokens() {
    let long = "z".repeat(51);
    let tokens = ["ab", "x", long.as_str(), "loja~1", "loja%201", "lojá", "loja+1"];
    let resolver = Resolver::edge();
    for token in tokens {
        assert_eq!(
            resolved(&resolver, &format!("{token}.mercancy.com.br"), "/"),
            None,
            "subdomain {token}"
        );
        assert_eq!(
            resolved(&resolver, "localhost", &format!("/{token}")),
            None,
            "path {token}"
        );
    }
}

#[test]
fn strip_then_prepend_roundtrips() {
    let tenant = TenantId::parse("acme").unwrap();
    for rest in ["products", "products/42", "cart/", "a/b/c"] {
        let original = format!("/{tenant}/{rest}");
        let stripped = strip_tenant_prefix(&original, &tenant);
        assert_eq!(format!("/{tenant}{stripped}"), original);
    }
    assert_eq!(strip_tenant_prefix("/acme", &tenant), "/");
}

#[test]
fn edge_and_client_only_differ_on_lan_hosts() {
    let edge = Resolver::edge();
    let client = Resolver::client();
    let cases = [
        ("loja1.mercancy.com.br", "/x"),
        ("www.mercancy.com.br", "/acme"),
        ("localhost:3000", "/acme"),
        ("127.0.0.1:3000", "/acme/cart"),
        ("mercancy.com.br", "/acme"),
    ];
    for (host, path) in cases {
        assert_eq!(resolved(&edge, host, path), resolved(&client, host, path), "{host}{path}");
    }

    assert_eq!(resolved(&edge, "192.168.0.5:3000", "/acme"), Some("192".into()));
    assert_eq!(resolved(&client, "192.168.0.5:3000", "/acme"), Some("acme".into()));
}

#[test]
fn config_driven_tagger_honours_custom_tables() {
    let config = TenantConfig::from_json_str(
        r#"{
            "reserved_subdomains": ["status"],
            "reserved_routes": ["landing"],
            "bypass_prefixes": ["static"]
        }"#,
    )
    .unwrap();
    let tagger = config.edge_tagger();

    assert_eq!(tagger.decide("status.mercancy.com.br", "/"), EdgeDecision::Untagged);
    // "www" is no longer reserved under this config.
    assert!(tagger.decide("www.mercancy.com.br", "/").tenant().is_some());
    assert_eq!(tagger.decide("localhost", "/landing"), EdgeDecision::Untagged);
    assert_eq!(tagger.decide("localhost", "/static/app"), EdgeDecision::Bypass);
    assert_eq!(
        tagger.resolver().resolve(&ResolveInput::new("localhost", "/login")),
        Resolution::Tenant(TenantId::parse("login").unwrap())
    );
}
