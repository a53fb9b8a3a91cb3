//! Scope rewriting under configured partition schemes

use pretty_assertions::assert_eq;
use scopegraph_gateway::{
    GatewayConfig, PartitionScheme, RewriteOutcome, ScopeRewriter, TenantId,
};

#[test]
fn test_custom_scheme_quotes_labels() {
    let scheme = PartitionScheme::new("tenant-", "Shared Data", "[a-z]{3}[0-9]{2}").unwrap();
    let rewriter = ScopeRewriter::new(scheme);

    let scoped = rewriter.rewrite("MATCH (n:Host) RETURN n", &TenantId::new("acm01"));
    assert_eq!(
        scoped.text,
        "MATCH (n:Host) WHERE (n:`tenant-acm01` OR n:`Shared Data`) RETURN n"
    );
    assert_eq!(
        rewriter.rewrite(&scoped.text, &TenantId::new("acm01")).outcome,
        RewriteOutcome::AlreadyScoped
    );
}

#[test]
fn test_tenants_never_share_a_restriction() {
    let rewriter = ScopeRewriter::default();
    let for_seven = rewriter.rewrite("MATCH (n) RETURN n", &TenantId::new("7"));
    let for_seventy = rewriter.rewrite(&for_seven.text, &TenantId::new("70"));

    assert_eq!(for_seventy.outcome, RewriteOutcome::Scoped);
    assert_eq!(
        for_seventy.text,
        "MATCH (n) WHERE ((n:t7 OR n:Global)) AND (n:t70 OR n:Global) RETURN n"
    );
}

#[test]
fn test_scheme_from_environment() {
    let config = GatewayConfig::load_from(|key| match key {
        "GATEWAY_PARTITION_PREFIX" => Some("org_".to_string()),
        "GATEWAY_SHARED_LABEL" => Some("Everyone".to_string()),
        _ => None,
    })
    .unwrap();
    let rewriter = ScopeRewriter::new(config.partition_scheme().unwrap());

    let scoped = rewriter.rewrite(
        "MATCH (c:CVE)-[:AFFECTS]->(h) USING INDEX c:CVE(id) RETURN c, h",
        &TenantId::new("12"),
    );
    assert_eq!(
        scoped.text,
        "MATCH (c:CVE)-[:AFFECTS]->(h) USING INDEX c:CVE(id) WHERE (c:org_12 OR c:Everyone) RETURN c, h"
    );
}
