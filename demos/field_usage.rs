//
// This example walks through binding audit event fields, comparing them
// and rendering alerts.
//
// Run with: cargo run --example field_usage

use jevt_engine::{
    ComparisonOp, EventFormatter, FilterCheck, FilterExpr, FilterFactory, JsonEvent,
    OutputConfig, OutputFormatter,
};
use std::sync::Arc;

const POD_CREATE: &str = r#"{
    "kind": "Event",
    "stage": "ResponseComplete",
    "verb": "create",
    "requestURI": "/api/v1/namespaces/default/pods?fieldManager=kubectl-client-side-apply",
    "user": {"username": "kubernetes-admin", "groups": ["system:masters", "system:authenticated"]},
    "objectRef": {"resource": "pods", "namespace": "default", "name": "debug"},
    "annotations": {"authorization.k8s.io/decision": "allow"},
    "requestObject": {"spec": {
        "hostNetwork": true,
        "containers": [
            {"image": "docker.io/library/busybox:1.36", "securityContext": {"privileged": true}}
        ],
        "volumes": [{"name": "host-etc", "hostPath": {"path": "/etc"}}]
    }}
}"#;

fn main() -> jevt_engine::Result<()> {
    println!("=== JSON Event Fields - Examples ===\n");

    let factory = Arc::new(FilterFactory::new());
    let event = JsonEvent::from_json_str(POD_CREATE, 1_700_000_000_123_456_789)?;

    // ========================================================================
    // Example 1: Field catalog
    // ========================================================================
    println!("Example 1: Field Catalog");
    println!("-------------------------");
    for group in factory.fields() {
        println!("{} ({} fields): {}", group.name, group.fields.len(), group.description);
    }
    println!();

    // ========================================================================
    // Example 2: Extracting values
    // ========================================================================
    println!("Example 2: Extracting Values");
    println!("----------------------------");
    for raw in [
        "ka.user.name",
        "ka.auth.decision",
        "ka.uri.param[fieldManager]",
        "ka.req.container.image.repository",
        "ka.req.container.privileged",
        "ka.req.container.run_as_user",
        "ka.req.volume.hostpath[/etc]",
        "jevt.value[/objectRef/namespace]",
        "jevt.time.iso8601",
    ] {
        if let Some((field, _)) = factory.new_filtercheck(raw)? {
            println!("  {:<40} {}", raw, field.extract(&event));
        }
    }
    println!();

    // ========================================================================
    // Example 3: Rule conditions
    // ========================================================================
    println!("Example 3: Rule Conditions");
    println!("--------------------------");
    let privileged_pod = FilterExpr::And(vec![
        FilterCheck::new(&factory, "ka.verb", ComparisonOp::Eq, vec!["create".into()])?.into(),
        FilterCheck::new(
            &factory,
            "ka.req.container.privileged",
            ComparisonOp::Eq,
            vec!["true".into()],
        )?
        .into(),
        FilterExpr::Not(Box::new(
            FilterCheck::new(
                &factory,
                "ka.target.namespace",
                ComparisonOp::In,
                vec!["kube-system".into(), "kube-public".into()],
            )?
            .into(),
        )),
    ]);
    println!("Create privileged pod: {}", privileged_pod.evaluate(&event)?);

    let sensitive_mount = FilterCheck::new(
        &factory,
        "ka.req.volume.any_hostpath[/etc*,/proc*,/var/run/docker.sock]",
        ComparisonOp::Eq,
        vec!["true".into()],
    )?;
    println!("Sensitive host mount:  {}", sensitive_mount.compare(&event)?);

    match "matches".parse::<ComparisonOp>() {
        Ok(op) => println!("Parsed operator {}", op),
        Err(e) => println!("Rejected operator: {}", e),
    }
    println!();

    // ========================================================================
    // Example 4: Output templates
    // ========================================================================
    println!("Example 4: Output Templates");
    println!("---------------------------");
    let template = "Privileged pod created (user=%ka.user.name pod=%ka.target.name image=%ka.req.container.image)";
    let formatter = EventFormatter::compile(&factory, template)?;
    println!("Text: {}", formatter.to_text(&event));
    println!("JSON: {}", formatter.to_json(&event));

    let text = OutputFormatter::new(Arc::clone(&factory), OutputConfig::default());
    println!(
        "{}",
        text.format_event(&event, "Create Privileged Pod", "Warning", template)?
    );

    let json = OutputFormatter::new(
        Arc::clone(&factory),
        OutputConfig {
            json_output: true,
            ..OutputConfig::default()
        },
    );
    println!(
        "{}",
        json.format_event(&event, "Create Privileged Pod", "Warning", template)?
    );

    Ok(())
}
