use super::*;

fn ping(target: &str, count: Option<u32>) -> ClientRequest {
    ClientRequest::StartPing {
        target: target.to_string(),
        count,
    }
}

#[test]
fn ping_defaults_count_to_ten() {
    let plan = plan(&ping("example.test", None)).unwrap();
    assert_eq!(plan.tool, ToolKind::Ping);
    assert_eq!(plan.command.program, "ping");
    assert_eq!(plan.command.args, vec!["-c", "10", "-i", "1", "example.test"]);
}

#[test]
fn ping_count_clamps_high_and_low() {
    let plan_high = plan(&ping("example.test", Some(5000))).unwrap();
    assert_eq!(plan_high.command.args[1], "1000");

    let plan_low = plan(&ping("example.test", Some(0))).unwrap();
    assert_eq!(plan_low.command.args[1], "1");
}

#[test]
fn ping_timeout_scales_with_count() {
    let plan = plan(&ping("example.test", Some(60))).unwrap();
    assert_eq!(plan.command.timeout, Duration::from_secs(90));
}

#[test]
fn ping_header_and_footer_frame_the_run() {
    let plan = plan(&ping("example.test", None)).unwrap();
    assert_eq!(plan.header, "PING example.test:\n");
    assert_eq!(plan.footer, "\n[Ping completed]\n");
}

#[test]
fn empty_target_is_rejected_before_spawn() {
    let err = plan(&ping("   ", None)).unwrap_err();
    assert!(matches!(err, CatalogError::InvalidParameters(_)));
}

#[test]
fn control_characters_are_rejected() {
    let err = plan(&ping("example.test\nevil", None)).unwrap_err();
    assert!(matches!(err, CatalogError::InvalidParameters(_)));
}

#[test]
fn target_is_trimmed_before_use() {
    let plan = plan(&ping("  example.test  ", None)).unwrap();
    assert_eq!(plan.command.args[4], "example.test");
}

#[test]
fn dig_defaults_to_public_resolver() {
    let plan = plan(&ClientRequest::StartDig {
        domain: "example.test".to_string(),
        server: None,
    })
    .unwrap();
    assert_eq!(plan.command.args, vec!["@1.1.1.1", "example.test"]);
    assert_eq!(plan.header, "DIG @1.1.1.1 example.test\n\n");
}

#[test]
fn dig_uses_explicit_server() {
    let plan = plan(&ClientRequest::StartDig {
        domain: "example.test".to_string(),
        server: Some("8.8.8.8".to_string()),
    })
    .unwrap();
    assert_eq!(plan.command.args, vec!["@8.8.8.8", "example.test"]);
}

#[test]
fn portscan_classifies_stderr() {
    let plan = plan(&ClientRequest::StartPortscan {
        host: "example.test".to_string(),
        port: 9999,
    })
    .unwrap();
    assert_eq!(plan.stderr, StderrPolicy::Classify);
    assert_eq!(plan.command.args, vec!["-vz", "-w", "5", "example.test", "9999"]);
    assert_eq!(plan.command.timeout, Duration::from_secs(15));
}

#[test]
fn lookups_share_the_flat_ceiling() {
    for request in [
        ClientRequest::StartWhois {
            domain: "example.test".to_string(),
        },
        ClientRequest::StartNslookup {
            domain: "example.test".to_string(),
        },
        ClientRequest::StartHost {
            target: "example.test".to_string(),
        },
    ] {
        let plan = plan(&request).unwrap();
        assert_eq!(plan.command.timeout, Duration::from_secs(30));
        assert_eq!(plan.stderr, StderrPolicy::ErrorColor);
    }
}

#[test]
fn ipcalc_has_the_short_ceiling() {
    let plan = plan(&ClientRequest::StartIpcalc {
        address: "192.168.1.0/24".to_string(),
    })
    .unwrap();
    assert_eq!(plan.command.timeout, Duration::from_secs(10));
    assert_eq!(plan.header, "IPCALC 192.168.1.0/24\n\n");
}

#[test]
fn stop_is_not_plannable() {
    assert!(plan(&ClientRequest::Stop).is_err());
}

#[test]
fn requests_deserialize_from_kebab_case_tags() {
    let request: ClientRequest =
        serde_json::from_str(r#"{"type":"start-ping","target":"example.test","count":5}"#).unwrap();
    assert!(matches!(
        request,
        ClientRequest::StartPing { ref target, count: Some(5) } if target == "example.test"
    ));

    let stop: ClientRequest = serde_json::from_str(r#"{"type":"stop"}"#).unwrap();
    assert!(matches!(stop, ClientRequest::Stop));
}

#[test]
fn unknown_request_types_fail_to_parse() {
    assert!(serde_json::from_str::<ClientRequest>(r#"{"type":"start-traceroute","target":"x"}"#)
        .is_err());
}
