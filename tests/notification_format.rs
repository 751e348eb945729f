use std::error::Error;

use trigrun::config::{CommonConfig, EmailConfig, NtfyConfig};
use trigrun::units::{EmailUnit, Invocation, NtfyUnit};

type TestResult = Result<(), Box<dyn Error>>;

fn email_config() -> EmailConfig {
    EmailConfig {
        common: CommonConfig {
            name: "notify".to_string(),
            ..CommonConfig::default()
        },
        to: vec!["ops@example.com".to_string()],
        from: "trigrun@example.com".to_string(),
        subject_prefix: None,
        smtp_host: "mail.example.com".to_string(),
        smtp_port: 587,
        smtp_user: None,
        smtp_password: None,
        smtp_use_tls: false,
        include_output: true,
        limit_lines: None,
    }
}

fn ntfy_config() -> NtfyConfig {
    NtfyConfig {
        common: CommonConfig {
            name: "push".to_string(),
            ..CommonConfig::default()
        },
        topic: "builds".to_string(),
        server: "https://ntfy.sh".to_string(),
        title_prefix: None,
        priority: None,
        tags: None,
        include_output: true,
        limit_lines: None,
    }
}

fn success_invocation(output: &str) -> Invocation {
    Invocation {
        triggered_by: Some("build".to_string()),
        output: Some(output.to_string()),
        error: None,
    }
}

#[tokio::test]
async fn email_subject_encodes_unit_and_status() -> TestResult {
    let unit = EmailUnit::from_config(&email_config())?;

    assert_eq!(unit.subject(&success_invocation("")), "build:success");

    let failed = Invocation {
        triggered_by: Some("build".to_string()),
        output: None,
        error: Some("script exited with code 2".to_string()),
    };
    assert_eq!(unit.subject(&failed), "build:fail");

    Ok(())
}

#[tokio::test]
async fn email_subject_prefix_is_prepended() -> TestResult {
    let mut cfg = email_config();
    cfg.subject_prefix = Some("ci".to_string());
    let unit = EmailUnit::from_config(&cfg)?;

    assert_eq!(unit.subject(&success_invocation("")), "ci: build:success");
    Ok(())
}

#[tokio::test]
async fn email_body_includes_output_and_error() -> TestResult {
    let unit = EmailUnit::from_config(&email_config())?;

    let inv = Invocation {
        triggered_by: Some("build".to_string()),
        output: Some("line one\nline two\n".to_string()),
        error: Some("script exited with code 2".to_string()),
    };
    let body = unit.body(&inv);

    assert!(body.contains("Triggered by unit: build"));
    assert!(body.contains("Timestamp: "));
    assert!(body.contains("Error: script exited with code 2"));
    assert!(body.contains("Output:\n-------\nline one\nline two"));

    Ok(())
}

#[tokio::test]
async fn email_body_tail_truncates_with_disclosure() -> TestResult {
    let mut cfg = email_config();
    cfg.limit_lines = Some(2);
    let unit = EmailUnit::from_config(&cfg)?;

    let output = "one\ntwo\nthree\nfour";
    let body = unit.body(&success_invocation(output));

    assert!(body.contains("(showing last 2 of 4 lines)"));
    assert!(body.contains("three\nfour"));
    assert!(!body.contains("one\ntwo"));

    Ok(())
}

#[tokio::test]
async fn email_body_without_output_when_disabled() -> TestResult {
    let mut cfg = email_config();
    cfg.include_output = false;
    let unit = EmailUnit::from_config(&cfg)?;

    let body = unit.body(&success_invocation("secret build log"));
    assert!(body.contains("(Output not included)"));
    assert!(!body.contains("secret build log"));

    Ok(())
}

#[tokio::test]
async fn email_body_notes_missing_output() -> TestResult {
    let unit = EmailUnit::from_config(&email_config())?;
    let body = unit.body(&success_invocation(""));
    assert!(body.contains("(No output captured)"));
    Ok(())
}

#[test]
fn email_rejects_bad_addresses() {
    let mut cfg = email_config();
    cfg.from = "not an address".to_string();
    let err = EmailUnit::from_config(&cfg).unwrap_err();
    assert!(err.to_string().contains("invalid from address"));

    let mut cfg = email_config();
    cfg.to = vec!["also bad".to_string()];
    let err = EmailUnit::from_config(&cfg).unwrap_err();
    assert!(err.to_string().contains("invalid to address"));

    let mut cfg = email_config();
    cfg.to = vec![];
    let err = EmailUnit::from_config(&cfg).unwrap_err();
    assert!(err.to_string().contains("at least one to address"));
}

#[test]
fn ntfy_title_matches_email_subject_shape() -> TestResult {
    let mut cfg = ntfy_config();
    cfg.title_prefix = Some("ci".to_string());
    let unit = NtfyUnit::from_config(&cfg)?;

    assert_eq!(unit.title(&success_invocation("")), "ci: build:success");

    let failed = Invocation {
        triggered_by: Some("build".to_string()),
        output: None,
        error: Some("boom".to_string()),
    };
    assert_eq!(unit.title(&failed), "ci: build:fail");

    Ok(())
}

#[test]
fn ntfy_body_includes_error_and_truncated_output() -> TestResult {
    let mut cfg = ntfy_config();
    cfg.limit_lines = Some(1);
    let unit = NtfyUnit::from_config(&cfg)?;

    let inv = Invocation {
        triggered_by: Some("deploy".to_string()),
        output: Some("first\nlast".to_string()),
        error: Some("timeout".to_string()),
    };
    let body = unit.body(&inv);

    assert!(body.contains("Triggered by: deploy"));
    assert!(body.contains("Error: timeout"));
    assert!(body.contains("(showing last 1 of 2 lines)"));
    assert!(body.contains("last"));

    Ok(())
}

#[test]
fn unknown_triggering_unit_renders_as_unknown() -> TestResult {
    let unit = NtfyUnit::from_config(&ntfy_config())?;
    let body = unit.body(&Invocation::default());
    assert!(body.contains("Triggered by: unknown"));
    Ok(())
}
