use flowline_client::HttpExecutor;
use flowline_core::config::AppConfig;
use flowline_core::traits::Executor;
use flowline_graph::{FlowTemplate, Palette};

struct CheckResult {
    label: String,
    ok: bool,
    detail: String,
}

pub async fn run_doctor(config: &AppConfig) {
    let mut checks = vec![
        check_base_url(config),
        check_headers(config),
        check_run(config),
        check_templates(),
    ];

    checks.push(check_health(config).await);

    let mut ok_count = 0;
    let mut fail_count = 0;

    for check in &checks {
        let icon = if check.ok { "[OK]" } else { "[!!]" };
        println!("  {} {}: {}", icon, check.label, check.detail);
        if check.ok {
            ok_count += 1;
        } else {
            fail_count += 1;
        }
    }

    println!();
    println!("  {} passed, {} issues found", ok_count, fail_count);
}

fn check_base_url(config: &AppConfig) -> CheckResult {
    let base = &config.executor.base_url;
    let ok = base.starts_with("http://") || base.starts_with("https://");
    CheckResult {
        label: "Executor URL".into(),
        ok,
        detail: if ok {
            format!(
                "{} (batch {}, stream {})",
                base, config.executor.batch_path, config.executor.stream_path
            )
        } else {
            format!("'{}' is not an http(s) URL", base)
        },
    }
}

fn check_headers(config: &AppConfig) -> CheckResult {
    let unresolved: Vec<&str> = config
        .executor
        .headers
        .iter()
        .filter(|(_, v)| v.contains("${"))
        .map(|(k, _)| k.as_str())
        .collect();

    if unresolved.is_empty() {
        CheckResult {
            label: "Headers".into(),
            ok: true,
            detail: format!("{} configured", config.executor.headers.len()),
        }
    } else {
        CheckResult {
            label: "Headers".into(),
            ok: false,
            detail: format!("Unset environment variable in: {}", unresolved.join(", ")),
        }
    }
}

fn check_run(config: &AppConfig) -> CheckResult {
    let timeout = match config.executor.timeout_secs {
        0 => "no timeout".to_string(),
        secs => format!("{}s timeout", secs),
    };
    CheckResult {
        label: "Run".into(),
        ok: true,
        detail: format!(
            "{} mode, {:?} keying, {}",
            config.run.mode, config.run.chain_keying, timeout
        ),
    }
}

fn check_templates() -> CheckResult {
    let palette = Palette::builtin();
    let broken: Vec<String> = FlowTemplate::builtin()
        .into_iter()
        .filter(|t| t.nodes.iter().any(|d| palette.get(d).is_none()))
        .map(|t| t.id)
        .collect();

    CheckResult {
        label: "Templates".into(),
        ok: broken.is_empty(),
        detail: if broken.is_empty() {
            format!("{} built in", FlowTemplate::builtin().len())
        } else {
            format!("Unknown node types in: {}", broken.join(", "))
        },
    }
}

async fn check_health(config: &AppConfig) -> CheckResult {
    let url = config.executor.health_url();
    let result = match HttpExecutor::new(config.executor.clone()) {
        Ok(executor) => executor.health().await,
        Err(e) => Err(e),
    };
    match result {
        Ok(()) => CheckResult {
            label: "Executor".into(),
            ok: true,
            detail: format!("{} reachable", url),
        },
        Err(e) => CheckResult {
            label: "Executor".into(),
            ok: false,
            detail: format!("{}: {}", url, e),
        },
    }
}
