use std::env;

use crate::config::ServerConfig;

/// There's no real CLI for the server. Any argument prints the help and a summary of what the current environment
/// would start, then exits.
pub fn handle_command_line_args(config: &ServerConfig) -> bool {
    let has_cli_args = env::args().count() > 1;
    if has_cli_args {
        display_readme();
        display_report(config);
    }
    has_cli_args
}

fn display_readme() {
    const README: &str = include_str!("./cli-help.txt");
    println!("\n{README}\n");
}

fn display_report(config: &ServerConfig) {
    println!("With the current environment the server would start with (secrets are never shown):");
    for (name, value) in configuration_report(config) {
        println!("  {name:<18} {value}");
    }
}

/// One line per subsystem, describing how it will behave. Built from the parsed configuration, so secret values
/// cannot leak into it.
pub fn configuration_report(config: &ServerConfig) -> Vec<(&'static str, String)> {
    let log_filter = env::var("RUST_LOG").unwrap_or_else(|_| "not set (errors only)".into());
    let migrations = if config.auto_migrate { "applied at startup" } else { "not applied" };
    let admin = if config.admin_token.reveal().trim().is_empty() {
        "disabled (SPS_ADMIN_TOKEN is not set)".to_string()
    } else {
        "enabled, bearer token required".to_string()
    };
    let limit = &config.rate_limit;
    let rate_limit = format!(
        "{} orders per buyer every {}s, counted in {}",
        limit.max_calls,
        limit.window.as_secs(),
        config.rate_limit_backend
    );
    vec![
        ("Listening on", format!("{}:{}", config.host, config.port)),
        ("Database", format!("{} (migrations {migrations})", config.database_url)),
        ("Public URL", config.public_url.clone()),
        ("Logging", log_filter),
        ("Admin routes", admin),
        ("Rate limit", rate_limit),
        ("Event buffer", format!("{} events per channel", config.event_buffer_size)),
        ("Notifications", notification_status(config)),
        ("Refunds", refund_status(config)),
        ("E-mail", mail_status(config)),
    ]
}

fn notification_status(config: &ServerConfig) -> String {
    let wxpay = &config.wxpay;
    match (wxpay.is_configured(), wxpay.platform_keys.len()) {
        (false, _) => "refused, the gateway is not configured".into(),
        (true, 0) => "refused, no platform keys in SPS_WXPAY_PLATFORM_KEYS".into(),
        (true, n) => {
            let serials = wxpay.platform_keys.iter().map(|(serial, _)| serial.as_str()).collect::<Vec<_>>().join(", ");
            format!("accepted for merchant {} from {n} serial(s): {serials}", wxpay.mch_id)
        },
    }
}

fn refund_status(config: &ServerConfig) -> String {
    if config.wxpay.is_configured() {
        format!("sent to {}", config.wxpay.api_base)
    } else {
        "unavailable, admin refunds will fail and leave orders PAID".into()
    }
}

fn mail_status(config: &ServerConfig) -> String {
    match &config.mail.endpoint {
        Some(endpoint) => format!("sent through {endpoint} as {}", config.mail.from),
        None => "written to the log only (SPS_MAIL_ENDPOINT is not set)".into(),
    }
}
