use std::env;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process;

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use storefront_tenant::edge::EdgeDecision;
use storefront_tenant::{ResolutionMode, ResolveInput, TenantConfig, TenantId};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage:
  storefront-tenant resolve --host <host> --path <path> [--client] [--mode <mode>] [--config <file>]
  storefront-tenant edge [--config <file>] < requests.json";

/// One request in an `edge` batch.
#[derive(Debug, Deserialize)]
struct EdgeRequest {
    host: String,
    #[serde(default = "root_path")]
    path: String,
}

fn root_path() -> String {
    "/".to_string()
}

#[derive(Debug, Serialize)]
struct EdgeReport {
    host: String,
    path: String,
    #[serde(flatten)]
    decision: EdgeDecision,
    headers: Vec<(&'static str, String)>,
}

#[derive(Debug, Serialize)]
struct ResolveReport {
    tenant: Option<TenantId>,
    mode: ResolutionMode,
    /// Routing base in path-prefix resolution, empty otherwise.
    base_path: String,
    /// Path with the tenant prefix (and query) removed.
    route: String,
}

#[derive(Debug, Default)]
struct Args {
    command: Option<String>,
    host: Option<String>,
    path: Option<String>,
    mode: Option<ResolutionMode>,
    config: Option<PathBuf>,
    client: bool,
}

fn main() {
    init_logging();
    if let Err(err) = run() {
        eprintln!("[storefront-tenant] {err:#}");
        process::exit(1);
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn run() -> Result<()> {
    let args = parse_args(env::args().skip(1))?;
    let mut config = TenantConfig::load(args.config.as_deref()).context("failed to load config")?;
    if let Some(mode) = args.mode {
        config.mode = mode;
    }

    match args.command.as_deref() {
        Some("resolve") => resolve(&config, &args),
        Some("edge") => edge(&config),
        Some(other) => bail!("unknown command '{other}'\n{USAGE}"),
        None => bail!("missing command\n{USAGE}"),
    }
}

fn resolve(config: &TenantConfig, args: &Args) -> Result<()> {
    let host = args
        .host
        .as_deref()
        .ok_or_else(|| anyhow!("required flag missing: --host <host>"))?;
    let path = args.path.as_deref().unwrap_or("/");

    let resolver = if args.client {
        config.client_resolver()
    } else {
        config.edge_resolver()
    };
    let input = ResolveInput::new(host, path);
    let report = ResolveReport {
        tenant: resolver.resolve(&input).into_tenant(),
        mode: resolver.mode(),
        base_path: resolver.tenant_base_path(&input),
        route: resolver.in_tenant_route(&input),
    };

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn edge(config: &TenantConfig) -> Result<()> {
    let mut stdin_payload = String::new();
    io::stdin()
        .read_to_string(&mut stdin_payload)
        .context("failed to read stdin")?;

    if stdin_payload.trim().is_empty() {
        bail!("stdin payload is empty");
    }

    let requests: Vec<EdgeRequest> =
        serde_json::from_str(&stdin_payload).context("invalid input JSON")?;

    let tagger = config.edge_tagger();
    let reports: Vec<EdgeReport> = requests
        .into_iter()
        .map(|req| {
            let decision = tagger.decide(&req.host, &req.path);
            EdgeReport {
                headers: decision.headers(),
                host: req.host,
                path: req.path,
                decision,
            }
        })
        .collect();

    println!("{}", serde_json::to_string_pretty(&reports)?);
    Ok(())
}

fn parse_args(raw: impl Iterator<Item = String>) -> Result<Args> {
    let mut args = Args::default();
    let mut raw = raw;

    while let Some(arg) = raw.next() {
        let mut value = |flag: &str| {
            raw.next()
                .ok_or_else(|| anyhow!("missing value for {flag}"))
        };
        match arg.as_str() {
            "--host" => args.host = Some(value("--host")?),
            "--path" => args.path = Some(value("--path")?),
            "--mode" => args.mode = Some(value("--mode")?.parse()?),
            "--config" => args.config = Some(PathBuf::from(value("--config")?)),
            "--client" => args.client = true,
            "-h" | "--help" => {
                println!("{USAGE}");
                process::exit(0);
            }
            cmd if args.command.is_none() && !cmd.starts_with('-') => {
                args.command = Some(cmd.to_string());
            }
            _ => bail!("unknown argument '{arg}'\n{USAGE}"),
        }
    }

    Ok(args)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Result<Args> {
        parse_args(list.iter().map(|s| s.to_string()))
    }

    #[test]
    fn parses_resolve_flags() {
        let parsed = args(&["resolve", "--host", "localhost:3000", "--path", "/acme", "--client"]).unwrap();
        assert_eq!(parsed.command.as_deref(), Some("resolve"));
        assert_eq!(parsed.host.as_deref(), Some("localhost:3000"));
        assert_eq!(parsed.path.as_deref(), Some("/acme"));
        assert!(parsed.client);
    }

    #[test]
    fn parses_mode() {
        let parsed = args(&["resolve", "--mode", "subdomain"]).unwrap();
        assert_eq!(parsed.mode, Some(ResolutionMode::Subdomain));
        assert!(args(&["resolve", "--mode", "dns"]).is_err());
    }

    #[test]
    fn rejects_missing_value_and_extra_command() {
        assert!(args(&["resolve", "--host"]).is_err());
        assert!(args(&["resolve", "edge"]).is_err());
    }

    #[test]
    fn edge_report_flattens_decision() {
        let tagger = TenantConfig::default().edge_tagger();
        let decision = tagger.decide("loja1.mercancy.com.br", "/products");
        let report = EdgeReport {
            host: "loja1.mercancy.com.br".into(),
            path: "/products".into(),
            headers: decision.headers(),
            decision,
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["outcome"], "tagged");
        assert_eq!(json["tenant"], "loja1");
        assert_eq!(json["headers"][1][0], "x-tenant-schema");
    }
}
