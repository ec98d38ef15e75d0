use anyhow::{Context, Result};
use clap::Parser;
use httpwatch::cli::{parse_header, Cli, OutputFormat, Target};
use httpwatch::config::WatchConfig;
use httpwatch::http::{HttpRequest, HttpResponse, TransportError};
use httpwatch::json_output::JsonOutput;
use httpwatch::lifecycle::Instrumentation;
use httpwatch::targets::{default_targets, HttpClass, SessionClass};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber for debug output
fn init_tracing(debug: bool) {
    if debug {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::from_default_env().add_directive(tracing::Level::TRACE.into()),
            )
            .with_writer(std::io::stderr)
            .init();
    }
}

/// Settings file (if any) overlaid with command-line options
fn build_config(args: &Cli) -> Result<WatchConfig> {
    let mut config = match &args.config {
        Some(path) => WatchConfig::from_file(path)?,
        None if args.openstack_defaults => WatchConfig::openstack_defaults(),
        None => WatchConfig::default(),
    };

    if !args.clients.is_empty() {
        config.clients = args.clients.clone();
    }
    if !args.others.is_empty() {
        config.others = args.others.clone();
    }
    if !args.search_path.is_empty() {
        config.search_path = args.search_path.clone();
    }
    if args.no_trace_stack {
        config.trace_stack = false;
    }
    Ok(config)
}

/// Request template shared by every URL
fn build_request(args: &Cli) -> Result<HttpRequest> {
    let mut request = HttpRequest::new(args.method.to_ascii_uppercase(), String::new());

    for header in &args.headers {
        let (name, value) = parse_header(header)
            .with_context(|| format!("Invalid header {:?}, expected \"Name: value\"", header))?;
        request = request.with_header(name, value);
    }
    if let Some(data) = &args.data {
        request = request.with_body(data.as_bytes());
    }
    if let Some(secs) = args.timeout {
        let timeout = Duration::try_from_secs_f64(secs)
            .with_context(|| format!("Invalid timeout {}", secs))?;
        request = request.with_timeout(timeout);
    }
    Ok(request)
}

type RequestFn = Box<dyn Fn(&HttpRequest) -> Result<HttpResponse, TransportError>>;

fn client_for(target: Target, sessions: &SessionClass, http: &HttpClass) -> Result<RequestFn> {
    let send: RequestFn = match target {
        Target::Reqwest => {
            let session = sessions
                .session()
                .context("Failed to build reqwest client")?;
            Box::new(move |request: &HttpRequest| session.request(request))
        }
        Target::Ureq => {
            let client = http.client();
            Box::new(move |request: &HttpRequest| client.request(request))
        }
    };
    Ok(send)
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.debug);

    let config = build_config(&args)?;
    let template = build_request(&args)?;

    let sessions = SessionClass::new();
    let http = HttpClass::new();
    let mut instrumentation = Instrumentation::new(default_targets(&sessions, &http));
    let recorder = instrumentation
        .enable(&config)
        .context("Failed to enable HTTP instrumentation")?;

    let send = client_for(args.target, &sessions, &http)?;
    let mut failures = Vec::new();
    for url in &args.urls {
        let request = HttpRequest {
            url: url.clone(),
            ..template.clone()
        };
        match send(&request) {
            Ok(response) => {
                tracing::debug!(url = %url, status = response.status, "request completed")
            }
            Err(err) => {
                eprintln!("httpwatch: {}: {}", url, err);
                failures.push((url.clone(), err));
            }
        }
    }

    instrumentation.disable();
    let snapshot = recorder.snapshot();

    match args.format {
        OutputFormat::Text => snapshot.print_summary()?,
        OutputFormat::Json => {
            let mut output = JsonOutput::from_snapshot(&snapshot);
            for (url, err) in &failures {
                output.add_failure(url.as_str(), err);
            }
            println!("{}", output.to_json()?);
        }
    }

    if !failures.is_empty() {
        std::process::exit(1);
    }
    Ok(())
}
