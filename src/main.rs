use anyhow::{Context, Result};
use clap::{value_parser, Arg, ArgAction, Command};
use log::info;
use std::fs::File;
use std::io::{self, BufRead};
use std::path::{Path, PathBuf};
use std::process;
use std::time::{Duration, Instant};

use webprobe::output;
use webprobe::{ScanConfig, Scanner};

fn main() -> Result<()> {
    let matches = Command::new("webprobe")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Web vulnerability scanning: fingerprinting, header audit, TLS, forms, XSS/SQLi and sensitive files")
        .arg(Arg::new("url").short('u').long("url").value_name("URL").help("Specify a single URL to scan"))
        .arg(Arg::new("file").short('f').long("file").value_name("FILE").help("Specify a file containing a list of URLs to scan"))
        .arg(Arg::new("threads").short('t').long("threads").value_name("N").value_parser(value_parser!(usize)).help("Number of targets scanned concurrently (default: 3)"))
        .arg(Arg::new("timeout").long("timeout").value_name("SECS").value_parser(value_parser!(u64)).help("HTTP connect/read timeout in seconds (default: 10)"))
        .arg(Arg::new("tls-timeout").long("tls-timeout").value_name("SECS").value_parser(value_parser!(u64)).help("TLS inspection timeout in seconds (default: 5)"))
        .arg(Arg::new("sample").short('s').long("sample").value_name("N").value_parser(value_parser!(usize)).help("Payloads tried per field and category (default: 3)"))
        .arg(Arg::new("max-body").long("max-body").value_name("BYTES").value_parser(value_parser!(usize)).help("Read at most BYTES of each response body (default: 2097152)"))
        .arg(Arg::new("paths").long("paths").value_name("FILE").help("Replace the sensitive-path list with the paths in FILE"))
        .arg(Arg::new("insecure").short('k').long("insecure").help("Allow insecure SSL connections for HTTP requests").action(ArgAction::SetTrue))
        .arg(Arg::new("no-follow").long("no-follow").help("Do not follow HTTP redirects").action(ArgAction::SetTrue))
        .arg(Arg::new("output").short('o').long("output").value_name("FILE").help("Write results to FILE as JSON"))
        .arg(Arg::new("json").long("json").help("Print results as JSON instead of a summary").action(ArgAction::SetTrue))
        .arg(Arg::new("verbose").short('v').long("verbose").help("Enable debug logging").action(ArgAction::SetTrue))
        .arg(Arg::new("quiet").short('q').long("quiet").help("Only log errors").action(ArgAction::SetTrue))
        .get_matches();

    webprobe::logger::init(matches.get_flag("verbose"), matches.get_flag("quiet"));

    let urls = if let Some(url) = matches.get_one::<String>("url") {
        vec![url.to_string()]
    } else if let Some(file) = matches.get_one::<String>("file") {
        read_lines(file)?
    } else {
        eprintln!("You must provide a URL (-u) or file (-f)");
        process::exit(1);
    };

    let mut config = ScanConfig {
        follow_redirects: !matches.get_flag("no-follow"),
        accept_invalid_certs: matches.get_flag("insecure"),
        ..ScanConfig::default()
    };
    if let Some(n) = matches.get_one::<usize>("threads") {
        config.max_concurrency = *n;
    }
    if let Some(secs) = matches.get_one::<u64>("timeout") {
        config.request_timeout = Duration::from_secs(*secs);
    }
    if let Some(secs) = matches.get_one::<u64>("tls-timeout") {
        config.tls_timeout = Duration::from_secs(*secs);
    }
    if let Some(n) = matches.get_one::<usize>("sample") {
        config.payload_sample = *n;
    }
    if let Some(n) = matches.get_one::<usize>("max-body") {
        config.max_body_bytes = *n;
    }
    if let Some(file) = matches.get_one::<String>("paths") {
        config.sensitive_paths = read_lines(file)?;
    }

    let scanner = Scanner::from_config(config).context("Invalid scan configuration")?;
    let workers = scanner.config().max_concurrency;

    let started = Instant::now();
    info!("Scanning {} target(s) with {} worker(s)", urls.len(), workers);
    let results = scanner.scan_many(&urls, workers)?;
    info!("Finished in {}", output::format_duration(started.elapsed()));

    if matches.get_flag("json") {
        println!("{}", serde_json::to_string_pretty(&results)?);
    } else {
        for result in &results {
            output::print_result(result, scanner.auditor());
        }
    }

    if let Some(path) = matches.get_one::<String>("output") {
        let path = PathBuf::from(path);
        output::write_json(&path, &results)?;
        info!("Results written to {}", path.display());
    }

    Ok(())
}

/// Non-empty lines of `filename`, skipping `#` comments.
fn read_lines<P: AsRef<Path>>(filename: P) -> Result<Vec<String>> {
    let file = File::open(&filename).with_context(|| format!("Cannot open file: {}", filename.as_ref().display()))?;
    let lines = io::BufReader::new(file).lines().collect::<Result<Vec<_>, _>>()?;
    Ok(lines
        .into_iter()
        .map(|l| l.trim().to_string())
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .collect())
}
