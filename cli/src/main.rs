#![warn(clippy::nursery, clippy::pedantic)]
#![deny(unsafe_code)]

use std::io::{Read, Write};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use atty::Stream;
use clap::Parser;
use ephemeral_common::{
    pastes_endpoint, CreatePaste, CreatedPaste, ErrorBody, ParsedUrl, PasteView, Ttl, Url,
};
use reqwest::blocking::{Client, Response};
use reqwest::StatusCode;

#[derive(Parser)]
#[clap(version, about)]
struct Opts {
    #[clap(subcommand)]
    action: Action,
}

#[derive(Parser)]
enum Action {
    /// Upload a file, or stdin, and print its share url.
    Upload {
        /// The ephemeral instance to upload data to.
        url: Url,
        /// How long the paste stays readable, such as 90, 5m, 1h or 1d.
        #[clap(short, long)]
        ttl: Option<Ttl>,
        /// How many times the paste can be read before it disappears.
        #[clap(short, long)]
        max_views: Option<u32>,
        /// The file to upload. Reads stdin when omitted.
        path: Option<PathBuf>,
    },
    /// Print a paste to stdout. Counts as a view.
    Download {
        /// The paste to download.
        url: ParsedUrl,
    },
}

fn main() -> Result<()> {
    let opts = Opts::parse();

    match opts.action {
        Action::Upload {
            url,
            ttl,
            max_views,
            path,
        } => handle_upload(&url, ttl, max_views, path),
        Action::Download { url } => handle_download(url),
    }?;

    Ok(())
}

fn handle_upload(
    url: &Url,
    ttl: Option<Ttl>,
    max_views: Option<u32>,
    path: Option<PathBuf>,
) -> Result<()> {
    if max_views == Some(0) {
        bail!("--max-views must be at least 1");
    }

    let content = match path {
        Some(path) => std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?,
        None => {
            if atty::is(Stream::Stdin) {
                bail!("Nothing to upload. Pass a file or pipe data into stdin.");
            }
            let mut content = String::new();
            std::io::stdin()
                .read_to_string(&mut content)
                .context("Failed to read stdin")?;
            content
        }
    };

    if content.is_empty() {
        bail!("Refusing to upload an empty paste.");
    }

    let mut request = CreatePaste::new(content);
    if let Some(ttl) = ttl {
        #[allow(clippy::cast_precision_loss)]
        let secs = ttl.as_secs() as f64;
        request = request.ttl_seconds(secs);
    }
    if let Some(max_views) = max_views {
        request = request.max_views(i64::from(max_views));
    }

    let res = Client::new()
        .post(pastes_endpoint(url)?)
        .json(&request)
        .send()
        .context("Request to server failed")?;

    if res.status() != StatusCode::CREATED {
        bail!("Upload failed. Got HTTP error {}", describe_failure(res));
    }

    let created: CreatedPaste = res.json().context("Server sent a malformed response")?;
    println!("{}", created.url);

    Ok(())
}

fn handle_download(url: ParsedUrl) -> Result<()> {
    let res = Client::new()
        .get(url.api_url)
        .send()
        .context("Failed to get data")?;

    match res.status() {
        StatusCode::OK => (),
        StatusCode::NOT_FOUND => bail!("This paste does not exist or has expired."),
        _ => bail!("Got bad response from server: {}", describe_failure(res)),
    }

    let view: PasteView = res.json().context("Server sent a malformed response")?;

    let mut stdout = std::io::stdout();
    stdout.write_all(view.content.as_bytes())?;
    // Only pad on interactive, else it changes the piped bytes
    if atty::is(Stream::Stdout) && !view.content.ends_with('\n') {
        writeln!(stdout)?;
    }

    eprintln!("{}", view.expiry_note());

    Ok(())
}

fn describe_failure(res: Response) -> String {
    let status = res.status();
    match res.json::<ErrorBody>() {
        Ok(body) => format!("{status}: {}", body.error),
        Err(_) => status.to_string(),
    }
}
