//! Concurrent OMDb keyword search.
//!
//! Queries the OMDb search API for a list of keywords, ten requests at a
//! time, and prints every matching entry as one JSON line. The whole run is
//! bounded to 30 seconds by cancelling the shared token from a timer task.
//!
//! Requires an `OMDB_KEY` environment variable (free keys allow roughly a
//! thousand requests per day).

use std::time::Duration;

use anyhow::Context as _;
use pariter::{flat_map, CancellationToken};
use serde::{Deserialize, Serialize};
use tracing::info;

const THREAD_LIMIT: usize = 10;
const RUN_BUDGET: Duration = Duration::from_secs(30);

const KEYWORDS: &[&str] = &[
    "Friends",
    "Deadpool",
    "X-Men",
    "Arcane",
    "Citizen Kane",
    "Seinfeld",
    "I Love Lucy",
    "Severance",
    "Rings of Power",
    "Star Trek",
    "Foundation",
    "The Boys",
    "Fleabag",
    "No more matches",
    "No more matches",
    "No more matches",
    "No more matches",
    "No more matches",
    "No more matches",
    "No more matches",
];

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(rename = "Response")]
    response: String,
    #[serde(rename = "Search", default)]
    search: Vec<Entry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Entry {
    #[serde(rename = "Title")]
    title: String,
    #[serde(rename = "Type")]
    kind: String,
    #[serde(rename = "Year")]
    year: String,
}

async fn search_omdb(
    client: &reqwest::Client,
    api_key: &str,
    keyword: &str,
) -> Result<Vec<Entry>, reqwest::Error> {
    let result: SearchResponse = client
        .get("https://www.omdbapi.com/")
        .query(&[("s", keyword), ("apiKey", api_key)])
        .send()
        .await?
        .json()
        .await?;

    // OMDb reports "no matches" as a payload field, not an HTTP status
    if result.response != "True" {
        return Ok(Vec::new());
    }

    Ok(result.search)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let api_key = std::env::var("OMDB_KEY").context("OMDB_KEY must be set")?;
    let client = reqwest::Client::new();

    let ctx = CancellationToken::new();
    let timer = ctx.clone();
    tokio::spawn(async move {
        tokio::time::sleep(RUN_BUDGET).await;
        timer.cancel();
    });

    info!(keywords = KEYWORDS.len(), limit = THREAD_LIMIT, "fetching results");

    let entries = flat_map(
        &ctx,
        KEYWORDS.iter().copied(),
        THREAD_LIMIT,
        move |token, keyword| {
            let client = client.clone();
            let api_key = api_key.clone();
            async move {
                tokio::select! {
                    () = token.cancelled() => Ok(Vec::new()),
                    found = search_omdb(&client, &api_key, keyword) => found,
                }
            }
        },
    )
    .await?;

    info!(entries = entries.len(), "printing results");

    for entry in &entries {
        println!("{}", serde_json::to_string(entry)?);
    }

    Ok(())
}
