//! Command line arguments.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use clap::builder::RangedU64ValueParser;
use pagelist_lib::Query;
use serde_json::Value;

/// Print a window of records from a paginated collection.
#[derive(Debug, Clone, Parser)]
#[command(name = "pagelist", version)]
pub struct Args {
    /// Collection endpoint; repeat for mirrors
    #[arg(long = "endpoint", value_name = "URL", required = true)]
    pub endpoints: Vec<String>,

    /// Search string
    #[arg(long)]
    pub search: Option<String>,

    /// Extra query field; VALUE is parsed as JSON when possible
    #[arg(long = "field", value_name = "KEY=VALUE", value_parser = parse_field)]
    pub fields: Vec<(String, Value)>,

    /// First row to show
    #[arg(long, default_value_t = 0)]
    pub offset: usize,

    /// Number of rows to show
    #[arg(long, default_value_t = 20, value_parser = RangedU64ValueParser::<usize>::new().range(1..))]
    pub rows: usize,

    /// Records per request
    #[arg(long, default_value_t = 50, value_parser = RangedU64ValueParser::<usize>::new().range(1..))]
    pub block_size: usize,

    /// Give up waiting after SECS seconds
    #[arg(long = "timeout", value_name = "SECS", default_value_t = 30)]
    pub timeout_secs: u64,

    /// Record cache database [default: platform data dir]
    #[arg(long, value_name = "PATH")]
    pub db: Option<PathBuf>,

    /// Cap the record cache database at N pages; it is cleared when full
    #[arg(long, value_name = "N")]
    pub max_pages: Option<u32>,

    /// Keep the record cache in memory only
    #[arg(long)]
    pub no_cache: bool,

    /// Compress cached values with zstd
    #[arg(long)]
    pub compress: bool,

    /// Ping the endpoints and print their rankings
    #[arg(long)]
    pub ping: bool,
}

impl Args {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// The collection query described by `--search` and `--field`.
    pub fn query(&self) -> Query {
        let mut query = Query::new().with("query", "collectionset");
        if let Some(search) = &self.search {
            query.set("searchstring", search.as_str());
        }
        for (key, value) in &self.fields {
            query.set(key.as_str(), value.clone());
        }
        query
    }
}

fn parse_field(raw: &str) -> Result<(String, Value), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", raw))?;
    if key.is_empty() {
        return Err(format!("missing field name in '{}'", raw));
    }
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::from(value));
    Ok((key.to_string(), value))
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    fn parse(args: &[&str]) -> Result<Args, clap::Error> {
        Args::try_parse_from(std::iter::once("pagelist").chain(args.iter().copied()))
    }

    #[test]
    fn test_command_is_well_formed() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_parse_full() {
        let args = parse(&[
            "--endpoint",
            "https://eu.example.org",
            "--endpoint",
            "https://us.example.org",
            "--search",
            "tea",
            "--field",
            "startdate=1990",
            "--field",
            "author=Ann Lee",
            "--offset",
            "120",
            "--rows",
            "5",
            "--max-pages",
            "4096",
            "--compress",
        ])
        .unwrap();

        assert_eq!(args.endpoints.len(), 2);
        assert_eq!(args.offset, 120);
        assert_eq!(args.rows, 5);
        assert_eq!(args.max_pages, Some(4096));
        assert_eq!(args.timeout(), Duration::from_secs(30));
        assert!(args.compress);

        let query = args.query();
        assert_eq!(query.get("query"), Some(&Value::from("collectionset")));
        assert_eq!(query.get("searchstring"), Some(&Value::from("tea")));
        assert_eq!(query.get("startdate"), Some(&Value::from(1990)));
        assert_eq!(query.get("author"), Some(&Value::from("Ann Lee")));
    }

    #[test]
    fn test_parse_errors() {
        assert!(parse(&[]).is_err());
        assert!(parse(&["--endpoint"]).is_err());
        assert!(parse(&["--endpoint", "x", "--rows", "many"]).is_err());
        assert!(parse(&["--endpoint", "x", "--rows", "0"]).is_err());
        assert!(parse(&["--endpoint", "x", "--block-size", "0"]).is_err());
        assert!(parse(&["--endpoint", "x", "--field", "novalue"]).is_err());
        assert!(parse(&["--endpoint", "x", "--field", "=1"]).is_err());
        assert!(parse(&["--endpoint", "x", "--bogus"]).is_err());
    }
}
