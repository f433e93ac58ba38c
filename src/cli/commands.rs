//! CLI commands and argument parsing

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Resumable point-in-time export of Elasticsearch indices
#[derive(Parser, Debug)]
#[command(name = "esdump")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Backend address (host:port) [default: 127.0.0.1:9200]
    #[arg(short, long, global = true)]
    pub source: Option<String>,

    /// Connect over https
    #[arg(short, long, global = true)]
    pub tls: bool,

    /// Basic auth credentials (user:password)
    #[arg(short, long, global = true)]
    pub creds: Option<String>,

    /// API key (sent as `Authorization: ApiKey ...`)
    #[arg(long, global = true)]
    pub api_key: Option<String>,

    /// Request timeout in seconds [default: 100]
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Export an index to rotating JSON lines files
    Export(ExportArgs),

    /// List every field that occurs in an index
    Fields(FieldsArgs),
}

/// Arguments of `esdump export`
#[derive(Args, Debug, Clone)]
pub struct ExportArgs {
    /// Index, alias or pattern to export
    pub index: String,

    /// Resume after this sort key (e.g. the last file's first key minus one)
    pub after: Option<String>,

    /// Compress rotated files
    #[arg(short = 'x', long)]
    pub compress: bool,

    /// Filter query (JSON), placed under `query`
    #[arg(short, long)]
    pub query: Option<String>,

    /// Extra fields merged into every search body (JSON object)
    #[arg(short, long)]
    pub extra: Option<String>,

    /// Accept pages with shard failures instead of retrying them
    #[arg(short, long)]
    pub ignore_failures: bool,

    /// Directory the files are written to [default: .]
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Derive the resume key from the files already in the output directory
    #[arg(long)]
    pub resume: bool,

    /// Hits per page [default: 10000]
    #[arg(long)]
    pub page_size: Option<u32>,

    /// Stop after this many records (0 = unlimited)
    #[arg(long)]
    pub max_records: Option<u64>,

    /// Field the scan is ordered on [default: @timestamp]
    #[arg(long)]
    pub sort_field: Option<String>,

    /// Cursor keep-alive, in backend time units [default: 1m]
    #[arg(long)]
    pub keep_alive: Option<String>,

    /// Config file (YAML or JSON); flags override its values
    #[arg(long)]
    pub config: Option<PathBuf>,
}

/// Arguments of `esdump fields`
#[derive(Args, Debug, Clone)]
pub struct FieldsArgs {
    /// Index, alias or pattern to scan
    pub index: String,

    /// Filter query (JSON)
    #[arg(short, long)]
    pub query: Option<String>,

    /// Window width in seconds
    #[arg(long, default_value = "1.0")]
    pub interval: f64,

    /// Timestamp field the windows are cut on [default: @timestamp]
    #[arg(long)]
    pub timestamp_field: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_export() {
        let cli = Cli::try_parse_from([
            "esdump", "-s", "es:9200", "-t", "-c", "elastic:pw", "export", "-x", "-i", "-q",
            r#"{"match_all":{}}"#, "logs-*", "1700000000000",
        ])
        .unwrap();

        assert_eq!(cli.source.as_deref(), Some("es:9200"));
        assert!(cli.tls);
        assert_eq!(cli.creds.as_deref(), Some("elastic:pw"));
        let Commands::Export(args) = cli.command else {
            panic!("expected export");
        };
        assert_eq!(args.index, "logs-*");
        assert_eq!(args.after.as_deref(), Some("1700000000000"));
        assert!(args.compress);
        assert!(args.ignore_failures);
        assert_eq!(args.query.as_deref(), Some(r#"{"match_all":{}}"#));
        assert!(!args.resume);
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from(["esdump", "export", "logs", "-v", "--api-key", "k"])
            .unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.api_key.as_deref(), Some("k"));
    }

    #[test]
    fn test_parse_fields() {
        let cli = Cli::try_parse_from(["esdump", "fields", "--interval", "0.5", "logs"]).unwrap();
        let Commands::Fields(args) = cli.command else {
            panic!("expected fields");
        };
        assert_eq!(args.index, "logs");
        assert!((args.interval - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_index_is_required() {
        assert!(Cli::try_parse_from(["esdump", "export"]).is_err());
    }
}
