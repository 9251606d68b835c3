use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Export SQLite tables to CSV or Excel spreadsheets
#[derive(Parser, Debug)]
#[command(name = "tabula", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Config file (default: ~/.tabula/config.json)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log filter, overriding the configured level (e.g. "debug", "tabula_sqlite=trace")
    #[arg(long, global = true)]
    pub log: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Export a table as a spreadsheet or CSV file
    Export(ExportArgs),

    /// Print the resolved fields and headers as JSON
    Describe(DescribeArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ExportArgs {
    /// SQLite database file
    #[arg(long)]
    pub db: PathBuf,

    /// Table or view to export
    #[arg(long)]
    pub table: String,

    /// Fields to export; relationship paths use "__" (author__name)
    #[arg(long, value_delimiter = ',')]
    pub fields: Option<Vec<String>>,

    /// Header labels, replacing the generated ones
    #[arg(long, value_delimiter = ',')]
    pub headers: Option<Vec<String>>,

    /// Sort by these fields; prefix with "-" for descending
    #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
    pub order_by: Option<Vec<String>>,

    /// Output format: csv or excel
    #[arg(long)]
    pub format: Option<String>,

    /// Attachment filename (default: export.csv / export.xlsx)
    #[arg(long)]
    pub filename: Option<String>,

    /// Where to write the file (default: the filename in the current directory)
    #[arg(long, short)]
    pub out: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct DescribeArgs {
    /// SQLite database file
    #[arg(long)]
    pub db: PathBuf,

    /// Table to describe; lists every table when omitted
    #[arg(long)]
    pub table: Option<String>,

    /// Fields to resolve headers for
    #[arg(long, value_delimiter = ',')]
    pub fields: Option<Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_export() {
        let cli = Cli::try_parse_from([
            "tabula",
            "export",
            "--db",
            "library.db",
            "--table",
            "book",
            "--fields",
            "title,author__name",
            "--order-by",
            "-title",
            "--format",
            "excel",
        ])
        .unwrap();

        let Commands::Export(args) = cli.command else {
            panic!("expected export");
        };
        assert_eq!(args.table, "book");
        assert_eq!(
            args.fields,
            Some(vec!["title".to_string(), "author__name".to_string()])
        );
        assert_eq!(args.order_by, Some(vec!["-title".to_string()]));
        assert_eq!(args.format.as_deref(), Some("excel"));
        assert!(args.headers.is_none());
    }

    #[test]
    fn test_parse_describe_with_global_config() {
        let cli = Cli::try_parse_from([
            "tabula",
            "describe",
            "--db",
            "library.db",
            "--config",
            "/tmp/tabula.json",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/tabula.json")));
        assert!(matches!(cli.command, Commands::Describe(ref a) if a.table.is_none()));
    }

    #[test]
    fn test_export_requires_table() {
        assert!(Cli::try_parse_from(["tabula", "export", "--db", "x.db"]).is_err());
    }
}
