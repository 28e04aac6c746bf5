use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod handlers;

pub use handlers::*;

#[derive(Parser, Debug)]
#[command(version, about = "Index a picture folder and search it with text", long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Embed and store every picture in a directory
    Ingest {
        /// Directory to ingest. Defaults to `images_dir` from the config
        #[clap(short, long)]
        dir: Option<PathBuf>,
    },

    /// Find pictures matching a text description
    Search {
        /// Search text
        #[clap(required = true, num_args = 1..)]
        query: Vec<String>,

        /// Number of results. Defaults to `search.limit` from the config
        #[clap(short = 'n', long)]
        limit: Option<usize>,

        /// Don't open the best match
        #[clap(long, default_value = "false")]
        no_open: bool,

        /// Print results as json
        #[clap(long, default_value = "false")]
        json: bool,
    },

    /// Print the effective configuration
    Config {},
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_search_words() {
        let args = Args::try_parse_from(["picsearch", "search", "red", "car", "-n", "3"]).unwrap();
        match args.command {
            Command::Search {
                query,
                limit,
                no_open,
                json,
            } => {
                assert_eq!(query, vec!["red", "car"]);
                assert_eq!(limit, Some(3));
                assert!(!no_open);
                assert!(!json);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_parse_ingest_dir() {
        let args = Args::try_parse_from(["picsearch", "ingest", "--dir", "/tmp/pics"]).unwrap();
        assert!(matches!(
            args.command,
            Command::Ingest { dir: Some(ref d) } if d == &PathBuf::from("/tmp/pics")
        ));
    }

    #[test]
    fn test_missing_query_is_rejected() {
        let err = Args::try_parse_from(["picsearch", "search"]).unwrap_err();
        assert!(err.use_stderr());

        let err = Args::try_parse_from(["picsearch", "search", "cat", "--limit", "many"]).unwrap_err();
        assert!(err.use_stderr());
    }

    #[test]
    fn test_help_is_not_an_error() {
        let err = Args::try_parse_from(["picsearch", "--help"]).unwrap_err();
        assert!(!err.use_stderr());
    }
}
