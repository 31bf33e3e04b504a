use std::path::PathBuf;

use clap::Parser;

/// Command-line arguments.
///
/// Every value is optional so that an unset flag falls through to the
/// config file, then to the built-in default.
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "tta", version, about = "tta - Tempo trace aggregation")]
pub struct Cli {
    /// Graph model in the nodegraph provider [default: micro]
    #[arg(short = 'g', long)]
    pub graph: Option<String>,

    /// Tag name to query on [default: service.name]
    #[arg(short = 't', long)]
    pub tag: Option<String>,

    /// Regular expression the tag values must match [default: .*]
    #[arg(short = 'f', long = "filter")]
    pub tag_filter: Option<String>,

    /// Do not create an ingress node per tag value
    #[arg(short = 'n', long = "not-use-tag-as-node", alias = "not_use_tag_as_node")]
    pub not_use_tag_as_node: bool,

    /// Loop interval in seconds, 0 runs once [default: 0]
    #[arg(short = 'l', long = "loop-interval", alias = "loop_interval")]
    pub loop_interval: Option<u64>,

    /// Config file for connections [default: config.yml]
    #[arg(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Number of seconds to search back in time [default: 7200]
    #[arg(short = 's', long = "search-from", alias = "search_from")]
    pub search_from: Option<u64>,

    /// Tempo search mode: ingesters, blocks or all [default: ingesters]
    #[arg(short = 'm', long = "search-mode", alias = "search_mode")]
    pub search_mode: Option<String>,

    /// Average latency in milliseconds above which a node is failed [default: 40]
    #[arg(long = "threshold-ms")]
    pub threshold_ms: Option<f64>,

    /// Graph sync strategy: batch or incremental [default: batch]
    #[arg(long)]
    pub sync: Option<String>,

    /// Tempo base url, overrides tempo.url
    #[arg(long = "tempo-url")]
    pub tempo_url: Option<String>,

    /// Nodegraph provider base url, overrides nodegraph_provider.url
    #[arg(long = "nodegraph-url")]
    pub nodegraph_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_short_flags() {
        let cli = Cli::parse_from([
            "tta", "-g", "prod", "-t", "service.name", "-f", "cortex.*", "-n", "-l", "60", "-s",
            "3600", "-m", "blocks",
        ]);
        assert_eq!(cli.graph.as_deref(), Some("prod"));
        assert_eq!(cli.tag.as_deref(), Some("service.name"));
        assert_eq!(cli.tag_filter.as_deref(), Some("cortex.*"));
        assert!(cli.not_use_tag_as_node);
        assert_eq!(cli.loop_interval, Some(60));
        assert_eq!(cli.search_from, Some(3600));
        assert_eq!(cli.search_mode.as_deref(), Some("blocks"));
    }

    #[test]
    fn test_parse_underscore_aliases() {
        let cli = Cli::parse_from(["tta", "--loop_interval", "30", "--search_from", "600"]);
        assert_eq!(cli.loop_interval, Some(30));
        assert_eq!(cli.search_from, Some(600));
    }

    #[test]
    fn test_unset_flags_are_none() {
        let cli = Cli::parse_from(["tta"]);
        assert!(cli.graph.is_none());
        assert!(cli.config.is_none());
        assert!(!cli.not_use_tag_as_node);
    }
}
