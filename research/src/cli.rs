use clap::builder::BoolishValueParser;
use clap::{ArgAction, Parser, ValueEnum};
use std::path::PathBuf;

/// Local deep research agent: plans a research task, searches the web for every
/// step and writes a markdown report.
#[derive(Parser, Debug)]
#[command(name = "deep-research", version, about)]
pub struct Cli {
    /// Research question; prompted for interactively when omitted
    #[arg(short, long)]
    pub query: Option<String>,

    /// Directory that receives one dated folder per research run
    #[arg(long, env = "RESEARCH_DATA_DIR", default_value = "data")]
    pub data_dir: PathBuf,

    /// Model used for planning, query generation and the final report
    #[arg(long, env = "RESEARCH_MODEL", default_value = "gpt-4o-mini")]
    pub model: String,

    /// Model used for web searches, must support web search
    #[arg(long, env = "RESEARCH_SEARCH_MODEL", default_value = "gpt-4o-search-preview")]
    pub search_model: String,

    /// How much context the web search may pull in
    #[arg(
        long,
        env = "RESEARCH_SEARCH_CONTEXT_SIZE",
        value_enum,
        default_value_t = ContextSize::Medium
    )]
    pub search_context_size: ContextSize,

    #[arg(long, env = "RESEARCH_LOCATION_CITY")]
    pub location_city: Option<String>,

    #[arg(long, env = "RESEARCH_LOCATION_REGION")]
    pub location_region: Option<String>,

    /// Two letter ISO country code
    #[arg(long, env = "RESEARCH_LOCATION_COUNTRY")]
    pub location_country: Option<String>,

    /// IANA timezone, e.g. Europe/Berlin
    #[arg(long, env = "RESEARCH_LOCATION_TIMEZONE")]
    pub location_timezone: Option<String>,

    /// Number of research steps searched at the same time
    #[arg(long, env = "RESEARCH_CONCURRENCY", default_value_t = 1)]
    pub concurrency: usize,

    /// Approve the research plan without asking
    #[arg(
        short,
        long,
        env = "RESEARCH_AUTO_APPROVE",
        action = ArgAction::SetTrue,
        value_parser = BoolishValueParser::new()
    )]
    pub yes: bool,

    /// Stop after the plan has been created and saved
    #[arg(
        long,
        env = "RESEARCH_PLAN_ONLY",
        action = ArgAction::SetTrue,
        value_parser = BoolishValueParser::new()
    )]
    pub plan_only: bool,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    pub verbose: u8,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContextSize {
    Low,
    Medium,
    High,
}

impl From<ContextSize> for agent::llm::SearchContextSize {
    fn from(size: ContextSize) -> Self {
        match size {
            ContextSize::Low => Self::Low,
            ContextSize::Medium => Self::Medium,
            ContextSize::High => Self::High,
        }
    }
}
