//! Shared CLI definitions for treetracer.
//!
//! Used by the main application and by the build script (manpage) and
//! gen_docs binary (command-line-options markdown).

use clap::{CommandFactory, Parser, ValueEnum};
use std::path::PathBuf;

/// What the binary writes to `--output` (or stdout).
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Only the chart description (plotly-compatible figure JSON)
    #[default]
    Figure,
    /// The full rendered state: plot display, file summaries and alert
    Snapshot,
}

/// Command-line arguments for treetracer
#[derive(Clone, Parser, Debug)]
#[command(
    name = "treetracer",
    version,
    about = "Visualize convergence of tree topologies from MDS trace files"
)]
pub struct Args {
    /// Trace files (.tsv) to upload. Files with other extensions are rejected and reported.
    #[arg(value_name = "PATH")]
    pub paths: Vec<PathBuf>,

    /// JSON upload batch: an array of {filename, content, last_modified} where content is a
    /// base64 data URL, as produced by a browser upload widget
    #[arg(long = "batch", value_name = "FILE")]
    pub batch: Option<PathBuf>,

    /// Filenames to select for plotting, in merge order (default: every uploaded file)
    #[arg(long = "select", value_name = "NAME", num_args = 1..)]
    pub select: Vec<String>,

    /// Exactly three dimension columns to plot, comma separated (e.g. MDS1,MDS2,MDS3)
    #[arg(long = "dims", value_name = "DIM", value_delimiter = ',')]
    pub dims: Vec<String>,

    /// Lowest tree number to include (inclusive)
    #[arg(long = "tree-min", value_name = "N")]
    pub tree_min: Option<u32>,

    /// Highest tree number to include (inclusive)
    #[arg(long = "tree-max", value_name = "N")]
    pub tree_max: Option<u32>,

    /// Groups to hide in the rendered chart (legend label as shown in the chart)
    #[arg(long = "hide", value_name = "GROUP")]
    pub hide: Vec<String>,

    /// Write output JSON to this file instead of stdout
    #[arg(long = "output", short = 'o', value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// What to write as JSON output
    #[arg(long = "format", value_enum, default_value_t = OutputFormat::Figure)]
    pub format: OutputFormat,

    /// Also render the three 2D projections to a PNG file
    #[arg(long = "png", value_name = "FILE")]
    pub png: Option<PathBuf>,

    /// Print a summary of each selected file to stderr
    #[arg(long = "summary", action)]
    pub summary: bool,

    /// Colour palette for groups (overrides config [plot] palette)
    #[arg(long = "palette", value_name = "NAME")]
    pub palette: Option<String>,

    /// Enable debug logging (RUST_LOG still takes precedence)
    #[arg(long = "debug", action)]
    pub debug: bool,

    /// Generate default configuration file at ~/.config/treetracer/config.toml
    #[arg(long = "generate-config", action)]
    pub generate_config: bool,

    /// Force overwrite existing config file when using --generate-config
    #[arg(long = "force", requires = "generate_config", action)]
    pub force: bool,
}

impl Args {
    /// Tree-number range requested on the command line, if either bound was given.
    /// A missing bound falls back to the provided default.
    pub fn tree_range(&self, default: (u32, u32)) -> Option<(u32, u32)> {
        if self.tree_min.is_none() && self.tree_max.is_none() {
            return None;
        }
        Some((
            self.tree_min.unwrap_or(default.0),
            self.tree_max.unwrap_or(default.1),
        ))
    }
}

/// Escape `|` and newlines for use in markdown table cells.
fn escape_table_cell(s: &str) -> String {
    s.replace('|', "\\|").replace(['\n', '\r'], " ")
}

/// Render command-line options as markdown.
pub fn render_options_markdown() -> String {
    let mut cmd = Args::command();
    cmd.build();

    let mut out = String::from("# Command Line Options\n\n");

    out.push_str("## Usage\n\n```\n");
    let usage = cmd.render_usage();
    out.push_str(&usage.to_string());
    out.push_str("\n```\n\n");

    out.push_str("## Options\n\n");
    out.push_str("| Option | Description |\n");
    out.push_str("|--------|-------------|\n");

    for arg in cmd.get_arguments() {
        let id = arg.get_id().as_ref().to_string();
        if id == "help" || id == "version" {
            continue;
        }

        let placeholder: String = arg
            .get_value_names()
            .map(|names| {
                names
                    .iter()
                    .map(|n: &clap::builder::Str| format!("<{}>", n.as_ref() as &str))
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .unwrap_or_default();

        let option_str = if arg.is_positional() {
            format!("[{placeholder}]")
        } else {
            let mut parts = Vec::new();
            if let Some(s) = arg.get_short() {
                parts.push(format!("-{s}"));
            }
            if let Some(l) = arg.get_long() {
                parts.push(format!("--{l}"));
            }
            let op = parts.join(", ");
            if arg.get_action().takes_values() && !placeholder.is_empty() {
                format!("{op} {placeholder}")
            } else {
                op
            }
        };

        let help = arg
            .get_help()
            .map(|h| escape_table_cell(&h.to_string()))
            .unwrap_or_else(|| "-".to_string());

        out.push_str(&format!("| `{option_str}` | {help} |\n"));
    }

    out.push_str(INPUT_FORMAT_MARKDOWN);
    out
}

/// Trailing section of the options page describing what the positional paths must contain.
const INPUT_FORMAT_MARKDOWN: &str = "
## Input files

Each path must be a tab-separated `.tsv` tree trace with a header row:

| Column | Content |
|--------|---------|
| `tree` | Newick string shown on hover (optional) |
| `group` | Group the tree belongs to |
| `V1`, `V2`, ... | Coordinates, shown as `MDS1`, `MDS2`, ... |

At least three coordinate columns are needed to draw a chart. `--batch` takes a
JSON array of `{\"filename\", \"content\"}` objects where `content` is a
base64 data URL.
";
