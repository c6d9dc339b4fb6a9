//! Prints the treetracer options page (usage, option table, input file
//! layout) as markdown. With a path argument the page is written there
//! instead, e.g. `gen_docs docs/command-line-options.md`.

use std::io::Write;

fn main() -> std::io::Result<()> {
    let page = treetracer_cli::render_options_markdown();
    match std::env::args_os().nth(1) {
        Some(path) => std::fs::write(path, page),
        None => std::io::stdout().write_all(page.as_bytes()),
    }
}
