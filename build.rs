use clap::CommandFactory;
use std::env;
use std::fs;
use std::io;
use std::path::PathBuf;

fn main() -> io::Result<()> {
    println!("cargo:rerun-if-changed=crates/treetracer-cli/src/lib.rs");

    let man = clap_mangen::Man::new(treetracer_cli::Args::command());
    let mut manpage: Vec<u8> = Default::default();
    man.render(&mut manpage)?;
    let options = treetracer_cli::render_options_markdown();

    let out_dir = PathBuf::from(
        env::var("OUT_DIR").map_err(|e| io::Error::new(io::ErrorKind::NotFound, e))?,
    );
    fs::write(out_dir.join("treetracer.1"), &manpage)?;
    fs::write(out_dir.join("command-line-options.md"), &options)?;

    // OUT_DIR is target/release/build/<pkg>/out; ship both next to the binary
    if env::var("PROFILE").unwrap_or_default() == "release" {
        if let Some(release_dir) = out_dir.ancestors().nth(3) {
            fs::write(release_dir.join("treetracer.1"), &manpage)?;
            fs::write(release_dir.join("command-line-options.md"), &options)?;
        }
    }

    Ok(())
}
