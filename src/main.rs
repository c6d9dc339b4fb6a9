use clap::Parser;
use color_eyre::eyre::eyre;
use color_eyre::Result;
use std::path::Path;
use std::sync::mpsc::{channel, Receiver, Sender, TryRecvError};
use tracing::{info, warn};
use treetracer::ingest::{read_batch, UploadedFile};
use treetracer::{
    export, logging, App, AppConfig, AppEvent, Args, ConfigManager, FilterRequest, InfoDisplay,
    OutputFormat, PlotDisplay, APP_NAME,
};

const PNG_SIZE: (u32, u32) = (800, 1200);

/// Collect the upload batch from positional paths and `--batch`.
fn upload_batch(args: &Args) -> Result<Vec<UploadedFile>> {
    let mut files = Vec::new();
    if let Some(batch) = &args.batch {
        let json = std::fs::read_to_string(batch)
            .map_err(|e| eyre!("Failed to read {}: {}", batch.display(), e))?;
        files.extend(read_batch(&json)?);
    }
    for path in &args.paths {
        files.push(UploadedFile::from_path(path)?);
    }
    if files.is_empty() {
        return Err(eyre!("No input files. Pass .tsv paths or --batch <FILE>."));
    }
    Ok(files)
}

/// Filter built from the current controls with the command-line overrides applied.
fn filter_request(args: &Args, app: &App) -> Option<FilterRequest> {
    let PlotDisplay::Chart { controls, .. } = &app.state().plot else {
        return None;
    };
    let range = args.tree_range(controls.tree_range);
    if args.dims.is_empty() && range.is_none() {
        return None;
    }
    let mut request = controls.request();
    if !args.dims.is_empty() {
        request.dimensions = args.dims.clone();
    }
    if let Some(range) = range {
        request.tree_range = range;
    }
    Some(request)
}

/// Handle every queued event, including follow-ups, until the queue is empty.
fn drain(app: &mut App, tx: &Sender<AppEvent>, rx: &Receiver<AppEvent>) -> Result<bool> {
    loop {
        match rx.try_recv() {
            Ok(AppEvent::Exit) => return Ok(false),
            Ok(AppEvent::Crash(msg)) => return Err(eyre!(msg)),
            Ok(event) => {
                if let Some(event) = app.event(&event) {
                    tx.send(event)?;
                }
            }
            Err(TryRecvError::Empty) => return Ok(true),
            Err(TryRecvError::Disconnected) => return Ok(false),
        }
    }
}

fn run(args: &Args, config: AppConfig) -> Result<App> {
    let (tx, rx) = channel::<AppEvent>();
    let mut app = App::with_config(config)?;

    tx.send(AppEvent::Upload(upload_batch(args)?))?;
    if !args.select.is_empty() {
        tx.send(AppEvent::Select(args.select.clone()))?;
    }
    if !drain(&mut app, &tx, &rx)? {
        return Ok(app);
    }

    if let Some(request) = filter_request(args, &app) {
        let options = app.view().map(|v| v.dimensions.clone()).unwrap_or_default();
        if request.axes(&options).is_none() {
            warn!(
                dimensions = ?request.dimensions,
                "filter not applied: choose exactly three distinct known dimensions"
            );
        }
        tx.send(AppEvent::Filter(request))?;
        drain(&mut app, &tx, &rx)?;
    }

    for group in &args.hide {
        tx.send(AppEvent::ToggleGroup(group.clone()))?;
    }
    tx.send(AppEvent::Exit)?;
    drain(&mut app, &tx, &rx)?;
    Ok(app)
}

fn write_output(path: Option<&Path>, json: &str) -> Result<()> {
    match path {
        Some(path) => {
            std::fs::write(path, json)
                .map_err(|e| eyre!("Failed to write {}: {}", path.display(), e))?;
            info!(path = %path.display(), "output written");
        }
        None => println!("{}", json),
    }
    Ok(())
}

fn report(args: &Args, app: &App) -> Result<()> {
    let alert = app.alert();
    if alert.visible {
        eprintln!("{}", alert.message);
    }

    if args.summary {
        match &app.state().info {
            InfoDisplay::Files { files } => {
                for metadata in files {
                    for line in metadata.summary_lines() {
                        eprintln!("{}", line);
                    }
                    eprintln!();
                }
            }
            InfoDisplay::Placeholder { message } => eprintln!("{}", message),
        }
    }

    let json = match args.format {
        OutputFormat::Snapshot => serde_json::to_string_pretty(&app.rendered())?,
        OutputFormat::Figure => match &app.state().plot {
            PlotDisplay::Chart { figure, .. } => serde_json::to_string(figure)?,
            PlotDisplay::Placeholder { message } => return Err(eyre!("{}", message)),
        },
    };
    write_output(args.output.as_deref(), &json)?;

    if let Some(png) = &args.png {
        let figure = app
            .figure()
            .ok_or_else(|| eyre!("Nothing to export: no chart was rendered"))?;
        export::write_projections_png(png, figure, PNG_SIZE)?;
        info!(path = %png.display(), "projections exported");
    }
    Ok(())
}

fn load_config(args: &Args) -> Result<AppConfig> {
    let mut config = AppConfig::load(APP_NAME)?;
    if let Some(palette) = &args.palette {
        config.plot.palette = palette.clone();
        config.plot.custom_palette = None;
    }
    if args.debug {
        config.debug.enabled = true;
    }
    config.validate()?;
    Ok(config)
}

fn handle_early_exit_flags(args: &Args) -> Result<Option<()>> {
    if args.generate_config {
        match ConfigManager::new(APP_NAME) {
            Ok(manager) => match manager.write_default_config(args.force) {
                Ok(path) => {
                    println!("Configuration written to {}", path.display());
                    return Ok(Some(()));
                }
                Err(e) => {
                    eprintln!("Error writing config: {}", e);
                    std::process::exit(1);
                }
            },
            Err(e) => {
                eprintln!("Error initializing config manager: {}", e);
                std::process::exit(1);
            }
        }
    }
    Ok(None)
}

fn main() -> Result<()> {
    let args = Args::parse();

    if let Some(()) = handle_early_exit_flags(&args)? {
        return Ok(());
    }

    color_eyre::install()?;
    let config = load_config(&args)?;
    logging::init(config.debug.enabled);

    let result = run(&args, config).and_then(|app| report(&args, &app));
    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn loaded_app() -> App {
        let mut app = App::new().unwrap();
        let content = "tree\tgroup\tV1\tV2\tV3\tV4\nt1\tA\t1\t2\t3\t4\nt2\tA\t2\t3\t4\t5\n";
        let mut next = Some(AppEvent::Upload(vec![UploadedFile::from_bytes(
            "a.tsv",
            content.as_bytes().to_vec(),
        )]));
        while let Some(event) = next {
            next = app.event(&event);
        }
        app
    }

    #[test]
    fn no_overrides_no_filter() {
        let args = Args::parse_from(["treetracer", "a.tsv"]);
        assert!(filter_request(&args, &loaded_app()).is_none());
    }

    #[test]
    fn overrides_fill_in_from_controls() {
        let args = Args::parse_from(["treetracer", "a.tsv", "--dims", "MDS4,MDS2,MDS1"]);
        let request = filter_request(&args, &loaded_app()).unwrap();
        assert_eq!(request.dimensions, vec!["MDS4", "MDS2", "MDS1"]);
        assert_eq!(request.tree_range, (1, 2));

        let args = Args::parse_from(["treetracer", "a.tsv", "--tree-max", "1"]);
        let request = filter_request(&args, &loaded_app()).unwrap();
        assert_eq!(request.dimensions, vec!["MDS1", "MDS2", "MDS3"]);
        assert_eq!(request.tree_range, (1, 1));
    }

    #[test]
    fn missing_inputs_is_an_error() {
        let args = Args::parse_from(["treetracer"]);
        assert!(upload_batch(&args).is_err());
    }
}
