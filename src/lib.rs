use color_eyre::Result;
use serde::Serialize;
use tracing::{debug, info};

pub mod config;
pub mod error;
pub mod export;
pub mod filter;
pub mod ingest;
pub mod logging;
pub mod merge;
pub mod palette;
pub mod plot;
pub mod record;
pub mod registry;

pub use config::{AppConfig, ConfigManager};
pub use error::IngestError;
pub use filter::{FilterOutcome, FilterRequest};
pub use ingest::{IngestMode, IngestReport, UploadedFile};
pub use merge::MergedView;
pub use palette::Palette;
pub use plot::{Figure, Visibility};
pub use registry::{DatasetRegistry, FileMetadata};
pub use treetracer_cli::{Args, OutputFormat};

/// Application name used for the config directory and other app-specific paths
pub const APP_NAME: &str = "treetracer";

pub const NO_FILES_UPLOADED: &str = "No files uploaded yet.";
pub const NO_FILES_SELECTED: &str = "No files selected.";
pub const FILES_CLEARED: &str = "Files cleared.";
pub const TOO_FEW_DIMENSIONS: &str = "At least three dimensions are required to plot.";

#[derive(Debug, Clone)]
pub enum AppEvent {
    Upload(Vec<UploadedFile>),
    /// Upload that replaces already registered files of the same name
    Reingest(Vec<UploadedFile>),
    Select(Vec<String>),
    Filter(FilterRequest),
    /// Legend click on a group label
    ToggleGroup(String),
    Clear,
    Exit,
    Crash(String),
}

/// Dimension checklist and tree-number slider shown above the chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterControls {
    pub dimension_options: Vec<String>,
    /// Checked dimensions, in plotting order
    pub dimensions: Vec<String>,
    /// Slider bounds
    pub tree_range: (u32, u32),
    /// Selected slider values
    pub tree_min: u32,
    pub tree_max: u32,
    /// Slider marks: the two bounds, labelled with their value
    pub marks: Vec<(u32, String)>,
}

impl FilterControls {
    fn for_view(view: &MergedView, dimensions: &[String; 3]) -> Self {
        let (min, max) = view.tree_range;
        Self {
            dimension_options: view.dimensions.clone(),
            dimensions: dimensions.to_vec(),
            tree_range: (min, max),
            tree_min: min,
            tree_max: max,
            marks: slider_marks(min, max),
        }
    }

    pub fn request(&self) -> FilterRequest {
        FilterRequest::new(self.dimensions.clone(), (self.tree_min, self.tree_max))
    }
}

fn slider_marks(min: u32, max: u32) -> Vec<(u32, String)> {
    if min == max {
        vec![(min, min.to_string())]
    } else {
        vec![(min, min.to_string()), (max, max.to_string())]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlotDisplay {
    Placeholder { message: String },
    Chart {
        controls: FilterControls,
        figure: Figure,
    },
}

impl PlotDisplay {
    fn placeholder(message: &str) -> Self {
        Self::Placeholder {
            message: message.to_string(),
        }
    }

    pub fn figure(&self) -> Option<&Figure> {
        match self {
            Self::Chart { figure, .. } => Some(figure),
            Self::Placeholder { .. } => None,
        }
    }

    pub fn placeholder_message(&self) -> Option<&str> {
        match self {
            Self::Placeholder { message } => Some(message),
            Self::Chart { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InfoDisplay {
    Placeholder { message: String },
    Files { files: Vec<FileMetadata> },
}

impl InfoDisplay {
    fn placeholder(message: &str) -> Self {
        Self::Placeholder {
            message: message.to_string(),
        }
    }
}

/// Upload error banner.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Alert {
    pub message: String,
    pub visible: bool,
}

impl From<&IngestReport> for Alert {
    fn from(report: &IngestReport) -> Self {
        Self {
            message: report.message(),
            visible: report.show_alert(),
        }
    }
}

/// Everything the front end shows, as one serializable snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct Rendered<'a> {
    pub files: Vec<&'a str>,
    pub selected: &'a [String],
    pub plot: &'a PlotDisplay,
    pub info: &'a InfoDisplay,
    pub alert: &'a Alert,
}

/// Session state. Owned by [`App`]; nothing lives outside it.
#[derive(Debug)]
pub struct AppState {
    pub registry: DatasetRegistry,
    pub view: Option<MergedView>,
    pub selection: Vec<String>,
    pub plot: PlotDisplay,
    pub info: InfoDisplay,
    pub alert: Alert,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            registry: DatasetRegistry::new(),
            view: None,
            selection: Vec::new(),
            plot: PlotDisplay::placeholder(NO_FILES_UPLOADED),
            info: InfoDisplay::placeholder(NO_FILES_UPLOADED),
            alert: Alert::default(),
        }
    }
}

pub struct App {
    config: AppConfig,
    palette: Palette,
    state: AppState,
    num_events: usize,
}

impl App {
    pub fn new() -> Result<Self> {
        Self::with_config(AppConfig::default())
    }

    pub fn with_config(config: AppConfig) -> Result<Self> {
        config.validate()?;
        let palette = config.plot.palette()?;
        Ok(Self {
            config,
            palette,
            state: AppState::default(),
            num_events: 0,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    pub fn registry(&self) -> &DatasetRegistry {
        &self.state.registry
    }

    pub fn view(&self) -> Option<&MergedView> {
        self.state.view.as_ref()
    }

    pub fn figure(&self) -> Option<&Figure> {
        self.state.plot.figure()
    }

    pub fn alert(&self) -> &Alert {
        &self.state.alert
    }

    pub fn num_events(&self) -> usize {
        self.num_events
    }

    pub fn rendered(&self) -> Rendered<'_> {
        Rendered {
            files: self
                .state
                .registry
                .list_metadata()
                .into_iter()
                .map(|m| m.filename.as_str())
                .collect(),
            selected: &self.state.selection,
            plot: &self.state.plot,
            info: &self.state.info,
            alert: &self.state.alert,
        }
    }

    pub fn event(&mut self, event: &AppEvent) -> Option<AppEvent> {
        self.num_events += 1;
        match event {
            AppEvent::Upload(files) => self.upload(files, IngestMode::Add),
            AppEvent::Reingest(files) => self.upload(files, IngestMode::Replace),
            AppEvent::Select(names) => match self.select(names) {
                Ok(()) => None,
                Err(e) => Some(AppEvent::Crash(e.to_string())),
            },
            AppEvent::Filter(request) => match self.filter(request) {
                Ok(()) => None,
                Err(e) => Some(AppEvent::Crash(e.to_string())),
            },
            AppEvent::ToggleGroup(group) => {
                if let PlotDisplay::Chart { figure, .. } = &mut self.state.plot {
                    if !figure.toggle_group(group) {
                        debug!(group = %group, "legend toggle for unknown group");
                    }
                }
                None
            }
            AppEvent::Clear => {
                self.clear();
                None
            }
            AppEvent::Exit | AppEvent::Crash(_) => None,
        }
    }

    /// Ingest a batch and, when anything is registered, select every file.
    fn upload(&mut self, files: &[UploadedFile], mode: IngestMode) -> Option<AppEvent> {
        let report = ingest::ingest_batch_with(
            &mut self.state.registry,
            files,
            &self.config.ingest,
            mode,
        );
        self.state.alert = Alert::from(&report);
        if self.state.registry.is_empty() {
            self.state.plot = PlotDisplay::placeholder(NO_FILES_UPLOADED);
            self.state.info = InfoDisplay::placeholder(NO_FILES_UPLOADED);
            return None;
        }
        Some(AppEvent::Select(self.state.registry.filenames()))
    }

    fn select(&mut self, names: &[String]) -> Result<()> {
        self.state.selection = names.to_vec();
        if self.state.registry.is_empty() {
            self.state.view = None;
            self.state.plot = PlotDisplay::placeholder(NO_FILES_UPLOADED);
            self.state.info = InfoDisplay::placeholder(NO_FILES_UPLOADED);
            return Ok(());
        }

        let Some(view) = merge::merge_selection(&self.state.registry, names, &self.palette)? else {
            self.state.view = None;
            self.state.plot = PlotDisplay::placeholder(NO_FILES_SELECTED);
            self.state.info = InfoDisplay::placeholder(NO_FILES_SELECTED);
            return Ok(());
        };

        let files = self
            .state
            .registry
            .list_metadata()
            .into_iter()
            .filter(|m| view.selected_files.contains(&m.filename))
            .cloned()
            .collect();
        self.state.info = InfoDisplay::Files { files };

        self.state.plot = match view.default_dimensions() {
            Some(dims) => {
                let figure =
                    plot::build_figure(&view, &view.combined, &dims, None, &self.config.plot)?;
                PlotDisplay::Chart {
                    controls: FilterControls::for_view(&view, &dims),
                    figure,
                }
            }
            None => PlotDisplay::placeholder(TOO_FEW_DIMENSIONS),
        };
        debug!(
            dimensions = view.dimensions.len(),
            tree_range = ?view.tree_range,
            "plot display updated"
        );
        self.state.view = Some(view);
        Ok(())
    }

    /// Rebuild the chart for new controls. A request that cannot be plotted
    /// leaves the chart and controls as they are.
    fn filter(&mut self, request: &FilterRequest) -> Result<()> {
        let Some(view) = &self.state.view else {
            return Ok(());
        };
        let PlotDisplay::Chart { controls, figure } = &mut self.state.plot else {
            return Ok(());
        };
        match filter::apply(view, request, Some(&*figure), &self.config.plot)? {
            FilterOutcome::Unchanged => {}
            FilterOutcome::Updated(updated) => {
                controls.dimensions = request.dimensions.clone();
                controls.tree_min = request.tree_range.0;
                controls.tree_max = request.tree_range.1;
                *figure = updated;
            }
        }
        Ok(())
    }

    fn clear(&mut self) {
        self.state.registry.remove_all();
        self.state.view = None;
        self.state.selection.clear();
        self.state.plot = PlotDisplay::placeholder(FILES_CLEARED);
        self.state.info = InfoDisplay::placeholder(FILES_CLEARED);
        self.state.alert = Alert::default();
        info!("registry cleared");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tsv(name: &str, groups: &[&str]) -> UploadedFile {
        let mut content = String::from("tree\tgroup\tV1\tV2\tV3\n");
        for (i, group) in groups.iter().enumerate() {
            content.push_str(&format!("t{i}\t{group}\t{i}.0\t{i}.5\t{i}.25\n"));
        }
        UploadedFile::from_bytes(name, content.into_bytes())
    }

    fn run(app: &mut App, event: AppEvent) {
        let mut next = Some(event);
        while let Some(event) = next {
            next = app.event(&event);
        }
    }

    #[test]
    fn starts_with_placeholder() {
        let app = App::new().unwrap();
        assert_eq!(
            app.state().plot.placeholder_message(),
            Some(NO_FILES_UPLOADED)
        );
        assert!(!app.alert().visible);
    }

    #[test]
    fn upload_selects_every_file() {
        let mut app = App::new().unwrap();
        let next = app.event(&AppEvent::Upload(vec![
            tsv("a.tsv", &["A", "A"]),
            tsv("b.tsv", &["B"]),
        ]));
        let Some(AppEvent::Select(names)) = next else {
            panic!("expected a selection");
        };
        assert_eq!(names, vec!["a.tsv", "b.tsv"]);
    }

    #[test]
    fn failed_upload_raises_alert_only() {
        let mut app = App::new().unwrap();
        run(
            &mut app,
            AppEvent::Upload(vec![UploadedFile::from_bytes("notes.txt", b"x".to_vec())]),
        );
        assert!(app.alert().visible);
        assert!(app.alert().message.contains("notes.txt"));
        assert!(app.registry().is_empty());
        assert!(app.figure().is_none());
    }

    #[test]
    fn empty_selection_is_placeholder() {
        let mut app = App::new().unwrap();
        run(&mut app, AppEvent::Upload(vec![tsv("a.tsv", &["A"])]));
        assert!(app.figure().is_some());
        run(&mut app, AppEvent::Select(vec![]));
        assert_eq!(
            app.state().plot.placeholder_message(),
            Some(NO_FILES_SELECTED)
        );
        assert!(app.view().is_none());
    }

    #[test]
    fn too_few_dimensions_is_placeholder() {
        let mut app = App::new().unwrap();
        let content = "tree\tgroup\tV1\tV2\nt1\tA\t1\t2\n";
        run(
            &mut app,
            AppEvent::Upload(vec![UploadedFile::from_bytes(
                "flat.tsv",
                content.as_bytes().to_vec(),
            )]),
        );
        assert_eq!(
            app.state().plot.placeholder_message(),
            Some(TOO_FEW_DIMENSIONS)
        );
        assert!(matches!(app.state().info, InfoDisplay::Files { .. }));
    }

    #[test]
    fn toggle_survives_filter() {
        let mut app = App::new().unwrap();
        run(&mut app, AppEvent::Upload(vec![tsv("a.tsv", &["A", "B", "A"])]));
        run(&mut app, AppEvent::ToggleGroup("B".to_string()));
        run(
            &mut app,
            AppEvent::Filter(FilterRequest::new(
                vec!["MDS3".into(), "MDS1".into(), "MDS2".into()],
                (1, 2),
            )),
        );
        let figure = app.figure().unwrap();
        assert_eq!(figure.group_visibility()["B"], Visibility::LegendOnly);
        assert_eq!(figure.group_visibility()["A"], Visibility::Visible);
        let PlotDisplay::Chart { controls, .. } = &app.state().plot else {
            panic!("expected a chart");
        };
        assert_eq!(controls.dimensions, vec!["MDS3", "MDS1", "MDS2"]);
        assert_eq!((controls.tree_min, controls.tree_max), (1, 2));
    }

    #[test]
    fn invalid_filter_keeps_controls() {
        let mut app = App::new().unwrap();
        run(&mut app, AppEvent::Upload(vec![tsv("a.tsv", &["A"])]));
        let before = app.state().plot.clone();
        run(
            &mut app,
            AppEvent::Filter(FilterRequest::new(vec!["MDS1".into()], (1, 1))),
        );
        assert_eq!(app.state().plot, before);
    }

    #[test]
    fn clear_resets_everything() {
        let mut app = App::new().unwrap();
        run(&mut app, AppEvent::Upload(vec![tsv("a.tsv", &["A"])]));
        run(&mut app, AppEvent::Clear);
        assert!(app.registry().is_empty());
        assert_eq!(app.state().plot.placeholder_message(), Some(FILES_CLEARED));
        run(&mut app, AppEvent::Select(vec!["a.tsv".to_string()]));
        assert_eq!(
            app.state().plot.placeholder_message(),
            Some(NO_FILES_UPLOADED)
        );
    }

    #[test]
    fn controls_marks_cover_bounds() {
        assert_eq!(
            slider_marks(1, 5),
            vec![(1, "1".to_string()), (5, "5".to_string())]
        );
        assert_eq!(slider_marks(3, 3), vec![(3, "3".to_string())]);

        let mut app = App::new().unwrap();
        run(&mut app, AppEvent::Upload(vec![tsv("a.tsv", &["A", "A", "A"])]));
        let PlotDisplay::Chart { controls, .. } = &app.state().plot else {
            panic!("expected a chart");
        };
        assert_eq!(
            controls.marks,
            vec![(1, "1".to_string()), (3, "3".to_string())]
        );
    }

    #[test]
    fn reingest_replaces_but_upload_does_not() {
        let mut app = App::new().unwrap();
        run(&mut app, AppEvent::Upload(vec![tsv("a.tsv", &["A"])]));

        run(&mut app, AppEvent::Upload(vec![tsv("a.tsv", &["B", "C"])]));
        assert_eq!(app.registry().get_metadata("a.tsv").unwrap().groups, vec!["A"]);

        run(&mut app, AppEvent::Reingest(vec![tsv("a.tsv", &["B", "C"])]));
        assert_eq!(app.registry().len(), 1);
        assert_eq!(
            app.registry().get_metadata("a.tsv").unwrap().groups,
            vec!["B", "C"]
        );
        assert_eq!(app.view().unwrap().groups, vec!["B", "C"]);
    }
}
