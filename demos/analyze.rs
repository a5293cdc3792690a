use argh::FromArgs;
use label_lens::{
    AnalysisEngine, AnalysisSession, AnalysisWidget, ClientConfig, HttpAnalysisService,
    InMemoryPreviewStore, LabelSet, SelectedFile, WidgetState,
};
use std::{path::PathBuf, time::Duration};

// defaults for the client
const DEFAULT_HOST: &str = "localhost";
const DEFAULT_PORT: u16 = 8000;
const DEFAULT_BAR_WIDTH: usize = 40;

#[derive(FromArgs)]
/// Score images against a fixed set of labels using a similarity service
struct AnalyzeArgs {
    /// the host of the similarity service
    #[argh(option)]
    host: Option<String>,

    /// the port of the similarity service
    #[argh(option, short = 'p')]
    port: Option<u16>,

    /// path to a TOML client configuration
    #[argh(option, short = 'c')]
    config: Option<PathBuf>,

    /// comma separated labels replacing the configured ones
    #[argh(option, short = 'l')]
    labels: Option<String>,

    /// width of the result bars
    #[argh(option, short = 'w', default = "DEFAULT_BAR_WIDTH")]
    width: usize,

    /// the images to analyze, one after another
    #[argh(positional)]
    images: Vec<PathBuf>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args: AnalyzeArgs = argh::from_env();

    let mut config = match &args.config {
        Some(path) => ClientConfig::load(path)?,
        None => ClientConfig::default(),
    };
    if args.host.is_some() || args.port.is_some() {
        let host = args.host.as_deref().unwrap_or(DEFAULT_HOST);
        let port = args.port.unwrap_or(DEFAULT_PORT);
        config.endpoint = format!("http://{host}:{port}/compute_similarity/");
    }
    if let Some(labels) = &args.labels {
        config.labels = LabelSet::new(labels.split(',').map(str::trim).filter(|l| !l.is_empty()));
    }
    config.validate()?;

    if args.images.is_empty() {
        return Err("no images given".into());
    }

    let service = HttpAnalysisService::from_config(&config)?;
    log::info!("Using similarity service at {}", service.endpoint());

    let widget = AnalysisWidget::from_config(InMemoryPreviewStore::new(), &config);
    let mut session = AnalysisSession::new(widget, AnalysisEngine::new(service));
    let wait_for = config.request_timeout() + Duration::from_secs(1);

    for path in &args.images {
        let file = SelectedFile::from_path(path)?;
        println!("{} ({}, {} bytes)", file.name(), file.media_type(), file.size());

        if let Err(e) = session.select_file(file) {
            println!("  skipped: {e}");
            continue;
        }

        let widget = session.widget();
        if let Some(handle) = widget.preview() {
            match widget.previews().dimensions(handle) {
                Some((width, height)) => println!("  preview {} {width}x{height}", handle.url()),
                None => println!("  preview {}", handle.url()),
            }
        }

        session.submit();

        match session.wait(wait_for) {
            WidgetState::Succeeded => {
                let rows = session.widget().rows();
                let label_width = rows.iter().map(|r| r.label.len()).max().unwrap_or(0);
                for row in rows {
                    println!(
                        "  {:<label_width$} {:>5}% {}",
                        row.label,
                        row.percent_text(),
                        row.bar(args.width)
                    );
                }
            }
            WidgetState::Failed => {
                println!("  {}", session.widget().error_message().unwrap_or_default());
            }
            state => println!("  no result ({})", state.as_str()),
        }
    }

    Ok(())
}
