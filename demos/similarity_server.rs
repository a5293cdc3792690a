use argh::FromArgs;
use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    routing::{get, post},
};
use label_lens::{MAX_FILE_BYTES, SimilarityResponse, TextInput};
use serde_json::{Value, json};
use std::sync::Arc;

// defaults for the server
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8000;

#[derive(FromArgs)]
/// Stand-in similarity service scoring images by their mean colour.
struct ServerArgs {
    /// the host to run the server on
    #[argh(option, default = "DEFAULT_HOST.to_string()")]
    host: String,

    /// the port to run the server on
    #[argh(option, short = 'p', default = "DEFAULT_PORT")]
    port: u16,
}

type ApiError = (StatusCode, Json<Value>);

fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (status, Json(json!({ "error": message.into() })))
}

async fn compute_similarity(
    State(model): State<Arc<MeanColorModel>>,
    mut multipart: Multipart,
) -> Result<Json<SimilarityResponse>, ApiError> {
    let mut image_bytes = None;
    let mut text_input = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, e.to_string()))?
    {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("file") => {
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| api_error(StatusCode::BAD_REQUEST, e.to_string()))?;
                image_bytes = Some(bytes);
            }
            Some("text_input") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| api_error(StatusCode::BAD_REQUEST, e.to_string()))?;
                let parsed: TextInput = serde_json::from_str(&text)
                    .map_err(|e| api_error(StatusCode::UNPROCESSABLE_ENTITY, e.to_string()))?;
                text_input = Some(parsed);
            }
            _ => log::debug!("Ignoring field {name:?}"),
        }
    }

    let image_bytes =
        image_bytes.ok_or_else(|| api_error(StatusCode::UNPROCESSABLE_ENTITY, "missing file"))?;
    let text_input = text_input
        .ok_or_else(|| api_error(StatusCode::UNPROCESSABLE_ENTITY, "missing text_input"))?;

    let image = image::load_from_memory(&image_bytes)
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, e.to_string()))?
        .to_rgb8();

    let probabilities = model.run(&image, &text_input.text_list);
    log::info!(
        "Scored {}x{} image against {} labels",
        image.width(),
        image.height(),
        text_input.text_list.len()
    );

    Ok(Json(SimilarityResponse {
        labels: text_input.text_list,
        probabilities,
    }))
}

/// Scores labels by how close their named colour is to the image's mean colour.
struct MeanColorModel;

impl MeanColorModel {
    const NAMED_COLORS: [(&'static str, [f64; 3]); 10] = [
        ("red", [220.0, 30.0, 30.0]),
        ("orange", [255.0, 140.0, 0.0]),
        ("yellow", [250.0, 220.0, 40.0]),
        ("green", [40.0, 170.0, 60.0]),
        ("blue", [30.0, 80.0, 220.0]),
        ("purple", [130.0, 50.0, 160.0]),
        ("pink", [250.0, 150.0, 190.0]),
        ("brown", [130.0, 80.0, 40.0]),
        ("black", [10.0, 10.0, 10.0]),
        ("white", [245.0, 245.0, 245.0]),
    ];

    /// Returns percentage-scale probabilities, index-aligned with `labels`.
    fn run(&self, image: &image::RgbImage, labels: &[String]) -> Vec<f64> {
        let mean = mean_color(image);
        let max_distance = (3.0 * 255.0f64.powi(2)).sqrt();

        let logits: Vec<f64> = labels
            .iter()
            .map(|label| {
                let similarity = Self::NAMED_COLORS
                    .iter()
                    .find(|(name, _)| name.eq_ignore_ascii_case(label.trim()))
                    .map(|(_, rgb)| 1.0 - distance(&mean, rgb) / max_distance)
                    .unwrap_or(0.0);
                100.0 * similarity
            })
            .collect();

        softmax(&logits).into_iter().map(|p| 100.0 * p).collect()
    }
}

fn mean_color(image: &image::RgbImage) -> [f64; 3] {
    let mut sum = [0.0f64; 3];
    for pixel in image.pixels() {
        for (acc, channel) in sum.iter_mut().zip(pixel.0) {
            *acc += channel as f64;
        }
    }
    let count = (image.width() as f64 * image.height() as f64).max(1.0);
    sum.map(|s| s / count)
}

fn distance(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f64>()
        .sqrt()
}

fn softmax(logits: &[f64]) -> Vec<f64> {
    let max = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = logits.iter().map(|l| (l - max).exp()).collect();
    let total: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / total).collect()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args: ServerArgs = argh::from_env();

    // format the host and port
    let addr = format!("{}:{}", args.host, args.port);

    let app = Router::new()
        .route("/", get(|| async { "Welcome to the similarity service!" }))
        .route("/compute_similarity/", post(compute_similarity))
        .layer(DefaultBodyLimit::max(MAX_FILE_BYTES as usize + 64 * 1024))
        .with_state(Arc::new(MeanColorModel));

    log::info!("Listening on: {}", addr);
    log::info!("Press Ctrl+C to stop the server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
