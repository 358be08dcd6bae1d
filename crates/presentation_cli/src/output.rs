//! Text rendering for CLI output

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use domain::{MeanSource, ModelManifest, PredictionFeatures};

/// One line per model: canonical name, framework and summary
pub fn model_table(models: &[&ModelManifest]) -> String {
    if models.is_empty() {
        return "No models available.\n".to_string();
    }
    let width = models
        .iter()
        .map(|m| m.canonical_name().len())
        .max()
        .unwrap_or_default();

    let mut out = String::from("📦 Available Models:\n");
    for manifest in models {
        let _ = writeln!(
            out,
            "  {:<width$}  {:<16}  {}",
            manifest.canonical_name(),
            manifest.framework.to_string(),
            summary(&manifest.description),
        );
    }
    out
}

/// Human-readable manifest details
pub fn model_details(manifest: &ModelManifest, work_root: &Path) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "🧠 {} {}", manifest.name, manifest.version);
    if !manifest.description.trim().is_empty() {
        let _ = writeln!(out, "   {}", summary(&manifest.description));
    }
    let _ = writeln!(out, "   Framework:  {}", manifest.framework);
    if let Ok(dims) = manifest.image_dimensions() {
        let _ = writeln!(out, "   Input:      {dims}");
    }
    match manifest.mean() {
        Ok(MeanSource::PerChannel(mean)) => {
            let _ = writeln!(out, "   Mean:       {mean:?}");
        },
        Ok(MeanSource::Url(url)) => {
            let _ = writeln!(out, "   Mean:       {url}");
        },
        Err(_) => {},
    }
    if let Ok(scale) = manifest.scale() {
        let _ = writeln!(out, "   Scale:      {scale}");
    }
    if let Ok(order) = manifest.channel_order() {
        let _ = writeln!(out, "   Planes:     {order}");
    }
    if manifest.model.is_archive {
        let _ = writeln!(out, "   Archive:    {}", manifest.model.base_url);
    } else {
        let _ = writeln!(out, "   Graph:      {}", manifest.graph_url());
        let _ = writeln!(out, "   Weights:    {}", manifest.weights_url());
    }
    if let Some(url) = manifest.features_url() {
        let _ = writeln!(out, "   Labels:     {url}");
    }
    let _ = writeln!(
        out,
        "   Work dir:   {}",
        work_root.join(manifest.work_dir_suffix()).display()
    );
    out
}

/// Ranked classes for one image
pub fn prediction(path: &Path, manifest: &ModelManifest, features: &PredictionFeatures) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "📷 {} ({} {})",
        path.display(),
        manifest.name,
        manifest.version
    );
    for (rank, feature) in features.iter().enumerate() {
        let _ = writeln!(out, "  {:>2}. {feature}", rank + 1);
    }
    out
}

/// Results of several images as a JSON array
pub fn results_json(results: &[(PathBuf, PredictionFeatures)]) -> serde_json::Value {
    serde_json::Value::Array(
        results
            .iter()
            .map(|(path, features)| {
                serde_json::json!({
                    "image": path.display().to_string(),
                    "features": features,
                })
            })
            .collect(),
    )
}

fn summary(description: &str) -> &str {
    description.lines().next().unwrap_or_default().trim()
}
