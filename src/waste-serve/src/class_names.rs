use std::fmt;
use std::fs;
use std::io;
use std::path::Path;

use log::{info, warn};
use serde::Serialize;
use serde_json::Value;

use crate::model::InferenceModel;

/// Where the subcategory labels of a classifier came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelSource {
    /// JSON array file shipped next to the model
    ClassNamesFile,
    /// Class names stored on the model object
    ModelAttribute,
    /// `class_names` of a layer in the model config
    ModelConfig,
    /// Synthesized `class_<i>` labels
    Generic,
}

impl fmt::Display for LabelSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LabelSource::ClassNamesFile => "class names file",
            LabelSource::ModelAttribute => "model attribute",
            LabelSource::ModelConfig => "model config",
            LabelSource::Generic => "generic labels",
        };
        f.write_str(name)
    }
}

/// Resolve the ordered class labels for `model`.
///
/// Sources are tried in order: the class names file, the model's own class
/// names, then its config layers from last to first. When none yields a
/// label list, or the list disagrees with the model's output width,
/// `class_<i>` labels are synthesized from that width.
pub(crate) fn resolve(
    model: &dyn InferenceModel,
    class_names_path: Option<&Path>,
) -> (Vec<String>, LabelSource) {
    let found = class_names_path
        .and_then(read_class_names_file)
        .map(|classes| (classes, LabelSource::ClassNamesFile))
        .or_else(|| non_empty(model.class_names()).map(|c| (c, LabelSource::ModelAttribute)))
        .or_else(|| {
            model
                .config()
                .and_then(from_model_config)
                .map(|classes| (classes, LabelSource::ModelConfig))
        });

    let width = model.output_width();

    match found {
        Some((classes, source)) => match width {
            Some(width) if width != classes.len() => {
                warn!(
                    "{} lists {} classes but the model outputs {}, using generic labels",
                    source,
                    classes.len(),
                    width
                );
                (generic(width), LabelSource::Generic)
            }
            _ => {
                info!("Loaded {} class names from {}", classes.len(), source);
                (classes, source)
            }
        },
        None => {
            let classes = width.map(generic).unwrap_or_default();
            if classes.is_empty() {
                warn!("Could not determine the number of classes, predictions will be labelled by index");
            } else {
                info!(
                    "Class names not found, falling back to {} generic labels",
                    classes.len()
                );
            }
            (classes, LabelSource::Generic)
        }
    }
}

/// `class_0` .. `class_{count-1}`
pub(crate) fn generic(count: usize) -> Vec<String> {
    (0..count).map(|i| format!("class_{}", i)).collect()
}

fn non_empty(classes: Option<Vec<String>>) -> Option<Vec<String>> {
    classes.filter(|classes| !classes.is_empty())
}

fn read_class_names_file(path: &Path) -> Option<Vec<String>> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return None,
        Err(err) => {
            warn!("Failed to read {}: {}", path.display(), err);
            return None;
        }
    };

    match serde_json::from_str::<Vec<String>>(&contents) {
        Ok(classes) => non_empty(Some(classes)),
        Err(err) => {
            warn!("Failed to parse {}: {}", path.display(), err);
            None
        }
    }
}

/// Scan the config layers backwards for the first `class_names` string list.
fn from_model_config(config: &Value) -> Option<Vec<String>> {
    let layers = config
        .get("layers")
        .or_else(|| config.get("config")?.get("layers"))?
        .as_array()?;

    layers
        .iter()
        .rev()
        .find_map(|layer| {
            let names = layer.get("config")?.get("class_names")?;
            serde_json::from_value::<Vec<String>>(names.clone()).ok()
        })
        .and_then(|classes| non_empty(Some(classes)))
}
