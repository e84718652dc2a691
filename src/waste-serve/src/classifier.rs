use std::path::{Path, PathBuf};

use image::imageops::{self, FilterType};
use image::DynamicImage;
use log::{debug, info};
use serde::Serialize;

use crate::class_names::{self, LabelSource};
use crate::error::{ClassifierError, Result};
use crate::labels::MainCategory;
use crate::model::{ImageTensor, InferenceModel};
use crate::timer::{StageTimer, Timings};

/// File looked up next to the model when no class names path is configured.
pub const CLASS_NAMES_FILE: &str = "class_names.json";

/// Startup options of a [`WasteClassifier`].
#[derive(Debug, Clone)]
pub struct ClassifierOptions {
    /// Model input size as `(width, height)`
    pub target_size: (u32, u32),

    /// JSON array of class names, tried before any model metadata
    pub class_names_path: Option<PathBuf>,
}

impl ClassifierOptions {
    pub fn square(edge: u32) -> Self {
        ClassifierOptions {
            target_size: (edge, edge),
            class_names_path: None,
        }
    }

    pub fn with_class_names<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.class_names_path = Some(path.into());
        self
    }
}

impl Default for ClassifierOptions {
    fn default() -> Self {
        ClassifierOptions::square(224)
    }
}

/// A successful prediction.
#[derive(Debug, Clone, Serialize)]
pub struct Prediction {
    pub subcategory: String,
    pub main_category: MainCategory,

    /// Raw model output at the predicted index
    pub confidence: f32,

    #[serde(skip)]
    pub timings: Timings,
}

/// Outcome of [`WasteClassifier::predict`], serialized as
/// `{success, subcategory, main_category, confidence}` or `{success, error}`.
#[derive(Debug, Clone, Serialize)]
pub struct ClassificationResult {
    pub success: bool,

    #[serde(flatten)]
    pub prediction: Option<Prediction>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<Result<Prediction>> for ClassificationResult {
    fn from(result: Result<Prediction>) -> Self {
        match result {
            Ok(prediction) => ClassificationResult {
                success: true,
                prediction: Some(prediction),
                error: None,
            },
            Err(err) => ClassificationResult {
                success: false,
                prediction: None,
                error: Some(err.to_string()),
            },
        }
    }
}

pub struct WasteClassifier {
    /// Inference backend
    model: Box<dyn InferenceModel>,

    /// Subcategory labels indexed by model output position
    classes: Vec<String>,

    label_source: LabelSource,

    /// Model input size as `(width, height)`
    target_size: (u32, u32),
}

impl WasteClassifier {
    /// Load the model artifact at `model_path` with the compiled-in backend.
    ///
    /// Without an explicit class names path, `class_names.json` inside the
    /// model directory is tried. Any load failure is fatal: there is no
    /// degraded mode without a model.
    pub fn load(model_path: &Path, options: ClassifierOptions) -> Result<Self> {
        if !model_path.exists() {
            return Err(ClassifierError::ModelLoad {
                path: model_path.to_path_buf(),
                reason: "no such file or directory".to_owned(),
            });
        }

        info!("Loading model from: {}", model_path.display());
        let timer = StageTimer::start("Loading model");
        let model = load_backend(model_path)?;
        info!("Model loaded in {} msec", timer.finish());

        let options = ClassifierOptions {
            class_names_path: options
                .class_names_path
                .or_else(|| Some(model_path.join(CLASS_NAMES_FILE))),
            ..options
        };

        Ok(WasteClassifier::with_model(model, options))
    }

    /// Wrap an already loaded model.
    pub fn with_model(model: Box<dyn InferenceModel>, options: ClassifierOptions) -> Self {
        let (classes, label_source) =
            class_names::resolve(model.as_ref(), options.class_names_path.as_deref());

        debug!("Classes ({}): {:?}", label_source, classes);

        WasteClassifier {
            model,
            classes,
            label_source,
            target_size: options.target_size,
        }
    }

    pub fn model(&self) -> &dyn InferenceModel {
        self.model.as_ref()
    }

    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    pub fn label_source(&self) -> LabelSource {
        self.label_source
    }

    /// True when the labels were synthesized because no class names were found.
    pub fn using_fallback(&self) -> bool {
        self.label_source == LabelSource::Generic
    }

    pub fn target_size(&self) -> (u32, u32) {
        self.target_size
    }

    /// Decode an upload into the model's input tensor.
    pub fn preprocess(&self, image_bytes: &[u8]) -> Result<ImageTensor> {
        let image = image::load_from_memory(image_bytes)
            .map_err(|err| ClassifierError::Preprocess(err.to_string()))?;

        Ok(to_tensor(&image, self.target_size))
    }

    /// Run the whole pipeline, reporting failures as errors.
    pub fn try_predict(&self, image_bytes: &[u8]) -> Result<Prediction> {
        let timer = StageTimer::start("Preprocessing image");
        let input = self.preprocess(image_bytes)?;
        let preprocess = timer.finish();

        let timer = StageTimer::start("Running inference");
        let output = self.model.predict(&input)?;
        let inference = timer.finish();

        if output.iter().any(|value| value.is_nan()) {
            return Err(ClassifierError::Inference(
                "model output contains NaN".to_owned(),
            ));
        }

        let (index, confidence) = argmax(&output).ok_or(ClassifierError::EmptyOutput)?;
        let subcategory = self.label(index);
        let main_category = MainCategory::for_subcategory(&subcategory);

        Ok(Prediction {
            subcategory,
            main_category,
            confidence,
            timings: Timings {
                preprocess,
                inference,
            },
        })
    }

    /// Classify an upload. Never fails: errors are folded into the result.
    pub fn predict(&self, image_bytes: &[u8]) -> ClassificationResult {
        self.try_predict(image_bytes).into()
    }

    fn label(&self, index: usize) -> String {
        self.classes
            .get(index)
            .cloned()
            .unwrap_or_else(|| index.to_string())
    }
}

/// Force RGB, stretch to `(width, height)` and scale to `[0, 1]`.
pub fn to_tensor(image: &DynamicImage, (width, height): (u32, u32)) -> ImageTensor {
    let rgb = image.to_rgb8();
    let resized = imageops::resize(&rgb, width, height, FilterType::CatmullRom);

    let data: Vec<f32> = resized
        .into_raw()
        .into_iter()
        .map(|x| f32::from(x) / 255f32)
        .collect();

    ImageTensor::new(data, width, height)
}

/// Index and value of the largest output; the first one wins ties.
fn argmax(values: &[f32]) -> Option<(usize, f32)> {
    values
        .iter()
        .copied()
        .enumerate()
        .fold(None, |best, (i, value)| match best {
            Some((_, top)) if value <= top => best,
            _ => Some((i, value)),
        })
}

#[cfg(feature = "tensorflow")]
fn load_backend(model_path: &Path) -> Result<Box<dyn InferenceModel>> {
    Ok(Box::new(crate::saved_model::SavedModel::load(model_path)?))
}

#[cfg(not(feature = "tensorflow"))]
fn load_backend(_model_path: &Path) -> Result<Box<dyn InferenceModel>> {
    Err(ClassifierError::NoBackend)
}
