//! Waste photo classification on top of a pretrained image model.
//!
//! [`WasteClassifier`] owns the model handle and the subcategory labels and
//! turns raw upload bytes into a [`ClassificationResult`]. The static tables
//! in [`labels`] map subcategories to their coarse waste category and to the
//! display details shown by the model-info endpoint.

mod class_names;
mod classifier;
mod error;
pub mod labels;
mod model;
#[cfg(feature = "tensorflow")]
mod saved_model;
mod timer;

pub use class_names::LabelSource;
pub use classifier::{ClassificationResult, ClassifierOptions, Prediction, WasteClassifier};
pub use error::{ClassifierError, Result};
pub use labels::{DisplayDetails, MainCategory};
pub use model::{ImageTensor, InferenceModel};
#[cfg(feature = "tensorflow")]
pub use saved_model::SavedModel;
pub use timer::{StageTimer, Timings};
