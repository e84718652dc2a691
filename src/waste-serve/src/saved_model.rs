use std::collections::HashMap;
use std::convert::TryFrom;
use std::fs;
use std::path::Path;

use log::{debug, info, warn};
use serde_json::Value;
use tensorflow::{
    Graph, SavedModelBundle, Session, SessionOptions, SessionRunArgs, Shape, Status, Tensor,
    TensorInfo, DEFAULT_SERVING_SIGNATURE_DEF_KEY,
};

use crate::error::{ClassifierError, Result};
use crate::model::{ImageTensor, InferenceModel};

const SERVE_TAG: &str = "serve";

/// String constant some exports embed with the label list.
const CLASS_NAMES_OP: &str = "class_names";

/// Keras model config written next to the export.
const KERAS_CONFIG_FILE: &str = "config.json";

const VARIABLE_OPS: &[&str] = &["VarHandleOp", "VariableV2", "Variable"];

impl From<Status> for ClassifierError {
    fn from(status: Status) -> Self {
        ClassifierError::Inference(status.to_string())
    }
}

/// Operation name and output index of a signature tensor.
#[derive(Debug, Clone)]
struct Endpoint {
    operation: String,
    index: i32,
}

impl Endpoint {
    fn from_info(info: &TensorInfo) -> Self {
        Endpoint {
            operation: info.name().name.clone(),
            index: info.name().index,
        }
    }
}

/// TensorFlow SavedModel executed through libtensorflow.
pub struct SavedModel {
    /// TensorFlow model graph
    graph: Graph,

    /// TensorFlow session
    session: Session,

    /// `serving_default` input
    input: Endpoint,

    /// `serving_default` output
    output: Endpoint,

    output_shape: Option<Vec<Option<u64>>>,
    parameter_count: Option<u64>,
    class_names: Option<Vec<String>>,
    config: Option<Value>,

    /// Export directory name
    name: String,
}

impl SavedModel {
    /// Load the `serve` tag of a SavedModel export directory.
    pub fn load(export_dir: &Path) -> Result<Self> {
        let load_error = |reason: String| ClassifierError::ModelLoad {
            path: export_dir.to_path_buf(),
            reason,
        };

        let mut graph = Graph::new();
        let bundle =
            SavedModelBundle::load(&SessionOptions::new(), &[SERVE_TAG], &mut graph, export_dir)
                .map_err(|status| load_error(status.to_string()))?;

        let (input, output, output_shape) = {
            let signature = bundle
                .meta_graph_def()
                .get_signature(DEFAULT_SERVING_SIGNATURE_DEF_KEY)
                .map_err(|status| load_error(status.to_string()))?;

            let input = single_tensor(signature.inputs())
                .ok_or_else(|| load_error("serving signature must have one input".to_owned()))?;
            let output = single_tensor(signature.outputs())
                .ok_or_else(|| load_error("serving signature must have one output".to_owned()))?;

            (
                Endpoint::from_info(input),
                Endpoint::from_info(output),
                dims(output.shape()),
            )
        };

        let session = bundle.session;

        debug!("Serving input {:?}, output {:?}", input, output);

        let parameter_count = count_parameters(&graph);
        let class_names = embedded_class_names(&graph, &session);
        let config = read_keras_config(export_dir);

        info!(
            "SavedModel ready: output shape {:?}, {} parameters",
            output_shape,
            parameter_count.map_or_else(|| "unknown".to_owned(), |n| n.to_string())
        );

        Ok(SavedModel {
            graph,
            session,
            input,
            output,
            output_shape,
            parameter_count,
            class_names,
            config,
            name: export_dir
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| export_dir.display().to_string()),
        })
    }
}

impl InferenceModel for SavedModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn predict(&self, image: &ImageTensor) -> Result<Vec<f32>> {
        let [height, width, channels] = image.shape();

        let input = Tensor::new(&[1, height as u64, width as u64, channels as u64])
            .with_values(image.as_slice())?;

        let mut args = SessionRunArgs::new();

        args.add_feed(
            &self
                .graph
                .operation_by_name_required(&self.input.operation)?,
            self.input.index,
            &input,
        );

        let result = args.request_fetch(
            &self
                .graph
                .operation_by_name_required(&self.output.operation)?,
            self.output.index,
        );

        self.session.run(&mut args)?;
        let output: Tensor<f32> = args.fetch(result)?;

        Ok(output.iter().copied().collect())
    }

    fn output_shape(&self) -> Option<Vec<Option<u64>>> {
        self.output_shape.clone()
    }

    fn parameter_count(&self) -> Option<u64> {
        self.parameter_count
    }

    fn class_names(&self) -> Option<Vec<String>> {
        self.class_names.clone()
    }

    fn config(&self) -> Option<&Value> {
        self.config.as_ref()
    }
}

fn single_tensor(tensors: &HashMap<String, TensorInfo>) -> Option<&TensorInfo> {
    if tensors.len() == 1 {
        tensors.values().next()
    } else {
        None
    }
}

fn dims(shape: &Shape) -> Option<Vec<Option<u64>>> {
    let rank = shape.dims()?;

    Some(
        (0..rank)
            .map(|i| shape[i].and_then(|dim| u64::try_from(dim).ok()))
            .collect(),
    )
}

/// Sum of the element counts of every variable with a fully known shape.
fn count_parameters(graph: &Graph) -> Option<u64> {
    let mut total = None;

    for operation in graph.operation_iter() {
        let is_variable = operation
            .op_type()
            .map(|op_type| VARIABLE_OPS.contains(&op_type.as_str()))
            .unwrap_or(false);
        if !is_variable {
            continue;
        }

        let size = operation
            .get_attr_shape("shape")
            .ok()
            .and_then(|shape| dims(&shape))
            .and_then(|dims| dims.into_iter().try_fold(1u64, |acc, dim| Some(acc * dim?)));

        if let Some(size) = size {
            total = Some(total.unwrap_or(0) + size);
        }
    }

    total
}

fn embedded_class_names(graph: &Graph, session: &Session) -> Option<Vec<String>> {
    let operation = graph.operation_by_name(CLASS_NAMES_OP).ok()??;

    let mut args = SessionRunArgs::new();
    let token = args.request_fetch(&operation, 0);

    if let Err(status) = session.run(&mut args) {
        warn!("Could not evaluate {}: {}", CLASS_NAMES_OP, status);
        return None;
    }

    let names: Tensor<String> = args.fetch(token).ok()?;
    Some(names.iter().cloned().collect())
}

fn read_keras_config(export_dir: &Path) -> Option<Value> {
    let path = export_dir.join(KERAS_CONFIG_FILE);
    let contents = fs::read_to_string(&path).ok()?;

    serde_json::from_str(&contents)
        .map_err(|err| warn!("Ignoring malformed {}: {}", path.display(), err))
        .ok()
}
