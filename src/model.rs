use std::path::Path;

use image::imageops::FilterType;
use thiserror::Error;

/// Input side of the model: a single 160x160 RGB image.
pub const IMAGE_DIMENSIONS: (u32, u32, u32) = (160, 160, 3);

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("failed to read model: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to read image: {0}")]
    ImageRead(#[source] std::io::Error),
    #[error("failed to decode image: {0}")]
    Image(#[from] image::ImageError),
    #[cfg(feature = "tensorflow")]
    #[error("tensorflow error: {0}")]
    TensorFlow(#[from] tensorflow::Status),
    #[error("operation '{0}' not found in graph")]
    MissingOperation(String),
    #[error("model session lock poisoned")]
    Poisoned,
    #[error("{0}")]
    Inference(String),
}

/// Batch of one image in NHWC layout with raw 0..255 channel values.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageTensor {
    data: Vec<f32>,
    height: u32,
    width: u32,
    channels: u32,
}

impl ImageTensor {
    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn shape(&self) -> [u64; 4] {
        [1, self.height as u64, self.width as u64, self.channels as u64]
    }
}

/// Decodes the image at `path` and squashes it to the model input size.
/// Aspect ratio is not preserved; grayscale and alpha inputs become RGB.
pub fn load_image_tensor(path: impl AsRef<Path>) -> Result<ImageTensor, ModelError> {
    let img = image::io::Reader::open(path)
        .and_then(|reader| reader.with_guessed_format())
        .map_err(ModelError::ImageRead)?
        .decode()?;

    let (width, height, channels) = IMAGE_DIMENSIONS;
    let resized = img.resize_exact(width, height, FilterType::Nearest).to_rgb8();

    let mut data = Vec::with_capacity((width * height * channels) as usize);
    for pixel in resized.pixels() {
        data.push(pixel[0] as f32);
        data.push(pixel[1] as f32);
        data.push(pixel[2] as f32);
    }

    Ok(ImageTensor {
        data,
        height,
        width,
        channels,
    })
}

/// Maps an image tensor to a probability for every label, in label order.
pub trait Classifier: Send + Sync {
    fn predict(&self, input: &ImageTensor) -> Result<Vec<f32>, ModelError>;
}

/// Index of the highest probability. Ties go to the first index and NaN never wins.
pub fn argmax(probabilities: &[f32]) -> Option<usize> {
    let mut best: Option<(usize, f32)> = None;
    for (i, &p) in probabilities.iter().enumerate() {
        if p.is_nan() {
            continue;
        }
        match best {
            Some((_, top)) if p <= top => {}
            _ => best = Some((i, p)),
        }
    }
    best.map(|(i, _)| i)
}

#[cfg(feature = "tensorflow")]
pub use self::tf::TensorFlowClassifier;

#[cfg(feature = "tensorflow")]
mod tf {
    use std::path::Path;
    use std::sync::Mutex;

    use tensorflow::{Graph, ImportGraphDefOptions, Session, SessionOptions, SessionRunArgs, Tensor};

    use super::{Classifier, ImageTensor, ModelError};

    struct Loaded {
        session: Session,
        graph: Graph,
    }

    /// Frozen TensorFlow graph with a single image input and a softmax output.
    pub struct TensorFlowClassifier {
        inner: Mutex<Loaded>,
        input_op: String,
        output_op: String,
    }

    impl TensorFlowClassifier {
        pub fn load(
            model_path: impl AsRef<Path>,
            input_op: &str,
            output_op: &str,
        ) -> Result<Self, ModelError> {
            let model_bytes = std::fs::read(model_path)?;

            let mut graph = Graph::new();
            graph.import_graph_def(&model_bytes, &ImportGraphDefOptions::new())?;

            for name in [input_op, output_op] {
                if graph.operation_by_name(name)?.is_none() {
                    return Err(ModelError::MissingOperation(name.to_string()));
                }
            }

            let session = Session::new(&SessionOptions::new(), &graph)?;

            Ok(Self {
                inner: Mutex::new(Loaded { session, graph }),
                input_op: input_op.to_string(),
                output_op: output_op.to_string(),
            })
        }
    }

    impl Classifier for TensorFlowClassifier {
        fn predict(&self, input: &ImageTensor) -> Result<Vec<f32>, ModelError> {
            let mut tensor = Tensor::new(&input.shape());
            tensor.copy_from_slice(input.data());

            let loaded = self.inner.lock().map_err(|_| ModelError::Poisoned)?;

            let input_operation = loaded
                .graph
                .operation_by_name(&self.input_op)?
                .ok_or_else(|| ModelError::MissingOperation(self.input_op.clone()))?;
            let output_operation = loaded
                .graph
                .operation_by_name(&self.output_op)?
                .ok_or_else(|| ModelError::MissingOperation(self.output_op.clone()))?;

            let mut args = SessionRunArgs::new();
            args.add_feed(&input_operation, 0, &tensor);
            let output_token = args.request_fetch(&output_operation, 0);
            loaded.session.run(&mut args)?;

            let output: Tensor<f32> = args.fetch(output_token)?;
            Ok(output.to_vec())
        }
    }
}
