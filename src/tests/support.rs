//! Test doubles shared by the pipeline scenarios.

use std::cell::{Cell, RefCell};
use std::path::Path;

use crate::{
    embeddings::{Embedding, EmbeddingGateway, GatewayError, InputType},
    images::EncodedPayload,
};

/// Embeds images as their mean colour and text by colour words, so results
/// are predictable without a network.
#[derive(Default)]
pub struct ColorGateway {
    calls: RefCell<Vec<InputType>>,
    documents: Cell<usize>,
    /// Fail every document embed after this many succeeded
    fail_after: Option<usize>,
}

impl ColorGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_after(documents: usize) -> Self {
        Self {
            fail_after: Some(documents),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<InputType> {
        self.calls.borrow().clone()
    }
}

impl EmbeddingGateway for ColorGateway {
    fn embed_document(&self, payload: &EncodedPayload) -> Result<Embedding, GatewayError> {
        self.calls.borrow_mut().push(InputType::Document);

        if self.fail_after.is_some_and(|limit| self.documents.get() >= limit) {
            return Err(GatewayError::Status {
                status: 503,
                body: "service unavailable".to_string(),
            });
        }
        self.documents.set(self.documents.get() + 1);

        let image = image::load_from_memory(&payload.data)
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?
            .to_rgb8();

        let mut sum = [0f64; 3];
        for pixel in image.pixels() {
            for (acc, channel) in sum.iter_mut().zip(pixel.0) {
                *acc += channel as f64;
            }
        }
        let count = (image.width() * image.height()).max(1) as f64;
        let vector = sum
            .iter()
            .map(|total| (total / count / 255.0) as f32 + 0.01)
            .collect();

        Ok(Embedding::new(vector, InputType::Document))
    }

    fn embed_query(&self, text: &str) -> Result<Embedding, GatewayError> {
        self.calls.borrow_mut().push(InputType::Query);

        let mut vector = vec![0.01f32; 3];
        for word in text.split_whitespace() {
            match word.to_lowercase().as_str() {
                "red" => vector[0] += 1.0,
                "green" => vector[1] += 1.0,
                "blue" => vector[2] += 1.0,
                _ => {}
            }
        }
        Ok(Embedding::new(vector, InputType::Query))
    }
}

/// Write a single-colour image; the format follows the extension.
pub fn write_solid(dir: &Path, name: &str, rgb: [u8; 3], width: u32, height: u32) {
    image::RgbImage::from_pixel(width, height, image::Rgb(rgb))
        .save(dir.join(name))
        .unwrap();
}
