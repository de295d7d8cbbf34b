//! QR decoding backed by rqrr.

use super::{Barcode, DecodeCallback, DecodeError, Decoder, InputImage};
use image::imageops::{self, FilterType};
use image::GrayImage;
use std::sync::mpsc::{self, Sender};
use std::sync::{Mutex, PoisonError};
use std::thread::{self, JoinHandle};

struct Job {
    image: InputImage,
    on_complete: DecodeCallback,
}

/// QR decoder running requests on its own completion thread.
pub struct QrDecoder {
    jobs: Mutex<Option<Sender<Job>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl QrDecoder {
    /// Starts the decoder thread.
    ///
    /// Images larger than `max_dimension` on either side are downscaled
    /// before detection.
    pub fn spawn(max_dimension: u32) -> std::io::Result<Self> {
        let (tx, rx) = mpsc::channel::<Job>();
        let worker = thread::Builder::new()
            .name("qr-decoder".into())
            .spawn(move || {
                for job in rx {
                    let result = decode_luma(&job.image, max_dimension);
                    (job.on_complete)(result);
                }
                tracing::debug!("QR decoder stopped");
            })?;
        Ok(Self {
            jobs: Mutex::new(Some(tx)),
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Stops accepting requests and waits for queued ones to complete.
    pub fn shutdown(&self) {
        drop(self.jobs.lock().unwrap_or_else(PoisonError::into_inner).take());
        let worker = self.worker.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(worker) = worker {
            // A completion may drop the last handle from the decoder thread.
            if worker.thread().id() != thread::current().id() && worker.join().is_err() {
                tracing::error!("QR decoder thread panicked");
            }
        }
    }
}

impl Decoder for QrDecoder {
    fn process(&self, image: InputImage, on_complete: DecodeCallback) {
        let job = Job { image, on_complete };
        let jobs = self.jobs.lock().unwrap_or_else(PoisonError::into_inner);
        let rejected = match jobs.as_ref() {
            Some(tx) => tx.send(job).err().map(|e| e.0),
            None => Some(job),
        };
        drop(jobs);
        if let Some(job) = rejected {
            (job.on_complete)(Err(DecodeError::Unavailable));
        }
    }
}

impl Drop for QrDecoder {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Decodes every QR symbol in an image, synchronously.
///
/// Symbols that are located but cannot be read are returned as
/// candidates without a payload.
pub fn decode_luma(input: &InputImage, max_dimension: u32) -> Result<Vec<Barcode>, DecodeError> {
    let frame = input.image();
    if !frame.is_valid() {
        return Err(DecodeError::InvalidImage(format!(
            "{} bytes for {}x{}",
            frame.pixels().len(),
            frame.width(),
            frame.height()
        )));
    }
    let gray = GrayImage::from_raw(frame.width(), frame.height(), frame.pixels().to_vec())
        .ok_or_else(|| DecodeError::InvalidImage("buffer does not match dimensions".into()))?;

    let upright = match input.rotation_degrees() {
        0 => gray,
        90 => imageops::rotate90(&gray),
        180 => imageops::rotate180(&gray),
        270 => imageops::rotate270(&gray),
        other => return Err(DecodeError::UnsupportedRotation(other)),
    };
    let prepared = downscale(upright, max_dimension);

    let (width, height) = prepared.dimensions();
    let mut search = rqrr::PreparedImage::prepare_from_greyscale(
        width as usize,
        height as usize,
        |x, y| prepared.get_pixel(x as u32, y as u32).0[0],
    );

    let grids = search.detect_grids();
    tracing::trace!(grids = grids.len(), width, height, "QR detection complete");

    Ok(grids
        .into_iter()
        .map(|grid| {
            let corners = grid.bounds.iter().map(|p| (p.x, p.y)).collect();
            let raw_value = match grid.decode() {
                Ok((_meta, content)) => Some(content),
                Err(e) => {
                    tracing::debug!(error = ?e, "Failed to decode QR code");
                    None
                }
            };
            Barcode { raw_value, corners }
        })
        .collect())
}

fn downscale(image: GrayImage, max_dimension: u32) -> GrayImage {
    let (width, height) = image.dimensions();
    if width <= max_dimension && height <= max_dimension {
        return image;
    }
    let scale = (width as f32 / max_dimension as f32).max(height as f32 / max_dimension as f32);
    let new_width = ((width as f32 / scale) as u32).max(1);
    let new_height = ((height as f32 / scale) as u32).max(1);
    imageops::resize(&image, new_width, new_height, FilterType::Triangle)
}
