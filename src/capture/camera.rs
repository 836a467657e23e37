//! Webcam capture via nokhwa

use super::FrameSource;
use crate::error::{Error, Result};
use image::RgbImage;
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{
    CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType, Resolution,
};
use nokhwa::Camera;

/// A local webcam streaming MJPEG, decoded to RGB
pub struct CameraSource {
    camera: Camera,
    index: u32,
}

impl CameraSource {
    /// Open camera `index`, asking for the closest mode to the given
    /// resolution and rate. MJPEG keeps USB cameras at full frame rate.
    pub fn open(index: u32, width: u32, height: u32, fps: u32) -> Result<Self> {
        let wanted = CameraFormat::new(Resolution::new(width, height), FrameFormat::MJPEG, fps);
        let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(wanted));

        let mut camera = Camera::new(CameraIndex::Index(index), requested)
            .map_err(|e| Error::Camera(format!("Failed to open camera {}: {}", index, e)))?;
        camera
            .open_stream()
            .map_err(|e| Error::Camera(format!("Failed to start camera stream: {}", e)))?;

        tracing::info!(
            "Camera {} streaming at {:?} @ {} fps",
            index,
            camera.resolution(),
            camera.frame_rate()
        );

        Ok(Self { camera, index })
    }
}

impl FrameSource for CameraSource {
    fn grab(&mut self) -> Result<RgbImage> {
        let buffer = self
            .camera
            .frame()
            .map_err(|e| Error::Camera(format!("Frame read failed: {}", e)))?;
        let decoded = buffer
            .decode_image::<RgbFormat>()
            .map_err(|e| Error::Camera(format!("Frame decode failed: {}", e)))?;

        let (width, height) = (decoded.width(), decoded.height());
        RgbImage::from_raw(width, height, decoded.into_raw())
            .ok_or_else(|| Error::Camera("Decoded frame has an unexpected size".to_string()))
    }

    fn describe(&self) -> String {
        format!("camera {}", self.index)
    }
}

impl Drop for CameraSource {
    fn drop(&mut self) {
        if let Err(e) = self.camera.stop_stream() {
            tracing::warn!("Failed to stop camera stream: {}", e);
        }
    }
}
