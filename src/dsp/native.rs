//! Native output: drives a [`SoftwareHost`] from the default output device.

use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Sample, SampleFormat, SupportedBufferSize};
use parking_lot::Mutex;

use crate::error::ToneError;
use crate::host::{AudioHost, HostState, NodeId, Target};

use super::graph::SoftwareHost;

/// Frames rendered per lock when the device does not report a buffer size.
const FALLBACK_BLOCK: usize = 1024;

/// Audio host backed by a cpal output stream.
///
/// The control thread edits the shared graph; the device callback renders
/// it. Both sides only hold the lock for one call.
pub struct NativeHost {
    graph: Arc<Mutex<SoftwareHost>>,
    stream: Option<cpal::Stream>,
}

impl NativeHost {
    /// Open the default output device.
    pub fn open() -> Result<Self, ToneError> {
        let host = cpal::default_host();
        let device = host.default_output_device().ok_or_else(|| {
            ToneError::UnsupportedEnvironment("no output device available".to_string())
        })?;

        let supported = device.default_output_config().map_err(unsupported)?;
        let format = check_format(supported.sample_format())?;
        let block = block_frames(supported.buffer_size());

        let config = cpal::StreamConfig::from(supported);
        let sample_rate = config.sample_rate.0 as f64;
        tracing::debug!(sample_rate, channels = config.channels, ?format, "opening output stream");

        let graph = Arc::new(Mutex::new(SoftwareHost::new(sample_rate)?));
        let render_graph = Arc::clone(&graph);
        let stream = match format {
            SampleFormat::F32 => build_stream::<f32>(&device, &config, render_graph, block),
            SampleFormat::F64 => build_stream::<f64>(&device, &config, render_graph, block),
            SampleFormat::I16 => build_stream::<i16>(&device, &config, render_graph, block),
            SampleFormat::I32 => build_stream::<i32>(&device, &config, render_graph, block),
            // U16; check_format rejected everything else
            _ => build_stream::<u16>(&device, &config, render_graph, block),
        }?;

        Ok(NativeHost {
            graph,
            stream: Some(stream),
        })
    }
}

/// Sample formats the output stream can be built for.
fn check_format(format: SampleFormat) -> Result<SampleFormat, ToneError> {
    match format {
        SampleFormat::F32
        | SampleFormat::F64
        | SampleFormat::I16
        | SampleFormat::I32
        | SampleFormat::U16 => Ok(format),
        other => Err(ToneError::UnsupportedEnvironment(format!(
            "unsupported sample format {other:?}"
        ))),
    }
}

/// Frames rendered per lock, sized from what the device may ask for.
fn block_frames(buffer: &SupportedBufferSize) -> usize {
    match *buffer {
        SupportedBufferSize::Range { max, .. } if max > 0 => (max as usize).min(8192),
        _ => FALLBACK_BLOCK,
    }
}

fn unsupported(e: impl std::fmt::Display) -> ToneError {
    ToneError::UnsupportedEnvironment(e.to_string())
}

/// A vanished device is fatal; anything else refusing to play is treated
/// like a browser autoplay refusal.
fn play_error(e: cpal::PlayStreamError) -> ToneError {
    match e {
        cpal::PlayStreamError::DeviceNotAvailable => unsupported(e),
        other => ToneError::HostPolicyDenied(other.to_string()),
    }
}

/// Copy mono frames to every channel of an interleaved buffer.
fn fan_out<T: Sample + cpal::FromSample<f32>>(data: &mut [T], channels: usize, mono: &[f32]) {
    for (frame, &sample) in data.chunks_mut(channels).zip(mono) {
        frame.fill(T::from_sample(sample));
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    graph: Arc<Mutex<SoftwareHost>>,
    block: usize,
) -> Result<cpal::Stream, ToneError>
where
    T: Sample + Send + 'static + cpal::SizedSample + cpal::FromSample<f32>,
{
    let channels = config.channels as usize;
    let mut mono = vec![0.0_f32; block];
    device
        .build_output_stream(
            config,
            move |data: &mut [T], _: &cpal::OutputCallbackInfo| {
                for chunk in data.chunks_mut(channels * block) {
                    let frames = &mut mono[..chunk.len() / channels];
                    graph.lock().render(frames);
                    fan_out(chunk, channels, frames);
                }
            },
            |err| tracing::error!(%err, "output stream error"),
            None,
        )
        .map_err(unsupported)
}

impl AudioHost for NativeHost {
    fn current_time(&self) -> f64 {
        self.graph.lock().current_time()
    }

    fn state(&self) -> HostState {
        self.graph.lock().state()
    }

    fn resume(&mut self) -> Result<(), ToneError> {
        let stream = self.stream.as_ref().ok_or_else(|| {
            ToneError::UnsupportedEnvironment("output stream is closed".to_string())
        })?;
        stream
            .play()
            .map_err(play_error)?;
        self.graph.lock().resume()
    }

    fn close(&mut self) {
        self.stream = None;
        self.graph.lock().close();
    }

    fn create_oscillator(&mut self, frequency: f64) -> Result<NodeId, ToneError> {
        self.graph.lock().create_oscillator(frequency)
    }

    fn create_gain(&mut self, initial: f64) -> Result<NodeId, ToneError> {
        self.graph.lock().create_gain(initial)
    }

    fn connect(&mut self, from: NodeId, to: Target) -> Result<(), ToneError> {
        self.graph.lock().connect(from, to)
    }

    fn disconnect(&mut self, node: NodeId) -> Result<(), ToneError> {
        self.graph.lock().disconnect(node)
    }

    fn start(&mut self, oscillator: NodeId) -> Result<(), ToneError> {
        self.graph.lock().start(oscillator)
    }

    fn stop(&mut self, oscillator: NodeId) -> Result<(), ToneError> {
        self.graph.lock().stop(oscillator)
    }

    fn release(&mut self, node: NodeId) -> Result<(), ToneError> {
        self.graph.lock().release(node)
    }

    fn set_value_at_time(
        &mut self,
        node: NodeId,
        value: f64,
        time: f64,
    ) -> Result<(), ToneError> {
        self.graph.lock().set_value_at_time(node, value, time)
    }

    fn set_target_at_time(
        &mut self,
        node: NodeId,
        target: f64,
        time: f64,
        time_constant: f64,
    ) -> Result<(), ToneError> {
        self.graph
            .lock()
            .set_target_at_time(node, target, time, time_constant)
    }

    fn param_value(&self, node: NodeId) -> Option<f64> {
        self.graph.lock().param_value(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn common_device_formats_are_accepted() {
        for format in [
            SampleFormat::F32,
            SampleFormat::F64,
            SampleFormat::I16,
            SampleFormat::I32,
            SampleFormat::U16,
        ] {
            assert_eq!(check_format(format).ok(), Some(format));
        }
    }

    #[test]
    fn exotic_formats_are_unsupported() {
        for format in [SampleFormat::U8, SampleFormat::I8, SampleFormat::U64] {
            assert!(matches!(
                check_format(format),
                Err(ToneError::UnsupportedEnvironment(_))
            ));
        }
    }

    #[test]
    fn block_size_follows_the_device() {
        let range = SupportedBufferSize::Range { min: 64, max: 2048 };
        assert_eq!(block_frames(&range), 2048);
        let huge = SupportedBufferSize::Range { min: 64, max: u32::MAX };
        assert_eq!(block_frames(&huge), 8192);
        assert_eq!(block_frames(&SupportedBufferSize::Unknown), FALLBACK_BLOCK);
    }

    #[test]
    fn play_errors_map_by_cause() {
        assert!(play_error(cpal::PlayStreamError::DeviceNotAvailable).is_fatal());
        let backend = cpal::PlayStreamError::BackendSpecific {
            err: cpal::BackendSpecificError {
                description: "busy".to_string(),
            },
        };
        assert!(matches!(play_error(backend), ToneError::HostPolicyDenied(_)));
    }

    #[test]
    fn mono_is_copied_to_every_channel() {
        let mono = [0.5_f32, -0.5];
        let mut stereo = [0.0_f32; 4];
        fan_out(&mut stereo, 2, &mono);
        assert_eq!(stereo, [0.5, 0.5, -0.5, -0.5]);

        let mut ints = [0_i16; 4];
        fan_out(&mut ints, 2, &mono);
        assert!(ints[0] > 16000 && ints[1] == ints[0]);
        assert!(ints[2] < -16000);
    }
}
