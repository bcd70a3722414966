use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use approx::assert_abs_diff_eq;
use parking_lot::Mutex;

use super::driver::OutStreamDriver;
use super::protocol::{CapturedFrames, WriteContext};
use super::shared::StreamShared;
use super::{InStream, OutStream};
use crate::models::config::StreamConfig;
use crate::models::error::StreamError;
use crate::models::format::SampleFormat;
use crate::models::layout::{BuiltinLayout, ChannelLayout};
use crate::models::state::StreamState;
use crate::processing::channel_areas::AreaLayout;
use crate::processing::sine::SineWave;
use crate::test_support::{input_device, output_device, Captured, ManualBackend, ManualTransport};
use crate::traits::backend::Backend;
use crate::traits::stream_callbacks::{NoopDelegate, StreamDelegate};

#[derive(Clone, Default)]
struct Recorder {
    underflows: Arc<AtomicUsize>,
    overflows: Arc<AtomicUsize>,
    errors: Arc<Mutex<Vec<StreamError>>>,
}

impl StreamDelegate for Recorder {
    fn on_underflow(&mut self) {
        self.underflows.fetch_add(1, Ordering::SeqCst);
    }

    fn on_overflow(&mut self) {
        self.overflows.fetch_add(1, Ordering::SeqCst);
    }

    fn on_error(&mut self, error: &StreamError) {
        self.errors.lock().push(error.clone());
    }
}

fn encode_f32(value: f64, sample: &mut [u8]) {
    sample.copy_from_slice(&(value as f32).to_ne_bytes());
}

fn decode_f32(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks(4)
        .map(|chunk| f32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}

/// Writes up to `frames` frames of `value`, bracket by bracket.
fn write_constant(ctx: &mut WriteContext<'_>, frames: usize, value: f32) -> usize {
    let mut left = frames;
    while left > 0 {
        let mut areas = match ctx.begin_write(left).unwrap() {
            Some(areas) => areas,
            None => {
                ctx.end_write().unwrap();
                break;
            }
        };
        let written = areas.frame_count();
        for channel in 0..areas.channel_count() {
            for sample in areas.channel_mut(channel) {
                sample.copy_from_slice(&value.to_ne_bytes());
            }
        }
        ctx.end_write().unwrap();
        left -= written;
    }
    frames - left
}

fn backend() -> (Arc<ManualBackend>, Arc<dyn Backend>) {
    let manual = ManualBackend::new();
    let backend: Arc<dyn Backend> = manual.clone();
    (manual, backend)
}

fn started_output(
    backend: &Arc<dyn Backend>,
    callback: impl FnMut(&mut WriteContext<'_>, usize, usize) + Send + 'static,
    delegate: Recorder,
) -> OutStream {
    let mut stream = OutStream::new(Arc::clone(backend), output_device());
    stream.set_write_callback(callback);
    stream.set_delegate(delegate);
    stream.open().unwrap();
    stream.start().unwrap();
    stream
}

#[test]
fn lifecycle_reaches_running_on_first_cycle() {
    let (manual, backend) = backend();
    let mut stream = OutStream::new(backend, output_device());
    assert_eq!(stream.state(), StreamState::Created);

    stream.configure(StreamConfig::default()).unwrap();
    assert_eq!(stream.state(), StreamState::Configured);

    stream.set_write_callback(|ctx, _min, max| {
        write_constant(ctx, max, 0.0);
    });
    stream.open().unwrap();
    assert_eq!(stream.state(), StreamState::Opened);
    let params = stream.params().unwrap();
    assert_eq!(params.format, SampleFormat::FLOAT32_NE);
    assert_eq!(params.sample_rate, 48000);
    assert_eq!(params.bytes_per_frame(), 8);

    stream.start().unwrap();
    assert_eq!(stream.state(), StreamState::Started);

    let report = manual.control().output_cycle(256, 256);
    assert_eq!(report.frames, 256);
    assert!(!report.xrun);
    assert_eq!(stream.state(), StreamState::Running);

    let diagnostics = stream.diagnostics();
    assert_eq!(diagnostics.callback_count, 1);
    assert_eq!(diagnostics.frames_transferred, 256);
    assert!(diagnostics.opened_at.is_some());
}

#[test]
fn bracket_discipline_is_enforced() {
    let (manual, backend) = backend();
    let cycles = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&cycles);
    let _stream = started_output(
        &backend,
        move |ctx, _min, _max| {
            seen.fetch_add(1, Ordering::SeqCst);

            assert!(matches!(ctx.end_write(), Err(StreamError::Invalid(_))));
            assert!(matches!(ctx.begin_write(0), Err(StreamError::Invalid(_))));

            let frames = ctx.begin_write(64).unwrap().unwrap().frame_count();
            assert_eq!(frames, 64);
            assert!(matches!(ctx.begin_write(64), Err(StreamError::Invalid(_))));
            ctx.end_write().unwrap();
            assert!(matches!(ctx.end_write(), Err(StreamError::Invalid(_))));

            // The stream still accepts the next bracket.
            assert!(ctx.begin_write(64).unwrap().is_some());
            ctx.end_write().unwrap();
            assert_eq!(ctx.frames_written(), 128);
        },
        Recorder::default(),
    );

    let report = manual.control().output_cycle(512, 128);
    assert_eq!(cycles.load(Ordering::SeqCst), 1);
    assert_eq!(report.frames, 128);
    assert_eq!(manual.control().transport.lock().played.len(), 128 * 8);
}

#[test]
fn zero_frame_begin_still_needs_end() {
    let (manual, backend) = backend();
    let _stream = started_output(
        &backend,
        |ctx, _min, _max| {
            assert!(ctx.begin_write(32).unwrap().is_none());
            assert!(matches!(ctx.begin_write(32), Err(StreamError::Invalid(_))));
            ctx.end_write().unwrap();
            assert!(matches!(ctx.end_write(), Err(StreamError::Invalid(_))));
        },
        Recorder::default(),
    );

    let report = manual.control().output_cycle(0, 0);
    assert_eq!(report.frames, 0);
    assert!(!report.xrun);
}

#[test]
fn transfers_before_start_are_rejected() {
    let shared = StreamShared::new();
    shared.state.transition(StreamState::Configured).unwrap();
    shared.state.transition(StreamState::Opened).unwrap();
    let params = crate::models::audio_models::StreamParams {
        name: "early".into(),
        format: SampleFormat::FLOAT32_NE,
        sample_rate: 48000,
        layout: ChannelLayout::stereo(),
        software_latency: 0.01,
    };
    let areas = AreaLayout::interleaved(2, 4);
    let mut transport = ManualTransport::default();
    transport.space = 64;

    let mut ctx = WriteContext::new(&shared, &params, &areas, &mut transport);
    assert!(matches!(ctx.begin_write(16), Err(StreamError::Invalid(_))));
}

#[test]
fn driver_skips_cycles_until_started() {
    let shared = Arc::new(StreamShared::new());
    let params = crate::models::audio_models::StreamParams {
        name: "idle".into(),
        format: SampleFormat::FLOAT32_NE,
        sample_rate: 48000,
        layout: ChannelLayout::mono(),
        software_latency: 0.01,
    };
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&calls);
    let mut driver = OutStreamDriver::new(
        Arc::clone(&shared),
        params,
        AreaLayout::interleaved(1, 4),
        Box::new(move |_: &mut WriteContext<'_>, _: usize, _: usize| {
            seen.fetch_add(1, Ordering::SeqCst);
        }),
        Box::new(NoopDelegate),
    );
    let mut transport = ManualTransport::default();

    let report = driver.run_cycle(&mut transport, 0, 16);
    assert!(report.skipped);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(shared.diagnostics().callback_count, 0);
}

#[test]
fn faulted_stream_accepts_nothing() {
    let (manual, backend) = backend();
    let recorder = Recorder::default();
    let errors = Arc::clone(&recorder.errors);
    let mut stream = started_output(
        &backend,
        |ctx, _min, max| {
            if ctx.begin_write(max).unwrap().is_some() {
                assert_eq!(ctx.end_write(), Err(StreamError::Streaming));
            }
            assert_eq!(ctx.begin_write(max).unwrap_err(), StreamError::Streaming);
        },
        recorder,
    );

    manual.control().transport.lock().fail_end = Some(StreamError::Streaming);
    let report = manual.control().output_cycle(64, 0);
    assert!(!report.skipped);
    assert_eq!(stream.state(), StreamState::Faulted);
    assert_eq!(errors.lock().as_slice(), &[StreamError::Streaming]);

    let report = manual.control().output_cycle(64, 0);
    assert!(report.skipped);
    assert_eq!(stream.pause(true), Err(StreamError::Streaming));
    assert_eq!(stream.clear_buffer(), Err(StreamError::Streaming));
    assert_eq!(stream.start(), Err(StreamError::Streaming));
    assert_eq!(stream.diagnostics().callback_count, 1);
}

#[test]
fn backend_reported_error_faults_the_stream() {
    let (manual, backend) = backend();
    let recorder = Recorder::default();
    let errors = Arc::clone(&recorder.errors);
    let stream = started_output(&backend, |_, _, _| {}, recorder);

    manual.control().report_error(StreamError::BackendDisconnected);
    assert_eq!(stream.state(), StreamState::Faulted);
    assert_eq!(errors.lock().as_slice(), &[StreamError::BackendDisconnected]);
}

#[test]
fn short_cycle_counts_one_underflow() {
    let (manual, backend) = backend();
    let recorder = Recorder::default();
    let underflows = Arc::clone(&recorder.underflows);
    let stream = started_output(
        &backend,
        |ctx, _min, _max| {
            write_constant(ctx, 10, 0.5);
        },
        recorder,
    );

    let report = manual.control().output_cycle(256, 100);
    assert_eq!(report.frames, 10);
    assert!(report.xrun);
    assert_eq!(underflows.load(Ordering::SeqCst), 1);
    assert_eq!(stream.diagnostics().underflow_count, 1);
    assert_eq!(stream.state(), StreamState::Running);
}

#[test]
fn transport_underflow_is_reported_once() {
    let (manual, backend) = backend();
    let recorder = Recorder::default();
    let underflows = Arc::clone(&recorder.underflows);
    let stream = started_output(
        &backend,
        |ctx, _min, max| {
            let frames = ctx.begin_write(max).unwrap().map_or(0, |areas| areas.frame_count());
            assert_eq!(frames, max);
            assert_eq!(ctx.end_write(), Err(StreamError::Underflow));
        },
        recorder,
    );

    manual.control().transport.lock().fail_end = Some(StreamError::Underflow);
    let report = manual.control().output_cycle(128, 128);
    assert_eq!(report.frames, 128);
    assert!(report.xrun);
    assert_eq!(underflows.load(Ordering::SeqCst), 1);
    assert_eq!(stream.state(), StreamState::Running);
}

#[test]
fn sine_phase_is_continuous_across_cycles_and_brackets() {
    let (manual, backend) = backend();
    let mut wave = SineWave::new(440.0);
    let _stream = started_output(
        &backend,
        move |ctx, _min, max| {
            let seconds_per_frame = ctx.seconds_per_frame();
            let mut left = max;
            while left > 0 {
                let mut areas = match ctx.begin_write(left).unwrap() {
                    Some(areas) => areas,
                    None => {
                        ctx.end_write().unwrap();
                        break;
                    }
                };
                let frames = areas.frame_count();
                wave.render(&mut areas, seconds_per_frame, encode_f32);
                ctx.end_write().unwrap();
                left -= frames;
            }
        },
        Recorder::default(),
    );

    let control = manual.control();
    control.transport.lock().max_bracket = 200;
    for frames in [480, 120, 960] {
        let report = control.output_cycle(frames, frames);
        assert_eq!(report.frames, frames);
    }

    let played = decode_f32(&control.transport.lock().played);
    let reference = SineWave::new(440.0);
    assert_eq!(played.len(), 1560 * 2);
    for (frame, pair) in played.chunks(2).enumerate() {
        let expected = reference.value_at(frame, 1.0 / 48000.0) as f32;
        assert_abs_diff_eq!(pair[0], expected, epsilon = 1e-5);
        assert_abs_diff_eq!(pair[1], expected, epsilon = 1e-5);
    }
}

#[test]
fn pause_and_resume_from_controller() {
    let (manual, backend) = backend();
    let stream = started_output(
        &backend,
        |ctx, _min, max| {
            write_constant(ctx, max, 0.0);
        },
        Recorder::default(),
    );
    let control = manual.control();
    control.output_cycle(64, 64);

    let controller = stream.controller().unwrap();
    controller.pause(true).unwrap();
    assert_eq!(stream.state(), StreamState::Paused);
    controller.pause(true).unwrap();
    assert_eq!(control.pause_calls.load(Ordering::SeqCst), 1);

    stream.pause(false).unwrap();
    assert_eq!(stream.state(), StreamState::Running);
    assert_eq!(control.pause_calls.load(Ordering::SeqCst), 2);
}

#[test]
fn pause_from_callback_excuses_the_shortfall() {
    let (manual, backend) = backend();
    let recorder = Recorder::default();
    let underflows = Arc::clone(&recorder.underflows);
    let stream = started_output(
        &backend,
        |ctx, _min, _max| {
            ctx.pause(true).unwrap();
        },
        recorder,
    );

    let report = manual.control().output_cycle(128, 128);
    assert!(!report.xrun);
    assert_eq!(underflows.load(Ordering::SeqCst), 0);
    assert_eq!(stream.state(), StreamState::Paused);
    assert_eq!(manual.control().pause_calls.load(Ordering::SeqCst), 0);
}

#[test]
fn pause_before_start_is_invalid() {
    let (_manual, backend) = backend();
    let mut stream = OutStream::new(backend, output_device());
    stream.set_write_callback(|_, _, _| {});
    stream.open().unwrap();
    assert!(matches!(stream.pause(true), Err(StreamError::Invalid(_))));
    stream.clear_buffer().unwrap();
}

#[test]
fn open_requires_a_callback_and_keeps_state() {
    let (_manual, backend) = backend();
    let mut stream = OutStream::new(backend, output_device());
    assert!(matches!(stream.open(), Err(StreamError::Invalid(_))));
    assert_eq!(stream.state(), StreamState::Created);
    assert!(matches!(stream.start(), Err(StreamError::Invalid(_))));
}

#[test]
fn incompatible_config_faults_on_open() {
    let (_manual, backend) = backend();
    let mut stream = OutStream::new(backend, output_device());
    stream
        .configure(StreamConfig {
            sample_rate: Some(96000),
            ..StreamConfig::default()
        })
        .unwrap();
    stream.set_write_callback(|_, _, _| {});

    let err = stream.open().unwrap_err();
    assert!(matches!(err, StreamError::IncompatibleDevice(_)));
    assert_eq!(stream.state(), StreamState::Faulted);
    assert_eq!(stream.open(), Err(StreamError::Streaming));
}

#[test]
fn backend_open_failure_faults() {
    let (manual, backend) = backend();
    *manual.fail_open.lock() = Some(StreamError::OpeningDevice("unplugged".into()));
    let mut stream = OutStream::new(backend, output_device());
    stream.set_write_callback(|_, _, _| {});

    assert_eq!(stream.open(), Err(StreamError::OpeningDevice("unplugged".into())));
    assert_eq!(stream.state(), StreamState::Faulted);
}

#[test]
fn mismatched_area_layout_faults_on_open() {
    let (manual, backend) = backend();
    *manual.areas_override.lock() = Some(AreaLayout::interleaved(3, 4));
    let mut stream = OutStream::new(backend, output_device());
    stream.set_write_callback(|_, _, _| {});

    assert!(matches!(stream.open(), Err(StreamError::Invalid(_))));
    assert_eq!(stream.state(), StreamState::Faulted);
    assert!(manual.control().stopped.load(Ordering::SeqCst));
}

#[test]
fn layout_fallback_is_flagged_not_fatal() {
    let (_manual, backend) = backend();
    let mut stream = OutStream::new(backend, output_device());
    stream
        .configure(StreamConfig {
            layout: Some(ChannelLayout::builtin(BuiltinLayout::SevenPointOne)),
            ..StreamConfig::default()
        })
        .unwrap();
    stream.set_write_callback(|_, _, _| {});

    stream.open().unwrap();
    assert_eq!(stream.params().unwrap().layout, ChannelLayout::stereo());
    assert!(matches!(stream.layout_error(), Some(StreamError::IncompatibleDevice(_))));
}

#[test]
fn busy_device_keeps_stream_opened() {
    let (manual, backend) = backend();
    manual.busy.store(true, Ordering::SeqCst);
    let calls = Arc::new(AtomicUsize::new(0));
    let seen = Arc::clone(&calls);
    let mut stream = OutStream::new(backend, output_device());
    stream.set_write_callback(move |ctx, _min, max| {
        seen.fetch_add(1, Ordering::SeqCst);
        write_constant(ctx, max, 0.0);
    });
    stream.open().unwrap();

    assert_eq!(stream.start(), Err(StreamError::DeviceBusy));
    assert_eq!(stream.state(), StreamState::Opened);
    assert!(!manual.control().is_running());

    manual.busy.store(false, Ordering::SeqCst);
    stream.start().unwrap();
    manual.control().output_cycle(32, 32);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn configure_after_open_is_rejected() {
    let (_manual, backend) = backend();
    let mut stream = OutStream::new(backend, output_device());
    stream.set_write_callback(|_, _, _| {});
    stream.open().unwrap();
    assert!(matches!(stream.configure(StreamConfig::default()), Err(StreamError::Invalid(_))));
    assert!(matches!(stream.open(), Err(StreamError::Invalid(_))));
}

#[test]
fn invalid_config_is_rejected_before_open() {
    let (_manual, backend) = backend();
    let mut stream = OutStream::new(backend, output_device());
    let err = stream
        .configure(StreamConfig {
            name: String::new(),
            ..StreamConfig::default()
        })
        .unwrap_err();
    assert!(matches!(err, StreamError::Invalid(_)));
    assert_eq!(stream.state(), StreamState::Created);
}

#[test]
fn volume_needs_backend_support() {
    let (_manual, backend) = backend();
    let mut stream = OutStream::new(backend, output_device());
    stream.set_write_callback(|_, _, _| {});
    assert!(matches!(stream.set_volume(0.5), Err(StreamError::Invalid(_))));
    stream.open().unwrap();
    assert!(matches!(stream.set_volume(1.5), Err(StreamError::Invalid(_))));
    assert_eq!(stream.set_volume(0.5), Err(StreamError::IncompatibleBackend));
    assert_eq!(stream.volume(), 1.0);
}

#[test]
fn dropping_the_stream_releases_the_device() {
    let (manual, backend) = backend();
    let device = output_device();
    assert_eq!(device.ref_count(), 1);

    let mut stream = OutStream::new(backend, device.clone());
    assert_eq!(device.ref_count(), 2);
    stream.set_write_callback(|_, _, _| {});
    stream.open().unwrap();
    stream.start().unwrap();
    let control = manual.control();
    let controller = stream.controller().unwrap();

    stream.destroy();
    assert_eq!(device.ref_count(), 1);
    assert!(control.stopped.load(Ordering::SeqCst));
    assert!(!control.is_running());
    assert_eq!(controller.state(), StreamState::Destroyed);
    assert!(matches!(controller.pause(true), Err(StreamError::Invalid(_))));
}

#[test]
fn capture_holes_read_as_silence() {
    let (manual, backend) = backend();
    let captured = Arc::new(Mutex::new(Vec::<f32>::new()));
    let sink = Arc::clone(&captured);

    let mut stream = InStream::new(backend, input_device());
    stream
        .configure(StreamConfig {
            layout: Some(ChannelLayout::mono()),
            ..StreamConfig::default()
        })
        .unwrap();
    stream.set_read_callback(move |ctx, _min, max| {
        let mut left = max;
        let mut out = sink.lock();
        while left > 0 {
            let frames = match ctx.begin_read(left).unwrap() {
                CapturedFrames::Areas(areas) => {
                    out.extend(areas.channel(0).map(|sample| {
                        f32::from_ne_bytes([sample[0], sample[1], sample[2], sample[3]])
                    }));
                    areas.frame_count()
                }
                CapturedFrames::Hole(frames) => {
                    out.extend(std::iter::repeat(0.0).take(frames));
                    frames
                }
                CapturedFrames::Empty => {
                    ctx.end_read().unwrap();
                    break;
                }
            };
            ctx.end_read().unwrap();
            left -= frames;
        }
    });
    stream.open().unwrap();
    stream.start().unwrap();

    let one: Vec<u8> = std::iter::repeat(1.0f32.to_ne_bytes()).take(8).flatten().collect();
    let two: Vec<u8> = std::iter::repeat(2.0f32.to_ne_bytes()).take(4).flatten().collect();
    let control = manual.control();
    {
        let mut transport = control.transport.lock();
        transport.max_bracket = 5;
        transport.pending.extend([Captured::Data(one), Captured::Hole(3), Captured::Data(two)]);
    }

    let report = control.input_cycle(15, 15);
    assert_eq!(report.frames, 15);
    assert!(!report.xrun);

    let mut expected = vec![1.0; 8];
    expected.extend([0.0; 3]);
    expected.extend([2.0; 4]);
    assert_eq!(*captured.lock(), expected);
    assert_eq!(stream.diagnostics().frames_transferred, 15);
}

#[test]
fn short_capture_cycle_counts_an_overflow() {
    let (manual, backend) = backend();
    let recorder = Recorder::default();
    let overflows = Arc::clone(&recorder.overflows);
    let mut stream = InStream::new(backend, input_device());
    stream.set_read_callback(|ctx, _min, _max| {
        assert!(matches!(ctx.begin_read(16).unwrap(), CapturedFrames::Empty));
        ctx.end_read().unwrap();
    });
    stream.set_delegate(recorder);
    stream.open().unwrap();
    stream.start().unwrap();

    let report = manual.control().input_cycle(64, 32);
    assert!(report.xrun);
    assert_eq!(overflows.load(Ordering::SeqCst), 1);
    assert_eq!(stream.diagnostics().overflow_count, 1);
}

#[test]
fn callback_latency_comes_from_the_transport() {
    let (manual, backend) = backend();
    let latency = Arc::new(Mutex::new(None));
    let slot = Arc::clone(&latency);
    let _stream = started_output(
        &backend,
        move |ctx, _min, _max| {
            *slot.lock() = Some(ctx.latency().unwrap());
        },
        Recorder::default(),
    );
    manual.control().output_cycle(16, 0);
    assert_eq!(*latency.lock(), Some(0.01));
}

#[cfg(debug_assertions)]
#[test]
#[should_panic(expected = "bracket")]
fn returning_inside_a_bracket_panics_in_debug() {
    let (manual, backend) = backend();
    let _stream = started_output(
        &backend,
        |ctx, _min, max| {
            let _ = ctx.begin_write(max).unwrap();
        },
        Recorder::default(),
    );
    manual.control().output_cycle(16, 0);
}
