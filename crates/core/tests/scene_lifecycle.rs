use bigview_cache::{CacheConfig, CacheState};
use bigview_core::{FrameSource, GestureEvent, Scene};
use bigview_render::{
    buffer_bytes, try_allocate, CapturingSurface, DownsampledSample, LoadError, PixelBuffer,
    PointF, Rect, Size,
};
use bigview_scheduler::CancellationToken;
use image::{Rgba, RgbaImage};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::{Duration, Instant};

const SCENE: Size = Size {
    width: 4000,
    height: 3000,
};
const SAMPLE_COLOR: Rgba<u8> = Rgba([200, 0, 0, 255]);
const CACHE_COLOR: Rgba<u8> = Rgba([0, 200, 0, 255]);

fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn solid_sample() -> Arc<DownsampledSample> {
    Arc::new(DownsampledSample::from_buffer(
        RgbaImage::from_pixel(SCENE.width >> 3, SCENE.height >> 3, SAMPLE_COLOR),
        3,
    ))
}

fn config() -> CacheConfig {
    CacheConfig::default().with_max_memory_mb(64)
}

fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    false
}

fn solid_region(rect: Rect) -> PixelBuffer {
    let size = rect.size();
    RgbaImage::from_pixel(size.width, size.height, CACHE_COLOR)
}

#[test]
fn allocation_failure_retries_with_smaller_budget() {
    init_tracing();
    let calls = Arc::new(AtomicUsize::new(0));
    let windows = Arc::new(std::sync::Mutex::new(Vec::new()));
    let (counter, seen) = (Arc::clone(&calls), Arc::clone(&windows));

    let loader = move |rect: Rect, _: &CancellationToken| -> Result<PixelBuffer, LoadError> {
        seen.lock().unwrap().push(rect);
        match counter.fetch_add(1, Ordering::SeqCst) {
            0 => Err(LoadError::AllocationFailure {
                bytes: buffer_bytes(rect.size()),
            }),
            _ => Ok(solid_region(rect)),
        }
    };

    let mut scene = Scene::new(SCENE, Box::new(loader), solid_sample(), config());
    scene.set_viewport_size(800, 600);
    scene.initialize();
    scene.start().unwrap();

    let mut surface = CapturingSurface::new();
    assert_eq!(scene.render(&mut surface), FrameSource::Sample);
    assert_eq!(surface.last_frame().unwrap().get_pixel(0, 0), &SAMPLE_COLOR);

    assert!(wait_until(|| scene.cache_state() == CacheState::Ready));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(scene.budget_percent(), Some(4));

    let windows = windows.lock().unwrap().clone();
    assert!(windows[1].size().area() < windows[0].size().area());

    assert_eq!(scene.render(&mut surface), FrameSource::Cache);
    assert_eq!(surface.last_frame().unwrap().get_pixel(0, 0), &CACHE_COLOR);
    assert_eq!(surface.presented(), 2);

    let stats = scene.stats();
    assert_eq!(stats.allocation_failures, 1);
    assert_eq!(stats.loads_published, 1);

    scene.stop().unwrap();
}

#[test]
fn stop_during_load_publishes_nothing() {
    init_tracing();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let (entered_tx, entered_rx) = mpsc::channel();

    let loader = move |rect: Rect, cancel: &CancellationToken| -> Result<PixelBuffer, LoadError> {
        if counter.fetch_add(1, Ordering::SeqCst) == 0 {
            let _ = entered_tx.send(());
            let deadline = Instant::now() + Duration::from_secs(5);
            while !cancel.is_cancelled() && Instant::now() < deadline {
                thread::sleep(Duration::from_millis(1));
            }
            // Hand back pixels regardless; a stopped pass must not publish them.
        }
        Ok(solid_region(rect))
    };

    let mut scene = Scene::new(SCENE, Box::new(loader), solid_sample(), config());
    scene.set_viewport_size(800, 600);
    scene.initialize();
    scene.start().unwrap();

    let mut surface = CapturingSurface::new();
    scene.render(&mut surface);
    entered_rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(scene.cache_state(), CacheState::InUpdate);

    scene.stop().unwrap();
    assert!(!scene.is_running());
    assert_ne!(scene.cache_state(), CacheState::Ready);
    assert_eq!(scene.stats().loads_published, 0);
    assert_eq!(scene.render(&mut surface), FrameSource::Sample);

    scene.start().unwrap();
    scene.render(&mut surface);
    assert!(wait_until(|| scene.cache_state() == CacheState::Ready));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert_eq!(scene.render(&mut surface), FrameSource::Cache);

    scene.stop().unwrap();
    scene.stop().unwrap();
}

#[test]
fn invalidate_triggers_one_refill() {
    init_tracing();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let loader = move |rect: Rect, _: &CancellationToken| -> Result<PixelBuffer, LoadError> {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(solid_region(rect))
    };

    let mut scene = Scene::new(SCENE, Box::new(loader), solid_sample(), config());
    scene.set_viewport_size(800, 600);
    scene.initialize();
    scene.start().unwrap();

    let mut surface = CapturingSurface::new();
    scene.render(&mut surface);
    assert!(wait_until(|| scene.cache_state() == CacheState::Ready));
    let before = scene.stats();

    scene.invalidate();
    for _ in 0..10 {
        scene.render(&mut surface);
    }
    assert!(wait_until(|| scene.cache_state() == CacheState::Ready));

    let after = scene.stats();
    assert_eq!(after.refills_requested, before.refills_requested + 1);
    assert_eq!(after.loads_published, before.loads_published + 1);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn panning_out_of_window_refills() {
    init_tracing();
    let loader = |rect: Rect, _: &CancellationToken| -> Result<PixelBuffer, LoadError> {
        try_allocate(rect.size())
    };

    let mut scene = Scene::new(SCENE, Box::new(loader), solid_sample(), config());
    scene.set_viewport_size(800, 600);
    scene.initialize();
    scene.start().unwrap();

    let mut surface = CapturingSurface::new();
    scene.render(&mut surface);
    assert!(wait_until(|| scene.cache_state() == CacheState::Ready));
    let window = scene.cache().window();

    // Drag left far enough that the view leaves the cache window.
    scene.apply_gesture(GestureEvent::Pan {
        dx: -(window.right as f32),
        dy: 0.0,
    });
    assert_eq!(scene.render(&mut surface), FrameSource::Sample);
    assert!(wait_until(|| scene.cache_state() == CacheState::Ready));

    let moved = scene.cache().window();
    assert!(moved.contains_rect(&scene.viewport().rect()));
    assert_eq!(scene.render(&mut surface), FrameSource::Cache);
}

#[test]
fn zoom_within_window_keeps_cache() {
    init_tracing();
    let loader = |rect: Rect, _: &CancellationToken| -> Result<PixelBuffer, LoadError> {
        Ok(solid_region(rect))
    };

    let mut scene = Scene::new(SCENE, Box::new(loader), solid_sample(), config());
    scene.set_viewport_size(800, 600);
    scene.viewport().set_origin(1000, 1000);
    scene.initialize();
    scene.start().unwrap();

    let mut surface = CapturingSurface::new();
    scene.render(&mut surface);
    assert!(wait_until(|| scene.cache_state() == CacheState::Ready));

    scene.apply_gesture(GestureEvent::Zoom {
        factor: 0.5,
        focus: PointF::new(400.0, 300.0),
    });
    assert_eq!(scene.render(&mut surface), FrameSource::Cache);
    assert_eq!(surface.last_frame().unwrap().dimensions(), (800, 600));
}

#[test]
fn suspended_scene_does_not_load() {
    init_tracing();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let loader = move |rect: Rect, _: &CancellationToken| -> Result<PixelBuffer, LoadError> {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(solid_region(rect))
    };

    let mut scene = Scene::new(SCENE, Box::new(loader), solid_sample(), config());
    scene.set_viewport_size(800, 600);
    scene.initialize();
    scene.set_suspend(true);
    scene.start().unwrap();

    let mut surface = CapturingSurface::new();
    for _ in 0..5 {
        assert_eq!(scene.render(&mut surface), FrameSource::Sample);
    }
    assert_eq!(scene.cache_state(), CacheState::Suspended);
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    scene.set_suspend(false);
    scene.render(&mut surface);
    assert!(wait_until(|| scene.cache_state() == CacheState::Ready));
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn exhausted_budget_falls_back_to_sample() {
    init_tracing();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let loader = move |rect: Rect, _: &CancellationToken| -> Result<PixelBuffer, LoadError> {
        counter.fetch_add(1, Ordering::SeqCst);
        Err(LoadError::AllocationFailure {
            bytes: buffer_bytes(rect.size()),
        })
    };

    let mut scene = Scene::new(
        SCENE,
        Box::new(loader),
        solid_sample(),
        config().with_budget_percent(2),
    );
    scene.set_viewport_size(800, 600);
    scene.initialize();
    scene.start().unwrap();

    let mut surface = CapturingSurface::new();
    scene.render(&mut surface);
    assert!(wait_until(|| scene.budget_percent() == Some(0)
        && scene.cache_state() == CacheState::Initialized));
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    for _ in 0..5 {
        assert_eq!(scene.render(&mut surface), FrameSource::Sample);
    }
    assert_eq!(scene.cache_state(), CacheState::Initialized);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn drop_joins_blocked_worker() {
    init_tracing();
    let (entered_tx, entered_rx) = mpsc::channel();
    let loader = move |rect: Rect, cancel: &CancellationToken| -> Result<PixelBuffer, LoadError> {
        let _ = entered_tx.send(());
        let deadline = Instant::now() + Duration::from_secs(5);
        while !cancel.is_cancelled() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(1));
        }
        if cancel.is_cancelled() {
            return Err(LoadError::Cancelled);
        }
        Ok(solid_region(rect))
    };

    let mut scene = Scene::new(SCENE, Box::new(loader), solid_sample(), config());
    scene.set_viewport_size(800, 600);
    scene.initialize();
    scene.start().unwrap();
    scene.render(&mut CapturingSurface::new());
    entered_rx.recv_timeout(Duration::from_secs(5)).unwrap();

    let started = Instant::now();
    drop(scene);
    assert!(started.elapsed() < Duration::from_secs(4));
}

#[test]
fn open_decodes_image_file() {
    init_tracing();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("scene.png");
    let image = RgbaImage::from_fn(640, 480, |x, y| Rgba([(x % 251) as u8, (y % 241) as u8, 7, 255]));
    image.save(&path).unwrap();

    let mut scene = Scene::open(&path, config()).unwrap();
    assert_eq!(scene.size(), Size::new(640, 480));
    assert_eq!(scene.cache_state(), CacheState::Initialized);

    scene.set_viewport_size(320, 240);
    scene.viewport().set_origin(100, 50);
    scene.start().unwrap();

    let mut surface = CapturingSurface::new();
    scene.render(&mut surface);
    assert!(wait_until(|| scene.cache_state() == CacheState::Ready));
    assert_eq!(scene.render(&mut surface), FrameSource::Cache);

    let frame = surface.last_frame().unwrap();
    assert_eq!(frame.get_pixel(0, 0), image.get_pixel(100, 50));
    assert_eq!(frame.get_pixel(319, 239), image.get_pixel(419, 289));
}
