use std::alloc::{GlobalAlloc, Layout, System};
use std::hint::black_box;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use notice_compose::{
    Compositor, DocumentSnapshot, FormatCommand, ImageSource, Position, Rasterizer, Selection,
    SizeClass,
};
use notice_compose_embedded_graphics::EgRasterizer;
use notice_compose_render::snapshot_to_svg;

struct TrackingAllocator;

static CURRENT_ALLOC_BYTES: AtomicUsize = AtomicUsize::new(0);
static PEAK_ALLOC_BYTES: AtomicUsize = AtomicUsize::new(0);

#[global_allocator]
static GLOBAL_ALLOCATOR: TrackingAllocator = TrackingAllocator;

fn current_alloc_bytes() -> usize {
    CURRENT_ALLOC_BYTES.load(Ordering::Relaxed)
}

fn reset_peak_alloc_bytes() {
    PEAK_ALLOC_BYTES.store(current_alloc_bytes(), Ordering::Relaxed);
}

fn add_current_alloc_bytes(delta: usize) {
    let current = CURRENT_ALLOC_BYTES.fetch_add(delta, Ordering::Relaxed) + delta;
    PEAK_ALLOC_BYTES.fetch_max(current, Ordering::Relaxed);
}

fn sub_current_alloc_bytes(delta: usize) {
    let _ = CURRENT_ALLOC_BYTES.fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
        Some(current.saturating_sub(delta))
    });
}

unsafe impl GlobalAlloc for TrackingAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let ptr = unsafe { System.alloc(layout) };
        if !ptr.is_null() {
            add_current_alloc_bytes(layout.size());
        }
        ptr
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        unsafe { System.dealloc(ptr, layout) };
        sub_current_alloc_bytes(layout.size());
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        let ptr = unsafe { System.alloc_zeroed(layout) };
        if !ptr.is_null() {
            add_current_alloc_bytes(layout.size());
        }
        ptr
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        let new_ptr = unsafe { System.realloc(ptr, layout, new_size) };
        if !new_ptr.is_null() {
            if new_size >= layout.size() {
                add_current_alloc_bytes(new_size - layout.size());
            } else {
                sub_current_alloc_bytes(layout.size() - new_size);
            }
        }
        new_ptr
    }
}

#[derive(Clone, Debug)]
struct CaseResult {
    fixture: String,
    case: String,
    iterations: usize,
    min_ns: u128,
    median_ns: u128,
    mean_ns: u128,
    max_ns: u128,
    median_peak_heap_bytes: usize,
    max_peak_heap_bytes: usize,
}

fn percentile<T: Copy>(sorted: &[T], percentile: f64) -> T {
    let idx = ((sorted.len().saturating_sub(1) as f64) * percentile).round() as usize;
    sorted[idx]
}

fn run_case<F>(
    fixture: &str,
    case: &str,
    warmup_iters: usize,
    measure_iters: usize,
    mut op: F,
) -> CaseResult
where
    F: FnMut() -> usize,
{
    for _ in 0..warmup_iters {
        black_box(op());
    }
    let mut time_samples = Vec::with_capacity(measure_iters);
    let mut mem_samples = Vec::with_capacity(measure_iters);
    for _ in 0..measure_iters {
        let baseline_alloc = current_alloc_bytes();
        reset_peak_alloc_bytes();
        let start = Instant::now();
        black_box(op());
        time_samples.push(start.elapsed().as_nanos());
        mem_samples.push(
            PEAK_ALLOC_BYTES
                .load(Ordering::Relaxed)
                .saturating_sub(baseline_alloc),
        );
    }
    time_samples.sort_unstable();
    mem_samples.sort_unstable();
    let time_sum: u128 = time_samples.iter().copied().sum();
    CaseResult {
        fixture: fixture.to_string(),
        case: case.to_string(),
        iterations: measure_iters,
        min_ns: time_samples[0],
        median_ns: percentile(&time_samples, 0.5),
        mean_ns: time_sum / time_samples.len() as u128,
        max_ns: time_samples[time_samples.len() - 1],
        median_peak_heap_bytes: percentile(&mem_samples, 0.5),
        max_peak_heap_bytes: mem_samples[mem_samples.len() - 1],
    }
}

fn photo(width: u32, height: u32) -> ImageSource {
    let img = image::RgbaImage::from_fn(width, height, |x, y| {
        image::Rgba([(x % 256) as u8, (y % 256) as u8, 128, 255])
    });
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageFormat::Png)
        .unwrap_or_else(|e| panic!("encode fixture: {}", e));
    ImageSource::from_bytes(out.into_inner()).unwrap_or_else(|e| panic!("fixture: {}", e))
}

fn build_fixture(key: &str, rasterizer: &EgRasterizer) -> Compositor {
    let mut compositor = Compositor::new(rasterizer.layout_engine().clone());
    let type_text = |c: &mut Compositor, text: &str| {
        c.type_text(text)
            .unwrap_or_else(|e| panic!("{}: type failed: {}", key, e));
    };
    match key {
        "headline" => {
            type_text(&mut compositor, "Library closed Monday");
            compositor.select_all();
            compositor
                .apply_format(FormatCommand::Bold)
                .unwrap_or_else(|e| panic!("bold failed: {}", e));
            compositor
                .apply_format(FormatCommand::ToggleCenter)
                .unwrap_or_else(|e| panic!("center failed: {}", e));
            compositor.set_caret(compositor.document().end_position());
        }
        "text_and_photo" => {
            type_text(&mut compositor, "Lost cat, answers to Miso.\n");
            compositor.resize_images(SizeClass::Large);
            compositor
                .insert_image(photo(640, 480))
                .unwrap_or_else(|e| panic!("insert failed: {}", e));
            compositor.settle();
            type_text(&mut compositor, "Call 555-0199 if found.");
        }
        _ => {
            let paragraph = "The annual fire drill starts at noon; please leave by the east stairs.";
            while compositor.type_text(paragraph).is_ok() && compositor.type_text("\n").is_ok() {}
            compositor.set_selection(Selection::range(
                Position::new(0, 0),
                compositor.document().end_position(),
            ));
            compositor.delete_selection();
            for _ in 0..4 {
                type_text(&mut compositor, paragraph);
                type_text(&mut compositor, "\n");
            }
        }
    }
    compositor
}

fn main() {
    let quick = std::env::args().any(|arg| arg == "--quick");
    let warmup_iters = if quick { 1 } else { 3 };
    let measure_iters = if quick { 5 } else { 25 };

    println!("# notice-compose benchmark");
    println!(
        "# mode={} warmup_iters={} measure_iters={}",
        if quick { "quick" } else { "full" },
        warmup_iters,
        measure_iters
    );
    println!(
        "fixture,case,iterations,min_ns,median_ns,mean_ns,max_ns,median_peak_heap_bytes,max_peak_heap_bytes"
    );

    let rasterizer = EgRasterizer::default();
    let mut results = Vec::new();
    for fixture_key in ["headline", "text_and_photo", "dense_text"] {
        let compositor = build_fixture(fixture_key, &rasterizer);
        let snapshot = DocumentSnapshot::capture(compositor.document(), compositor.canvas());

        results.push(run_case(
            fixture_key,
            "layout",
            warmup_iters,
            measure_iters,
            || {
                rasterizer
                    .layout_engine()
                    .layout_snapshot(&snapshot)
                    .content_commands
                    .len()
            },
        ));

        let mut editing = build_fixture(fixture_key, &rasterizer);
        results.push(run_case(
            fixture_key,
            "keystroke_recheck",
            warmup_iters,
            measure_iters,
            || {
                let _ = editing.type_text("x");
                editing.delete_backward();
                editing.is_overflowed() as usize
            },
        ));

        results.push(run_case(
            fixture_key,
            "svg_markup",
            warmup_iters,
            measure_iters,
            || {
                snapshot_to_svg(rasterizer.layout_engine(), &snapshot)
                    .unwrap_or_else(|e| panic!("markup failed: {}", e))
                    .len()
            },
        ));

        results.push(run_case(
            fixture_key,
            "rasterize_png",
            warmup_iters,
            measure_iters,
            || {
                rasterizer
                    .rasterize(&snapshot)
                    .unwrap_or_else(|e| panic!("rasterize failed: {}", e))
                    .png
                    .len()
            },
        ));
    }

    for row in results {
        println!(
            "{},{},{},{},{},{},{},{},{}",
            row.fixture,
            row.case,
            row.iterations,
            row.min_ns,
            row.median_ns,
            row.mean_ns,
            row.max_ns,
            row.median_peak_heap_bytes,
            row.max_peak_heap_bytes
        );
    }
}
