use std::env;
use std::path::Path;
use std::process::ExitCode;
use std::time::Duration;

use notice_compose::{Compositor, DocumentSnapshot, ExportReport, ImageOutput};
use notice_compose_embedded_graphics::EgRasterizer;
use notice_compose_render::snapshot_to_svg;
use notice_compose_web::{HttpUploader, NoticeScript, UploadConfig};

const DEFAULT_OUT_PATH: &str = "notice.png";
const DEFAULT_TIMEOUT_MS: u64 = 30_000;

#[derive(Clone, Debug)]
struct Args {
    script_path: String,
    out_path: String,
    svg_path: Option<String>,
    upload_url: Option<String>,
    timeout_ms: u64,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    match run(env::args().collect()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(msg) => {
            eprintln!("error: {}", msg);
            eprintln!("{}", help_text());
            ExitCode::FAILURE
        }
    }
}

fn run(args: Vec<String>) -> Result<(), String> {
    let cfg = parse_args(args)?;
    let script = NoticeScript::from_path(&cfg.script_path).map_err(|e| e.to_string())?;

    let rasterizer = EgRasterizer::default();
    let mut compositor = Compositor::new(rasterizer.layout_engine().clone());
    let base_dir = Path::new(&cfg.script_path)
        .parent()
        .unwrap_or_else(|| Path::new("."));
    script
        .apply(&mut compositor, base_dir)
        .map_err(|e| format!("script failed: {}", e))?;

    if let Some(svg_path) = &cfg.svg_path {
        let snapshot = DocumentSnapshot::capture(compositor.document(), compositor.canvas());
        let svg = snapshot_to_svg(rasterizer.layout_engine(), &snapshot)
            .map_err(|e| e.to_string())?;
        std::fs::write(svg_path, svg).map_err(|e| format!("write {}: {}", svg_path, e))?;
    }

    let job = compositor.begin_export().map_err(|e| e.to_string())?;
    let raster = match job.render(&rasterizer) {
        Ok(raster) => raster,
        Err(err) => {
            let _ = compositor.finish_export(Err(err.clone()));
            return Err(compositor.take_alert().unwrap_or_else(|| err.to_string()));
        }
    };
    std::fs::write(&cfg.out_path, &raster.png)
        .map_err(|e| format!("write {}: {}", cfg.out_path, e))?;

    let (output, upload_error) = match &cfg.upload_url {
        Some(url) => {
            let uploader = HttpUploader::new(
                UploadConfig::new(url).with_timeout(Duration::from_millis(cfg.timeout_ms)),
            );
            job.deliver(&raster, &uploader)
        }
        None => (ImageOutput::LocalFallback(raster.to_data_url()), None),
    };
    let report = compositor
        .finish_export(Ok(ExportReport {
            output,
            file_name: job.file_name().to_string(),
            width: raster.width,
            height: raster.height,
            diagnostics: raster.diagnostics,
            upload_error,
        }))
        .map_err(|e| e.to_string())?;

    println!(
        "wrote {} ({}x{}, {} bytes)",
        cfg.out_path,
        report.width,
        report.height,
        raster.png.len()
    );
    match (&report.output, &report.upload_error) {
        (ImageOutput::Uploaded(descriptor), _) => {
            let json = serde_json::to_string(descriptor).map_err(|e| e.to_string())?;
            println!("uploaded: {}", json);
        }
        (ImageOutput::LocalFallback(_), Some(err)) => {
            println!("upload failed ({}), kept local image", err);
        }
        (ImageOutput::LocalFallback(_), None) => {}
    }
    if report.diagnostics.decode_warnings > 0 {
        println!(
            "warning: {} image(s) could not be decoded",
            report.diagnostics.decode_warnings
        );
    }
    Ok(())
}

fn parse_args(args: Vec<String>) -> Result<Args, String> {
    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        return Err("help requested".to_string());
    }

    let mut cfg = Args {
        script_path: args[1].clone(),
        out_path: DEFAULT_OUT_PATH.to_string(),
        svg_path: None,
        upload_url: None,
        timeout_ms: DEFAULT_TIMEOUT_MS,
    };

    let mut i = 2usize;
    while i < args.len() {
        match args[i].as_str() {
            "--out" => {
                let v = args
                    .get(i + 1)
                    .ok_or_else(|| "--out requires a value".to_string())?;
                cfg.out_path = v.clone();
                i += 2;
            }
            "--svg" => {
                let v = args
                    .get(i + 1)
                    .ok_or_else(|| "--svg requires a value".to_string())?;
                cfg.svg_path = Some(v.clone());
                i += 2;
            }
            "--upload" => {
                let v = args
                    .get(i + 1)
                    .ok_or_else(|| "--upload requires a value".to_string())?;
                cfg.upload_url = Some(v.clone());
                i += 2;
            }
            "--timeout-ms" => {
                let v = args
                    .get(i + 1)
                    .ok_or_else(|| "--timeout-ms requires a value".to_string())?;
                cfg.timeout_ms = v
                    .parse::<u64>()
                    .map_err(|_| format!("invalid --timeout-ms value '{}'", v))?;
                i += 2;
            }
            "--help" | "-h" => return Err("help requested".to_string()),
            other => return Err(format!("unknown argument '{}'", other)),
        }
    }
    Ok(cfg)
}

fn help_text() -> &'static str {
    r#"notice-render - compose a portrait notice from a JSON script

USAGE:
  cargo run -p notice-compose-web --bin notice-render -- <script.json> [options]

OPTIONS:
  --out <file>          output PNG path (default: notice.png)
  --svg <file>          also write the style-inlined SVG markup
  --upload <url>        POST the PNG as multipart field `image`
  --timeout-ms <n>      upload timeout in milliseconds (default: 30000)
  -h, --help            show this help

Set RUST_LOG=debug for layout, overflow and export logs."#
}
