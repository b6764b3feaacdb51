use std::env;
use std::process::ExitCode;
use std::sync::Arc;

use embedded_graphics::draw_target::DrawTarget;
use embedded_graphics::geometry::{OriginDimensions, Size};
use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::Pixel;
use fb2_stream::parse_book_bytes;
use fb2_stream_embedded_graphics::{EgRenderConfig, EgRenderer, EgTextMeasurer};
use fb2_stream_render::{LayoutParams, Paginator, ReadingInfo};

const DEFAULT_FB2_PATH: &str = "tests/fixtures/sample.fb2";

#[derive(Clone, Debug)]
struct Args {
    fb2_path: String,
    start_item: usize,
    start_line: usize,
    pages: usize,
    out_dir: String,
    width: u32,
    height: u32,
    margin_left: i32,
    margin_right: i32,
    margin_top: i32,
    margin_bottom: i32,
    indent_px: f32,
    empty_line_px: f32,
    title_spacer: bool,
}

fn main() -> ExitCode {
    env_logger::init();
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
    std::fs::create_dir_all(&cfg.out_dir).map_err(|e| e.to_string())?;
    clear_previous_outputs(&cfg.out_dir)?;

    let bytes = std::fs::read(&cfg.fb2_path)
        .map_err(|e| format!("unable to read '{}': {}", cfg.fb2_path, e))?;
    let book = parse_book_bytes(&bytes).map_err(|e| e.to_string())?;
    print!("{}", book.load_info());

    let params = LayoutParams::default()
        .with_measurer(Arc::new(EgTextMeasurer::new()))
        .with_paragraph_first_line_indent(cfg.indent_px)
        .with_empty_line_height(cfg.empty_line_px)
        .with_empty_line_after_title(cfg.title_spacer);
    let start = ReadingInfo::new(cfg.start_item, cfg.start_line);
    let mut paginator = Paginator::with_cursor(book, params, start).map_err(|e| e.to_string())?;

    let render_cfg = EgRenderConfig {
        clear_first: true,
        margin_left: cfg.margin_left,
        margin_top: cfg.margin_top,
        margin_right: cfg.margin_right,
        center_titles: true,
    };
    let renderer = EgRenderer::new(render_cfg);
    let content_width = renderer.content_width(cfg.width) as f32;
    let content_height = (cfg.height as i32 - cfg.margin_top - cfg.margin_bottom).max(0) as f32;

    let mut rendered = 0usize;
    let mut finished = false;
    let mut manifest =
        String::from("file\tpage_idx\titem_index\tline_index\titems\tcontent_height\n");
    while rendered < cfg.pages {
        let page = paginator
            .get_page(content_width, content_height)
            .map_err(|e| format!("pagination failed at {}: {}", paginator.cursor(), e))?;
        if page.is_empty() && paginator.is_exhausted() {
            finished = true;
            break;
        }

        let mut display = BitmapDisplay::new(cfg.width, cfg.height);
        let diag = renderer
            .render_page(&page, &mut display)
            .map_err(|_| "render backend failed".to_string())?;

        let file_name = format!("page_{:04}.pgm", rendered + 1);
        let file_path = format!("{}/{}", cfg.out_dir, file_name);
        display.save_pgm(&file_path)?;

        println!(
            "page {} at {}: {} fragment(s), {} line(s), {:.0}px",
            rendered + 1,
            page.start,
            diag.fragments,
            page.line_count(),
            page.content_height()
        );
        print!("{}", page.diagnostics);
        manifest.push_str(&format!(
            "{}\t{}\t{}\t{}\t{}\t{:.1}\n",
            file_name,
            rendered,
            page.start.item_index,
            page.start.line_index,
            page.items.len(),
            page.content_height(),
        ));
        rendered += 1;
        if !paginator.next_page() {
            finished = true;
            break;
        }
    }

    if rendered == 0 {
        return Err("no pages rendered from requested position".to_string());
    }
    let manifest_path = format!("{}/manifest.tsv", cfg.out_dir);
    std::fs::write(&manifest_path, manifest).map_err(|e| e.to_string())?;
    println!(
        "rendered {} page(s) to {} (manifest: {})",
        rendered, cfg.out_dir, manifest_path
    );
    if finished {
        println!("reached end of book");
    } else {
        println!("stopped at {}", paginator.cursor());
    }
    Ok(())
}

fn clear_previous_outputs(out_dir: &str) -> Result<(), String> {
    let entries = std::fs::read_dir(out_dir).map_err(|e| e.to_string())?;
    for entry in entries {
        let entry = entry.map_err(|e| e.to_string())?;
        let path = entry.path();
        if path.is_file() {
            let name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
            if (name.starts_with("page_") && name.ends_with(".pgm")) || name == "manifest.tsv" {
                std::fs::remove_file(&path).map_err(|e| e.to_string())?;
            }
        }
    }
    Ok(())
}

fn value<'a>(args: &'a [String], i: usize, flag: &str) -> Result<&'a String, String> {
    args.get(i + 1)
        .ok_or_else(|| format!("{} requires a value", flag))
}

fn parse_value<T: std::str::FromStr>(args: &[String], i: usize, flag: &str) -> Result<T, String> {
    let v = value(args, i, flag)?;
    v.parse::<T>()
        .map_err(|_| format!("invalid {} value '{}'", flag, v))
}

fn parse_args(args: Vec<String>) -> Result<Args, String> {
    if args.len() >= 2 && (args[1] == "--help" || args[1] == "-h") {
        return Err("help requested".to_string());
    }

    let has_positional_path = args.get(1).is_some_and(|v| !v.starts_with("--"));
    let mut cfg = Args {
        fb2_path: if has_positional_path {
            args[1].clone()
        } else {
            DEFAULT_FB2_PATH.to_string()
        },
        start_item: 0,
        start_line: 0,
        pages: 12,
        out_dir: "target/visualize-default".to_string(),
        width: 480,
        height: 800,
        margin_left: 10,
        margin_right: 10,
        margin_top: 8,
        margin_bottom: 24,
        indent_px: 20.0,
        empty_line_px: 10.0,
        title_spacer: true,
    };

    let mut i = if has_positional_path { 2usize } else { 1usize };
    while i < args.len() {
        let flag = args[i].as_str();
        match flag {
            "--start-item" => {
                cfg.start_item = parse_value(&args, i, flag)?;
                i += 2;
            }
            "--start-line" => {
                cfg.start_line = parse_value(&args, i, flag)?;
                i += 2;
            }
            "--pages" => {
                cfg.pages = parse_value(&args, i, flag)?;
                i += 2;
            }
            "--out" => {
                cfg.out_dir = value(&args, i, flag)?.clone();
                i += 2;
            }
            "--width" => {
                cfg.width = parse_value(&args, i, flag)?;
                i += 2;
            }
            "--height" => {
                cfg.height = parse_value(&args, i, flag)?;
                i += 2;
            }
            "--margin-left" => {
                cfg.margin_left = parse_value(&args, i, flag)?;
                i += 2;
            }
            "--margin-right" => {
                cfg.margin_right = parse_value(&args, i, flag)?;
                i += 2;
            }
            "--margin-top" => {
                cfg.margin_top = parse_value(&args, i, flag)?;
                i += 2;
            }
            "--margin-bottom" => {
                cfg.margin_bottom = parse_value(&args, i, flag)?;
                i += 2;
            }
            "--indent" => {
                cfg.indent_px = parse_value(&args, i, flag)?;
                i += 2;
            }
            "--empty-line" => {
                cfg.empty_line_px = parse_value(&args, i, flag)?;
                i += 2;
            }
            "--no-title-spacer" => {
                cfg.title_spacer = false;
                i += 1;
            }
            other => return Err(format!("unknown option '{}'", other)),
        }
    }

    if cfg.pages == 0 {
        return Err("--pages must be > 0".to_string());
    }
    if cfg.width == 0 || cfg.height == 0 {
        return Err("--width and --height must be > 0".to_string());
    }
    if cfg.height as i32 <= cfg.margin_top + cfg.margin_bottom {
        return Err("vertical margins leave no room for text".to_string());
    }
    if cfg.empty_line_px < 0.0 {
        return Err("--empty-line must be >= 0".to_string());
    }

    Ok(cfg)
}

fn help_text() -> &'static str {
    r#"visualize - paginate an FB2 book and render pages to PGM snapshots

USAGE:
  cargo run -p fb2-stream-embedded-graphics --features cli --bin visualize -- [fb2_path] [options]

OPTIONS:
  --start-item <n>     event index to resume at (default: 0)
  --start-line <n>     lines of that item already shown (default: 0)
  --pages <n>          number of pages to render (default: 12)
  --out <dir>          output directory (default: target/visualize-default)
  --width <px>         viewport width (default: 480)
  --height <px>        viewport height (default: 800)
  --margin-left <px>   left margin (default: 10)
  --margin-right <px>  right margin (default: 10)
  --margin-top <px>    top margin (default: 8)
  --margin-bottom <px> bottom margin (default: 24)
  --indent <px>        paragraph first-line indent (default: 20)
  --empty-line <px>    height of an empty line (default: 10)
  --no-title-spacer    no empty line after titles

Set RUST_LOG=debug for parser and pagination logs.

DEFAULT FB2:
  tests/fixtures/sample.fb2
"#
}

#[derive(Clone, Debug)]
struct BitmapDisplay {
    size: Size,
    pixels: Vec<BinaryColor>,
}

impl BitmapDisplay {
    fn new(width: u32, height: u32) -> Self {
        let len = width.saturating_mul(height) as usize;
        Self {
            size: Size::new(width, height),
            pixels: vec![BinaryColor::Off; len],
        }
    }

    fn save_pgm(&self, path: &str) -> Result<(), String> {
        let mut data = Vec::with_capacity(self.pixels.len() + 64);
        data.extend_from_slice(
            format!("P5\n{} {}\n255\n", self.size.width, self.size.height).as_bytes(),
        );
        data.extend(self.pixels.iter().map(|color| match color {
            BinaryColor::On => 0u8,
            BinaryColor::Off => 255u8,
        }));
        std::fs::write(path, data).map_err(|e| e.to_string())
    }
}

impl OriginDimensions for BitmapDisplay {
    fn size(&self) -> Size {
        self.size
    }
}

impl DrawTarget for BitmapDisplay {
    type Color = BinaryColor;
    type Error = core::convert::Infallible;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        let w = self.size.width as i32;
        let h = self.size.height as i32;
        for Pixel(point, color) in pixels {
            if point.x < 0 || point.y < 0 || point.x >= w || point.y >= h {
                continue;
            }
            let idx = (point.y as u32 * self.size.width + point.x as u32) as usize;
            if let Some(slot) = self.pixels.get_mut(idx) {
                *slot = color;
            }
        }
        Ok(())
    }

    fn clear(&mut self, color: Self::Color) -> Result<(), Self::Error> {
        self.pixels.fill(color);
        Ok(())
    }
}
