use clap::{CommandFactory, Parser};
use clap_complete::Shell;
use std::io::Write;
use std::path::{Path, PathBuf};

use taxomap::config::Settings;
use taxomap::export::{ConvertFormat, RasterFormat, RasterOptions, TreeMeta};
use taxomap::fonts::CosmicTextMeasure;
use taxomap::render::{RenderOptions, TidyTreeEngine};
use taxomap::taxonomy::rows_from_json;
use taxomap::theme::Theme;
use taxomap::workspace::{TreeId, TreeWorkspace};

type Workspace = TreeWorkspace<TidyTreeEngine<CosmicTextMeasure>>;

/// Reconcile taxonomy rows into a tree and render or export it
#[derive(Parser, Debug)]
#[command(name = "taxomap")]
#[command(about = "Turn flat taxonomy rows or an outline into a rank-aware tree", long_about = None)]
struct Args {
    /// Input: JSON taxon rows or an outline (use "-" for stdin)
    #[arg(value_name = "INPUT", required_unless_present = "completions")]
    input: Option<PathBuf>,

    /// Output file path (extension determines format: .md, .svg, .png, .jpg, .html,
    /// .nwk, .nhx, .phyloxml, .csv or .json)
    #[arg(short, long, value_name = "OUTPUT", required_unless_present = "completions")]
    output: Option<PathBuf>,

    /// Force this taxon id as the single root
    #[arg(long, value_name = "ID")]
    base_id: Option<i64>,

    /// Built-in theme name (light, dark) or path to an Alacritty theme file
    #[arg(short, long, value_name = "THEME")]
    theme: Option<String>,

    /// Settings file (TOML or YAML)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Raster scale multiplier for PNG/JPEG output
    #[arg(long)]
    png_scale: Option<f32>,

    /// Byte budget for raster output; oversized images are re-encoded as JPEG
    #[arg(long, value_name = "BYTES")]
    max_bytes: Option<usize>,

    /// Label internal nodes in Newick output
    #[arg(long)]
    internal_labels: bool,

    /// Title used for the page and for the root of a multi-root tree
    #[arg(long)]
    title: Option<String>,

    /// User the tree belongs to; pass twice for a comparison
    #[arg(short, long = "user", value_name = "NAME")]
    users: Vec<String>,

    /// Taxon name shown in titles and file names
    #[arg(long, value_name = "NAME")]
    taxon_name: Option<String>,

    /// Write the edge table instead of the node table for .csv output
    #[arg(long)]
    edges: bool,

    /// Print shell completions and exit
    #[arg(long, value_name = "SHELL")]
    completions: Option<Shell>,
}

fn main() -> Result<(), String> {
    let _ = env_logger::builder().format_timestamp(None).try_init();
    let args = Args::parse();

    if let Some(shell) = args.completions {
        clap_complete::generate(shell, &mut Args::command(), "taxomap", &mut std::io::stdout());
        return Ok(());
    }
    let (Some(input), Some(output)) = (args.input.as_deref(), args.output.as_deref()) else {
        return Err("INPUT and --output are required".to_string());
    };

    let mut settings = match &args.config {
        Some(path) => Settings::load(path).map_err(|e| e.to_string())?,
        None => Settings::default(),
    };
    if let Some(scale) = args.png_scale {
        settings.export.png_scale = scale;
    }
    if args.max_bytes.is_some() {
        settings.export.max_bytes = args.max_bytes;
    }
    if args.internal_labels {
        settings.export.include_internal_labels = true;
    }

    let theme = match args.theme.as_deref().or(settings.theme.as_deref()) {
        Some(name) => Theme::resolve(name).map_err(|e| e.to_string())?,
        None => Theme::light(),
    };

    let text = read_input(input)?;
    let meta = TreeMeta {
        title: args.title.clone(),
        users: args.users.clone(),
        taxon_name: args.taxon_name.clone(),
        taxon_id: args.base_id,
        ..TreeMeta::default()
    };

    let engine = TidyTreeEngine::new(
        CosmicTextMeasure::new(),
        RenderOptions::from(&settings.render),
    );
    let mut workspace = Workspace::new(engine, settings, theme);
    let id = if is_rows_input(input, &text) {
        let rows = rows_from_json(&text).map_err(|e| e.to_string())?;
        workspace
            .add_tree_from_rows(rows, args.base_id, meta)
            .map_err(|e| e.to_string())?
    } else {
        workspace
            .add_tree_from_outline(&text, meta)
            .map_err(|e| e.to_string())?
    };
    workspace.run_until_idle();

    if let Some(tree) = workspace.tree(id)
        && !tree.unreachable.is_empty()
    {
        log::info!(
            "{} taxa are not below the base id and were left out",
            tree.unreachable.len()
        );
    }

    let output_ext = output
        .extension()
        .and_then(|e| e.to_str())
        .ok_or("Output file has no extension")?
        .to_ascii_lowercase();
    let (label, bytes) = render_output(&workspace, id, &output_ext, args.edges)?;
    write_atomic(output, &bytes)?;
    eprintln!("{label} saved to: {}", output.display());

    Ok(())
}

fn read_input(input: &Path) -> Result<String, String> {
    if input.to_str() == Some("-") {
        let mut buffer = String::new();
        std::io::Read::read_to_string(&mut std::io::stdin(), &mut buffer)
            .map_err(|e| format!("Failed to read from stdin: {}", e))?;
        Ok(buffer)
    } else {
        std::fs::read_to_string(input).map_err(|e| format!("Failed to read input file: {}", e))
    }
}

/// `.json` files, or anything that starts like a JSON document.
fn is_rows_input(input: &Path, text: &str) -> bool {
    let json_ext = input
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));
    json_ext || matches!(text.trim_start().chars().next(), Some('[' | '{'))
}

fn render_output(
    workspace: &Workspace,
    id: TreeId,
    ext: &str,
    edges: bool,
) -> Result<(&'static str, Vec<u8>), String> {
    let surface_error = |e: taxomap::Error| match workspace.tree(id).and_then(|t| t.notice()) {
        Some(notice) => format!("{e} ({notice})"),
        None => e.to_string(),
    };

    let output = match ext {
        "md" | "txt" => {
            let tree = workspace.tree(id).ok_or("Tree disappeared")?;
            ("Outline", tree.outline.clone().into_bytes())
        }
        "svg" => (
            "SVG",
            workspace.export_svg(id).map_err(surface_error)?.into_bytes(),
        ),
        "png" | "jpg" | "jpeg" => {
            let format = if ext == "png" {
                RasterFormat::Png
            } else {
                RasterFormat::Jpeg
            };
            let options = RasterOptions {
                format,
                ..RasterOptions::from(&workspace.settings().export)
            };
            let image = workspace
                .export_raster(id, &options)
                .map_err(surface_error)?;
            log::debug!("raster {}x{}, {} bytes", image.width, image.height, image.bytes.len());
            let label = match image.format {
                RasterFormat::Png => "PNG",
                RasterFormat::Jpeg => "JPEG",
            };
            (label, image.bytes)
        }
        "html" | "htm" => (
            "HTML",
            workspace.export_html(id).map_err(|e| e.to_string())?.into_bytes(),
        ),
        "nwk" | "newick" | "tree" => (
            "Newick",
            workspace.export_newick(id).map_err(|e| e.to_string())?.into_bytes(),
        ),
        "nhx" => converted(workspace, id, ConvertFormat::Nhx, "NHX")?,
        "phyloxml" | "xml" => converted(workspace, id, ConvertFormat::PhyloXml, "PhyloXML")?,
        "csv" if edges => converted(workspace, id, ConvertFormat::EdgesCsv, "Edges CSV")?,
        "csv" => converted(workspace, id, ConvertFormat::NodesCsv, "Nodes CSV")?,
        "json" => {
            let graph = workspace.export_graph(id).map_err(|e| e.to_string())?;
            ("Graph JSON", graph.to_json().map_err(|e| e.to_string())?.into_bytes())
        }
        _ => {
            return Err(format!(
                "Unsupported output format: .{} (use .md, .svg, .png, .jpg, .html, .nwk, .nhx, .phyloxml, .csv or .json)",
                ext
            ));
        }
    };
    Ok(output)
}

fn converted(
    workspace: &Workspace,
    id: TreeId,
    format: ConvertFormat,
    label: &'static str,
) -> Result<(&'static str, Vec<u8>), String> {
    let body = workspace
        .export_converted(id, format)
        .map_err(|e| e.to_string())?;
    Ok((label, body.into_bytes()))
}

/// Write through a sibling temp file and rename, so a failed write leaves no partial
/// output behind.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), String> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or("Output path has no file name")?;
    let tmp = path.with_file_name(format!(".{file_name}.{}.tmp", std::process::id()));

    let result = std::fs::File::create(&tmp)
        .and_then(|mut file| {
            file.write_all(bytes)?;
            file.sync_all()
        })
        .and_then(|()| std::fs::rename(&tmp, path));
    if let Err(e) = result {
        let _ = std::fs::remove_file(&tmp);
        return Err(format!("Failed to write {}: {}", path.display(), e));
    }
    Ok(())
}
