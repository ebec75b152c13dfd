use std::fmt::Write as _;
use std::time::{Duration, Instant};

use taxomap::config::Settings;
use taxomap::export::{
    ConvertFormat, GraphConverter, LocalConverter, RasterFormat, RasterOptions, TreeGraph,
    TreeMeta,
};
use taxomap::fonts::ApproxTextMeasure;
use taxomap::render::{DisplayNode, RenderEngine, RenderOptions, TidyTreeEngine, apply_colors};
use taxomap::parse_outline;
use taxomap::{Theme, TreeWorkspace, build, decorate, rows_from_json, to_plain_text};

const FELIDAE_ROWS: &str = r#"[
    {"taxon_id": 1, "name": "Felidae", "rank": "family", "ancestor_ids": "{48460,1}"},
    {"taxon_id": 2, "name": "Felis", "rank": "genus", "ancestor_ids": [48460, 1, 2]},
    {"taxon_id": 3, "name": "Felis catus", "rank": "species", "parent_id": 2, "ancestor_ids": [48460, 1, 2, 3]},
    {"taxon_id": 9, "name": "Canis", "rank": "genus", "ancestor_ids": [48460, 9]}
]"#;

fn workspace() -> TreeWorkspace<TidyTreeEngine<ApproxTextMeasure>> {
    let settings = Settings::default();
    let engine = TidyTreeEngine::new(
        ApproxTextMeasure::default(),
        RenderOptions::from(&settings.render),
    );
    TreeWorkspace::new(engine, settings, Theme::light())
}

fn meta() -> TreeMeta {
    TreeMeta {
        users: vec!["alice".into()],
        taxon_name: Some("Felidae".into()),
        taxon_id: Some(1),
        ..TreeMeta::default()
    }
}

#[test]
fn felidae_rows_build_under_the_base_id() {
    let rows = rows_from_json(FELIDAE_ROWS).unwrap();
    let outline = build(&rows, Some(1));
    assert_eq!(
        outline,
        "- Felidae {rank:family}\n  - Felis {rank:genus}\n    - Felis catus {rank:species}"
    );
    assert_eq!(build(&rows, Some(1)), outline);
}

#[test]
fn without_a_base_id_every_rootless_taxon_is_a_root() {
    let rows = rows_from_json(FELIDAE_ROWS).unwrap();
    let outline = build(&rows, None);
    assert!(outline.contains("- Canis {rank:genus}"));
    assert!(outline.starts_with("- Felidae {rank:family}"));
}

#[test]
fn decorated_outline_strips_back_to_text() {
    let rows = rows_from_json(FELIDAE_ROWS).unwrap();
    let outline = build(&rows, Some(1));
    let decorated = decorate(&outline);
    assert!(decorated.contains(r#"data-rank="species""#));
    assert_eq!(
        to_plain_text(&decorated),
        "- Felidae\n  - Felis\n    - Felis catus"
    );
}

#[test]
fn rendered_tree_exports_every_format() {
    let rows = rows_from_json(FELIDAE_ROWS).unwrap();
    let mut ws = workspace();
    let id = ws.add_tree_from_rows(rows, Some(1), meta()).unwrap();
    ws.run_until_idle();

    let tree = ws.tree(id).unwrap();
    assert_eq!(tree.unreachable, vec![9]);
    assert!(tree.minimap.is_some());

    let svg = ws.export_svg(id).unwrap();
    assert!(svg.contains(r#"class="mm-badge mm-rank""#));
    assert!(ws.live_svg(id).unwrap().contains("transform="));
    assert!(ws.minimap_svg(id).unwrap().unwrap().contains("mini-viewport"));

    assert_eq!(ws.export_newick(id).unwrap(), "(('Felis catus'));");
    let phyloxml = ws.export_converted(id, ConvertFormat::PhyloXml).unwrap();
    assert!(phyloxml.contains("<rank>species</rank>"));
    let csv = ws.export_converted(id, ConvertFormat::EdgesCsv).unwrap();
    assert_eq!(csv, "parent_id,child_id\nn1,n2\nn2,n3\n");
    let json = ws.export_graph(id).unwrap().to_json().unwrap();
    assert!(json.contains("\"name\": \"Felis catus\""));
    assert!(ws.export_html(id).unwrap().contains("Markmap.create"));
}

#[test]
fn png_dimensions_match_scaled_bounds() {
    let mut ws = workspace();
    let id = ws
        .add_tree_from_outline(
            "- Felidae {rank:family}\n  - Felis {rank:genus}\n  - Lynx {rank:genus}",
            meta(),
        )
        .unwrap();
    ws.run_until_idle();

    let bbox = ws
        .tree(id)
        .unwrap()
        .surface()
        .unwrap()
        .content_bbox()
        .unwrap()
        .with_padding(4.0);
    let options = RasterOptions {
        scale: 3.0,
        ..RasterOptions::default()
    };
    let image = ws.export_raster(id, &options).unwrap();
    assert_eq!(image.format, RasterFormat::Png);

    let size = imagesize::blob_size(&image.bytes).unwrap();
    assert_eq!(size.width, (bbox.width * 3.0).ceil() as usize);
    assert_eq!(size.height, (bbox.height * 3.0).ceil() as usize);
}

#[test]
fn closing_evicts_the_shared_cache() {
    let cache = taxomap::TreeCache::default();
    let mut ws = workspace().with_cache(cache.clone());
    let id = ws.add_tree_from_outline("- A\n  - B", meta()).unwrap();
    ws.run_until_idle();
    assert_eq!(cache.len(), 1);
    ws.close(id).unwrap();
    assert!(cache.is_empty());
    assert!(ws.tree(id).is_none());
}

/// One family, 200 genera, 100 species each.
fn life_list_outline() -> String {
    let mut outline = String::from("- Felidae {rank:family}\n");
    for g in 0..200 {
        writeln!(outline, "  - Genus{g} {{rank:genus}}").unwrap();
        for s in 0..100 {
            writeln!(outline, "    - Genus{g} species{s} {{rank:species}}").unwrap();
        }
    }
    outline
}

#[test]
fn large_trees_color_and_convert_in_linear_time() {
    let forest: Vec<DisplayNode> = parse_outline(&life_list_outline())
        .iter()
        .map(DisplayNode::from_outline)
        .collect();
    let root = DisplayNode::root_of(&forest, None).unwrap();
    let mut engine = TidyTreeEngine::new(ApproxTextMeasure::default(), RenderOptions::default());
    let mut surface = engine.create(&root, 1200.0, 800.0).unwrap();
    assert!(surface.nodes.len() > 20_000);

    let started = Instant::now();
    assert!(apply_colors(&mut surface) > 20_000);
    assert!(surface.links.iter().all(|l| l.stroke.is_some()));

    let graph = TreeGraph::from_forest(&forest, None);
    assert_eq!(graph.nodes.len(), 20_201);
    let converter = LocalConverter::default();
    let nhx = converter.convert(&graph, ConvertFormat::Nhx).unwrap();
    assert!(nhx.ends_with("Felidae[&&NHX:rank=family];"));
    let phyloxml = converter.convert(&graph, ConvertFormat::PhyloXml).unwrap();
    assert_eq!(phyloxml.matches("<clade>").count(), 20_201);

    assert!(
        started.elapsed() < Duration::from_secs(5),
        "took {:?}",
        started.elapsed()
    );
}
