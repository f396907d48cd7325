use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use passline::{
    FAMILY_IMGSEQ, INSTANCE_ID, LAYER_MANAGER, NodeDef, Plug, ProjectConfig, PublishContext,
    RENDER_GLOBALS, RenderLayerCollector, SceneGraph, TYPE_OBJECT_SET, TYPE_RENDER_LAYER,
    WorkSession, layer_label, resolve, seed_instances,
};

#[derive(Parser, Debug)]
#[command(name = "passline", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List the render layers a collection pass would publish.
    Layers(LayersArgs),
    /// Run a collection pass and emit the publish context as JSON.
    Collect(CollectArgs),
    /// Resolve one attribute under a layer (debugging aid).
    Resolve(ResolveArgs),
}

#[derive(Parser, Debug)]
struct LayersArgs {
    /// Input scene snapshot JSON.
    #[arg(long)]
    scene: PathBuf,
}

#[derive(Parser, Debug)]
struct CollectArgs {
    /// Input scene snapshot JSON.
    #[arg(long)]
    scene: PathBuf,

    /// Workspace directory renders are rooted under.
    #[arg(long)]
    workspace: String,

    /// Project settings JSON; checked and reported, not required.
    #[arg(long)]
    project: Option<PathBuf>,

    /// Output JSON path (stdout when omitted).
    #[arg(long)]
    out: Option<PathBuf>,

    /// Pretty-print the emitted JSON.
    #[arg(long, default_value_t = false)]
    pretty: bool,
}

#[derive(Parser, Debug)]
struct ResolveArgs {
    /// Input scene snapshot JSON.
    #[arg(long)]
    scene: PathBuf,

    /// Node path.
    #[arg(long)]
    node: String,

    /// Attribute name.
    #[arg(long)]
    attr: String,

    /// Render layer to resolve under.
    #[arg(long)]
    layer: String,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Layers(args) => cmd_layers(args),
        Command::Collect(args) => cmd_collect(args),
        Command::Resolve(args) => cmd_resolve(args),
    }
}

fn load_scene(path: &Path) -> anyhow::Result<SceneGraph> {
    SceneGraph::from_path(path)
        .with_context(|| format!("load scene '{}'", path.display()))
}

fn display_order(layer: &NodeDef) -> f64 {
    layer
        .attrs
        .get("displayOrder")
        .and_then(|a| a.value().as_f64().ok())
        .unwrap_or(0.0)
}

/// The pending image-sequence instance set, if the scene carries one.
/// With several, the last in snapshot order wins, like collection itself.
fn placeholder_node(scene: &SceneGraph) -> Option<String> {
    scene
        .nodes_of_type(TYPE_OBJECT_SET)
        .filter(|set| {
            set.attrs
                .get("id")
                .is_some_and(|a| a.value().as_text() == INSTANCE_ID)
                && set
                    .attrs
                    .get("family")
                    .is_some_and(|a| a.value().as_text() == FAMILY_IMGSEQ)
        })
        .map(|set| set.path.clone())
        .last()
}

fn cmd_layers(args: LayersArgs) -> anyhow::Result<()> {
    let scene = load_scene(&args.scene)?;
    let placeholder = placeholder_node(&scene);

    let linked: BTreeSet<&str> = scene
        .connections_to(LAYER_MANAGER, "renderLayerId")
        .filter_map(|conn| Plug::parse(&conn.src))
        .map(|plug| plug.node)
        .collect();

    let mut layers: Vec<&NodeDef> = scene.nodes_of_type(TYPE_RENDER_LAYER).collect();
    layers.sort_by(|a, b| display_order(a).total_cmp(&display_order(b)));

    for layer in layers {
        let renderable = layer
            .attrs
            .get("renderable")
            .is_some_and(|a| a.value().truthy());
        if !linked.contains(layer.path.as_str()) || !renderable || layer.referenced {
            continue;
        }

        let layer_id = layer.path.as_str();
        let renderer = resolve(&scene, RENDER_GLOBALS, "currentRenderer", layer_id)
            .map(|v| v.as_text())
            .unwrap_or_default();
        let render_type = placeholder
            .as_deref()
            .and_then(|node| resolve(&scene, node, "renderType", layer_id).ok())
            .map(|v| v.as_text())
            .unwrap_or_default();
        let range = frame_range_text(&scene, layer_id);

        println!(
            "{:<24} order {:<6} {:<10} {:<12} {range}",
            layer_label(layer_id),
            display_order(layer),
            renderer,
            render_type,
        );
    }
    Ok(())
}

fn frame_range_text(scene: &SceneGraph, layer: &str) -> String {
    let frame = |attr: &str| {
        resolve(scene, RENDER_GLOBALS, attr, layer)
            .ok()
            .and_then(|v| v.as_f64().ok())
    };
    match (frame("startFrame"), frame("endFrame")) {
        (Some(start), Some(end)) => format!("{start}-{end}"),
        _ => String::new(),
    }
}

fn cmd_collect(args: CollectArgs) -> anyhow::Result<()> {
    let scene = load_scene(&args.scene)?;

    if let Some(project_path) = &args.project {
        let project = ProjectConfig::from_path(project_path)
            .with_context(|| format!("load project settings '{}'", project_path.display()))?;
        let session = WorkSession::new(args.workspace.clone(), project);
        let timeline = session.timeline()?;
        eprintln!(
            "project timeline {}-{} @ {}",
            timeline.start,
            timeline.end,
            session.time_unit()?.name()
        );
    }

    let mut context = PublishContext::new();
    let seeded = seed_instances(&scene, &mut context);
    eprintln!("seeded {seeded} instance(s) from the scene");

    RenderLayerCollector::new(&scene).collect(&args.workspace, &mut context)?;

    let json = if args.pretty {
        serde_json::to_string_pretty(&context)?
    } else {
        serde_json::to_string(&context)?
    };

    match &args.out {
        Some(out) => {
            if let Some(parent) = out.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("create output dir '{}'", parent.display()))?;
            }
            std::fs::write(out, json)
                .with_context(|| format!("write context '{}'", out.display()))?;
            eprintln!("wrote {}", out.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn cmd_resolve(args: ResolveArgs) -> anyhow::Result<()> {
    let scene = load_scene(&args.scene)?;
    let value = resolve(&scene, &args.node, &args.attr, &args.layer)?;
    println!("{}", value.to_json());
    Ok(())
}
