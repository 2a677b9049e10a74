#![allow(missing_docs)]

use std::{sync::Arc, time::Instant};

use clap::Parser;
use color_eyre::eyre::bail;
use proptree::{NodeId, PropertyTemplate, Tree, Value};
use proptree_registry::RegistryBuilder;
use rand::prelude::*;
use serde_json::json;

/// Builds a random control tree, duplicates subtrees of it and reports how the property tables
/// are represented.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Number of nodes in the initial tree.
    #[clap(short = 'n', long, default_value = "10000")]
    nodes: usize,
    /// Maximal depth of the initial tree.
    #[clap(short = 'd', long, default_value = "8")]
    depth: usize,
    /// Number of subtrees to duplicate.
    #[clap(short = 'r', long, default_value = "20")]
    repetitions: usize,
    #[clap(short = 's', long, default_value = "0")]
    seed: u64,

    /// Number of declared ungrouped properties.
    #[clap(short = 'p', long, default_value = "40")]
    properties: usize,
    /// Maximal number of ungrouped properties set per node.
    #[clap(long, default_value = "6")]
    per_node: usize,
    /// Maximal number of attribute group members set per node.
    #[clap(long, default_value = "4")]
    group_members: usize,

    /// Validate the tree and all property tables when done.
    #[clap(long)]
    check: bool,
    /// Print the final tree as markup.
    #[clap(long)]
    render: bool,
    #[clap(long)]
    jsonl_output: bool,
}

const STRINGS: [&str; 6] = ["", "primary", "Save", "Cancel", "btn btn-default", "{value: Name}"];

fn random_value(rng: &mut impl Rng, strings: &[Arc<str>]) -> Value {
    match rng.gen_range(0..8) {
        0 => Value::Null,
        1 | 2 => Value::Bool(rng.gen()),
        3 | 4 => Value::Int(rng.gen_range(-2..100)),
        5 => Value::Float(rng.gen_range(0..8) as f64 * 0.25),
        _ => Value::Str(strings[rng.gen_range(0..strings.len())].clone()),
    }
}

fn main() -> color_eyre::Result<()> {
    let args = Args::parse();

    color_eyre::install()?;
    proptree_logger::setup();

    if args.properties == 0 {
        bail!("at least one property has to be declared");
    }

    let mut builder = RegistryBuilder::new();
    let properties = (0..args.properties)
        .map(|index| builder.declare_property("Control", &format!("Property{index}")))
        .collect::<Result<Vec<_>, _>>()?;
    let content = builder.declare_property("Control", "ContentTemplate")?;
    let attributes = builder.declare_group("HtmlElement", "data-")?;
    let members = (0..16)
        .map(|index| builder.declare_group_member(attributes, &format!("item{index}")))
        .collect::<Result<Vec<_>, _>>()?;
    let registry = builder.build().install()?;

    let strings: Vec<Arc<str>> = STRINGS.iter().map(|&text| text.into()).collect();
    let style = PropertyTemplate::new(
        properties
            .iter()
            .zip(&strings)
            .map(|(&property, text)| (property, Value::Str(text.clone()))),
    )?;

    let mut rng = rand_pcg::Pcg64::seed_from_u64(args.seed);
    let mut tree = Tree::new();

    let start = Instant::now();
    let root = tree.create_node("Page");
    let mut candidates: Vec<(NodeId, usize)> = vec![(root, 0)];

    for _ in 1..args.nodes {
        let (parent, depth) = candidates[rng.gen_range(0..candidates.len())];
        let (parent, depth) = if depth < args.depth {
            (parent, depth)
        } else {
            (root, 0)
        };
        let node = tree.add_child(parent, "Control");
        candidates.push((node, depth + 1));

        if rng.gen_bool(0.5) {
            tree.apply_template(node, &style);
        }
        for (ids, max_count) in [(&properties, args.per_node), (&members, args.group_members)] {
            for _ in 0..rng.gen_range(0..=max_count) {
                let property = ids[rng.gen_range(0..ids.len())];
                let value = random_value(&mut rng, &strings);
                tree.set(node, property, value);
            }
        }

        if rng.gen_bool(0.05) {
            let template = tree.create_node("Template");
            tree.add_child(template, "Literal");
            tree.set(node, content, Value::Template(template));
        }
    }

    let stats = tree.table_stats();
    log::info!("built {} nodes in {:.2?}", tree.len(), start.elapsed());
    log::info!("{stats:?}");

    let start = Instant::now();
    let mut clones = vec![];
    for _ in 0..args.repetitions {
        if candidates.len() < 2 {
            break;
        }
        let (source, _) = candidates[rng.gen_range(1..candidates.len())];
        let clone = tree.clone_subtree(source);
        tree.append_child(root, clone);
        clones.push(clone);

        let copied: Vec<NodeId> = tree.descendants(clone).collect();
        for _ in 0..copied.len() / 4 {
            let node = copied[rng.gen_range(0..copied.len())];
            let property = properties[rng.gen_range(0..properties.len())];
            let value = random_value(&mut rng, &strings);
            tree.set(node, property, value);
        }
    }
    log::info!(
        "duplicated {} subtrees, {} nodes in total, in {:.2?}",
        clones.len(),
        tree.len(),
        start.elapsed()
    );

    for &clone in clones.iter().step_by(2) {
        tree.remove_subtree(clone);
    }

    let stats = tree.table_stats();
    log::info!("{} nodes after removing every other duplicate", tree.len());
    log::info!("{stats:?}");

    if args.check {
        tree.check();
        log::info!("tree is consistent");
    }

    if args.render {
        print!("{}", tree.markup(registry, root));
    }

    if args.jsonl_output {
        println!(
            "{}",
            json!({
                "nodes": tree.len(),
                "properties": stats.properties,
                "tables": {
                    "empty": stats.empty,
                    "array8": stats.array8,
                    "array16": stats.array16,
                    "map": stats.map,
                },
            })
        );
    }

    Ok(())
}
