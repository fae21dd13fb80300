use fragtree::export::{DirectorySink, ExportOptions};
use fragtree::FragTreeError;
use fragtree_int_test::test_util::{cleanup, create_test_context, random_stations, run_test};
use serde_json::Value;
use std::collections::HashSet;
use std::fs;
use std::path::Path;

fn read_json(path: &Path) -> fragtree::FragTreeResult<Value> {
    let bytes = fs::read(path)?;
    serde_json::from_slice(&bytes).map_err(FragTreeError::from)
}

/// Every file name in `dir` with the given prefix, sorted.
fn pages(dir: &Path, prefix: &str) -> fragtree::FragTreeResult<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir)? {
        let name = entry?.file_name().to_string_lossy().into_owned();
        if name.starts_with(prefix) && name.ends_with(".jsonld") {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}

/// Splits `/dir/file#id` into the file path below `root` and the fragment.
fn resolve(root: &Path, reference: &str) -> (std::path::PathBuf, String) {
    let (file, id) = reference.split_once('#').unwrap();
    (root.join(file.trim_start_matches('/')), id.to_string())
}

#[test]
fn test_export_to_directory() {
    run_test(
        || create_test_context(),
        |ctx| {
            let mut tree = ctx.open_tree(ctx.config().max_entries(5).build())?;
            tree.load(random_stations(3000, 21))?;

            let options = ExportOptions::builder("stations", "gtfs:Station")
                .tree_dir("tree")
                .data_dir("data")
                .goal_size(20_000)
                .max_size(40_000)
                .build();
            let out = ctx.export_dir();
            let mut sink = DirectorySink::new(&out);
            let report = tree.to_fragments(&options, &mut sink)?;

            assert_eq!(report.data_items, 3000);
            assert!(report.tree_pages > 1);
            assert!(report.data_pages > 1);
            assert_eq!(pages(&out.join("tree"), "t")?.len() as u64, report.tree_pages);
            assert_eq!(pages(&out.join("data"), "d")?.len() as u64, report.data_pages);

            let collection = read_json(&out.join("stations"))?;
            let graph = &collection["@graph"][0];
            assert_eq!(graph["hydra:totalItems"], 3000);
            assert_eq!(graph["hydra:manages"], "gtfs:Station");

            // the view points at the root on the first tree page
            let view = graph["hydra:view"]["@id"].as_str().unwrap().to_string();
            let (file, id) = resolve(&out, &view);
            let first = read_json(&file)?;
            assert_eq!(first["@graph"][0]["dcterms:identifier"], id.parse::<u64>().unwrap());

            tree.close()
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_exported_references_resolve() {
    run_test(
        || create_test_context(),
        |ctx| {
            let mut tree = ctx.open_tree(ctx.config().max_entries(4).build())?;
            tree.load(random_stations(1500, 22))?;

            let options = ExportOptions::builder("stations", "gtfs:Station")
                .tree_dir("tree")
                .data_dir("data")
                .goal_size(8_000)
                .max_size(16_000)
                .build();
            let out = ctx.export_dir();
            tree.to_fragments(&options, &mut DirectorySink::new(&out))?;

            // every id defined anywhere, as "<path>#<id>"
            let mut defined = HashSet::new();
            let mut references = Vec::new();

            for name in pages(&out.join("data"), "d")? {
                let doc = read_json(&out.join("data").join(&name))?;
                for record in doc["@graph"].as_array().unwrap() {
                    let local = record["@id"].as_str().unwrap();
                    defined.insert(format!("/data/{}", local));
                    assert!(record["geo:lat"].is_number());
                    assert!(record["geo:long"].is_number());
                }
            }

            for name in pages(&out.join("tree"), "t")? {
                let doc = read_json(&out.join("tree").join(&name))?;
                let mut stack = vec![doc["@graph"][0].clone()];
                while let Some(node) = stack.pop() {
                    let local = node["@id"].as_str().unwrap();
                    assert!(local.starts_with(&name));
                    defined.insert(format!("/tree/{}", local));

                    if let Some(members) = node["hydra:member"].as_array() {
                        for member in members {
                            references.push(member["@id"].as_str().unwrap().to_string());
                        }
                    }
                    if let Some(relations) = node["tree:hasChildRelation"].as_array() {
                        for relation in relations {
                            for child in relation["tree:child"].as_array().unwrap() {
                                if child.get("tree:hasChildRelation").is_some()
                                    || child.get("hydra:member").is_some()
                                {
                                    stack.push(child.clone());
                                } else {
                                    references.push(child["@id"].as_str().unwrap().to_string());
                                }
                            }
                        }
                    }
                }
            }

            assert!(!references.is_empty());
            for reference in &references {
                assert!(defined.contains(reference), "dangling reference {}", reference);
            }
            tree.close()
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_export_without_subdirectories() {
    run_test(
        || create_test_context(),
        |ctx| {
            let mut tree = ctx.open_tree(ctx.config().max_entries(20).build())?;
            tree.load(random_stations(20, 23))?;

            let options = ExportOptions::builder("stations.jsonld", "gtfs:Station").build();
            let out = ctx.export_dir();
            let report = tree.to_fragments(&options, &mut DirectorySink::new(&out))?;

            assert_eq!(report.tree_pages, 1);
            assert_eq!(report.data_pages, 1);
            assert!(out.join("stations.jsonld").is_file());
            assert!(out.join("t0.jsonld").is_file());
            assert!(out.join("d0.jsonld").is_file());

            let page = read_json(&out.join("t0.jsonld"))?;
            let members = page["@graph"][0]["hydra:member"].as_array().unwrap().clone();
            assert_eq!(members.len(), 20);
            for member in members {
                assert!(member["@id"].as_str().unwrap().starts_with("/d0.jsonld#"));
            }
            tree.close()
        },
        |ctx| cleanup(ctx),
    )
}

#[test]
fn test_empty_tree_export() {
    run_test(
        || create_test_context(),
        |ctx| {
            let mut tree = ctx.open_tree(ctx.config().build())?;
            let options = ExportOptions::builder("empty", "gtfs:Station")
                .tree_dir("tree")
                .data_dir("data")
                .build();
            let out = ctx.export_dir();
            let report = tree.to_fragments(&options, &mut DirectorySink::new(&out))?;

            assert_eq!(report.tree_pages, 1);
            assert_eq!(report.data_pages, 0);
            assert!(out.join("tree").join("t0.jsonld").is_file());
            assert!(!out.join("data").exists());

            let collection = read_json(&out.join("empty"))?;
            assert_eq!(collection["@graph"][0]["hydra:totalItems"], 0);
            tree.close()
        },
        |ctx| cleanup(ctx),
    )
}
