//! Example: Import and inspect a TPM file.
//!
//! Run with: cargo run --example inspect_tpm -- path/to/model.tpm [--rewrite]
//!
//! With `--rewrite` the scene is exported again and printed to stdout.

use std::env;

use anyhow::Context;
use tpm_core::tpm::{import, serialize};
use tpm_core::ExportOptions;

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        println!("Usage: inspect_tpm <path-to-tpm-file> [--rewrite]");
        println!("\nExample:");
        println!("  cargo run --example inspect_tpm -- models/raptor.tpm --rewrite");
        return Ok(());
    }

    let path = &args[1];
    let rewrite = args.iter().skip(2).any(|arg| arg == "--rewrite");

    let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path))?;
    let report = import(&text).with_context(|| format!("parsing {}", path))?;
    let scene = &report.scene;

    if rewrite {
        print!("{}", serialize(scene, &ExportOptions::default())?);
        return Ok(());
    }

    println!("=== {} ===", path);
    if let Some(info) = &scene.file_info {
        println!("Format version: {}", info.format_version);
        if let Some(name) = &info.name {
            println!("Name: {}", name);
        }
        if let Some(date) = &info.date {
            println!("Date: {}", date);
        }
    }

    println!("\n--- Materials ({}) ---", scene.materials.len());
    for material in &scene.materials {
        let maps: Vec<String> = material
            .maps()
            .map(|(kind, map)| format!("{}={}", kind.key(), map))
            .collect();
        println!("  {} [{}]", material.name, maps.join(", "));
    }

    println!("\n--- Geometry ---");
    let meshes = scene.meshes.iter().map(|m| ("mesh", m));
    let skins = scene.skins.iter().map(|s| ("skin", &s.mesh));
    for (kind, mesh) in meshes.chain(skins) {
        println!(
            "  {} {} - {} vertices, {} triangles, {} materials",
            kind,
            mesh.name,
            mesh.vertex_count(),
            mesh.triangle_count(),
            mesh.material_names.len()
        );
        if let Some((min, max)) = mesh.bounds() {
            println!(
                "       Bounds: ({:.2}, {:.2}, {:.2}) to ({:.2}, {:.2}, {:.2})",
                min.x, min.y, min.z, max.x, max.y, max.z
            );
        }
    }
    for skin in &scene.skins {
        println!(
            "  skin {} uses bones {:?}",
            skin.name(),
            skin.bones.values().collect::<Vec<_>>()
        );
    }

    println!("\n--- Instances ({}) ---", scene.instances.len());
    for instance in &scene.instances {
        let pos = instance.model_matrix().transform_point3(tpm_math::Vec3::ZERO);
        println!(
            "  {} -> {} at ({:.2}, {:.2}, {:.2}) scale {}",
            instance.name, instance.mesh, pos.x, pos.y, pos.z, instance.scale
        );
    }

    println!("\nTotal triangles: {}", scene.total_triangle_count());

    if !scene.passthrough.is_empty() {
        println!("Unknown blocks kept: {}", scene.passthrough.len());
    }

    if !report.errors.is_empty() {
        println!("\n--- Errors ({}) ---", report.errors.len());
        for err in &report.errors {
            println!("  {}", err);
        }
    }

    Ok(())
}
