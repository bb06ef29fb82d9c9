// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! CRD YAML Generator
//!
//! Generates the `CassandraCluster` CRD YAML from the Rust types in
//! src/crd.rs so deploy/crds/ stays in sync with the code.
//!
//! Usage:
//!   cargo run --bin crdgen

use cassy::crd::CassandraCluster;
use kube::CustomResourceExt;
use std::fs;
use std::path::Path;

const COPYRIGHT_HEADER: &str = "# Copyright (c) 2025 Erick Bourgeois, firestoned
# SPDX-License-Identifier: MIT
#
# This file is AUTO-GENERATED from src/crd.rs
# DO NOT EDIT MANUALLY - Run `cargo run --bin crdgen` to regenerate
#
";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let output_dir = Path::new("deploy/crds");
    fs::create_dir_all(output_dir)?;

    println!("Generating CRD YAML from src/crd.rs...");

    let crd = CassandraCluster::crd();
    let yaml = serde_yaml::to_string(&crd)?;
    let content = format!("{COPYRIGHT_HEADER}{yaml}");

    let output_path = output_dir.join("cassandraclusters.crd.yaml");
    fs::write(&output_path, content)?;

    println!("  ✓ Generated cassandraclusters.crd.yaml");
    println!("\nDeploy with: kubectl apply -f deploy/crds/");

    Ok(())
}
