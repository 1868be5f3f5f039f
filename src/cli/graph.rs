// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 shipflow contributors

//! Graph command - visualize the artifact flow

use miette::Result;
use std::path::PathBuf;

use super::{load_pipeline, GraphFormat};
use crate::pipeline::ArtifactGraph;

/// Run the graph command
pub async fn run(pipeline_path: PathBuf, format: GraphFormat, verbose: bool) -> Result<()> {
    let pipeline = load_pipeline(&pipeline_path)?;
    let graph = ArtifactGraph::build(&pipeline);

    let output = match format {
        GraphFormat::Text => graph.to_text(&pipeline),
        GraphFormat::Dot => graph.to_dot(&pipeline),
        GraphFormat::Mermaid => graph.to_mermaid(&pipeline),
    };

    print!("{}", output);

    if verbose && format == GraphFormat::Text && !pipeline.is_empty() {
        println!();
        println!("Dependency order: {}", graph.topological_order_names()?.join(" → "));
    }

    Ok(())
}
