// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 gplflow contributors

//! Graph command - print the stage graph

use miette::Result;

use super::GraphFormat;
use crate::pipeline::PipelineGraph;

/// Run the graph command
pub async fn run(format: GraphFormat, _verbose: bool) -> Result<()> {
    let graph = PipelineGraph::build()?;

    let output = match format {
        GraphFormat::Text => graph.to_text()?,
        GraphFormat::Dot => graph.to_dot(),
        GraphFormat::Mermaid => graph.to_mermaid(),
    };

    println!("{}", output);

    Ok(())
}
