// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! Graph exports for the CLI

use std::fmt::Write;

use crate::error::Result;
use crate::model::NavigationState;

use super::CrawlGraph;

/// Render the navigation graph in Graphviz dot format
pub fn render_dot(graph: &CrawlGraph) -> Result<String> {
    let navs = graph.navigations()?;
    let mut out = String::from("digraph browserk {\n  node [shape=box fontsize=10];\n");
    for nav in &navs {
        let color = match nav.state {
            NavigationState::Visited | NavigationState::Audited => "darkgreen",
            NavigationState::Failed => "red",
            NavigationState::InProcess => "orange",
            _ => "gray",
        };
        let _ = writeln!(
            out,
            "  \"{}\" [label=\"{}\\n{}\" color={}];",
            nav.id.short(),
            escape(&nav.describe()),
            nav.state,
            color
        );
    }
    for nav in navs.iter().filter(|n| !n.is_root()) {
        let _ = writeln!(out, "  \"{}\" -> \"{}\";", nav.origin_id.short(), nav.id.short());
    }
    out.push_str("}\n");
    Ok(out)
}

/// Per-state counts, one line each
pub fn render_summary(graph: &CrawlGraph) -> Result<String> {
    let counts = graph.state_counts()?;
    let total: usize = counts.values().sum();
    let mut out = String::new();
    for state in NavigationState::all() {
        if let Some(n) = counts.get(&state) {
            let _ = writeln!(out, "{:<10} {}", state.to_string(), n);
        }
    }
    let _ = writeln!(out, "{:<10} {}", "Total", total);
    Ok(out)
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Action, ActionType, HtmlElement, Navigation, TriggeredBy};

    #[test]
    fn test_dot_contains_edges() {
        let graph = CrawlGraph::in_memory(3).unwrap();
        let root = Navigation::new(None, TriggeredBy::Initial, Action::load_url("http://h/"));
        let child = Navigation::new(
            Some(&root),
            TriggeredBy::Crawler,
            Action::with_element(ActionType::LeftClick, HtmlElement::new("a").attr("href", "/\"b\"")),
        );
        graph.add_navigations(&[root.clone(), child.clone()]).unwrap();

        let dot = render_dot(&graph).unwrap();
        assert!(dot.starts_with("digraph"));
        assert!(dot.contains(&format!("\"{}\" -> \"{}\"", root.id.short(), child.id.short())));
        assert!(dot.contains("\\\"b\\\""));

        let summary = render_summary(&graph).unwrap();
        assert!(summary.contains("Unvisited  2"));
        assert!(summary.contains("Total      2"));
    }
}
