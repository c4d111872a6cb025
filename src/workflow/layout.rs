//! Deterministic layout assignment (C8): BFS longest-path leveling, then a centered
//! horizontal arrangement per level.
//!
//! This has no direct analogue in the suggestion/provider subsystems this crate grew
//! from; it is grounded directly on the algorithm SPEC_FULL §4.8 specifies, written in
//! the same plain-function-over-a-value-type style as [`crate::workflow::model`]'s
//! validation.

use std::collections::{HashMap, VecDeque};

use crate::workflow::model::{GeneratedWorkflow, Position};

const START_X: f64 = 250.0;
const START_Y: f64 = 50.0;
const HORIZONTAL_SPACING: f64 = 300.0;
const VERTICAL_SPACING: f64 = 150.0;

/// Assign a [`Position`] to every node in `workflow`, mutating it in place. Level 0
/// nodes (no incoming edges) land on `y = START_Y`; each successor gets
/// `max(existing, predecessor + 1)`, the longest-path form, so a node reachable via two
/// paths of different length ends up below both.
pub fn assign_positions(workflow: &mut GeneratedWorkflow) {
    let node_ids: Vec<String> = workflow.definition.nodes.iter().map(|n| n.id.clone()).collect();

    let mut adjacency: HashMap<&str, Vec<&str>> = HashMap::new();
    let mut in_degree: HashMap<&str, u32> = node_ids.iter().map(|id| (id.as_str(), 0)).collect();
    for edge in &workflow.definition.edges {
        adjacency.entry(edge.source.as_str()).or_default().push(edge.target.as_str());
        if let Some(count) = in_degree.get_mut(edge.target.as_str()) {
            *count += 1;
        }
    }

    let mut levels: HashMap<&str, u32> = HashMap::new();
    let mut remaining_in_degree = in_degree.clone();
    let mut queue: VecDeque<&str> = node_ids
        .iter()
        .map(|id| id.as_str())
        .filter(|id| in_degree.get(id).copied().unwrap_or(0) == 0)
        .collect();
    for &id in &queue {
        levels.insert(id, 0);
    }

    while let Some(id) = queue.pop_front() {
        let current_level = *levels.get(id).unwrap_or(&0);
        if let Some(successors) = adjacency.get(id) {
            for &successor in successors {
                let next_level = current_level + 1;
                let entry = levels.entry(successor).or_insert(0);
                *entry = (*entry).max(next_level);

                if let Some(count) = remaining_in_degree.get_mut(successor) {
                    *count = count.saturating_sub(1);
                    if *count == 0 {
                        queue.push_back(successor);
                    }
                }
            }
        }
    }

    // Nodes unreachable from any root (e.g. cut off by a cycle the generator produced
    // despite validation) default to level 0 rather than being left unpositioned.
    for id in &node_ids {
        levels.entry(id.as_str()).or_insert(0);
    }

    let mut nodes_by_level: HashMap<u32, Vec<&str>> = HashMap::new();
    for id in &node_ids {
        let level = levels[id.as_str()];
        nodes_by_level.entry(level).or_default().push(id.as_str());
    }

    let mut positions: HashMap<&str, Position> = HashMap::new();
    for (level, ids) in &nodes_by_level {
        let count = ids.len();
        let level_start_x = START_X - ((count as f64 - 1.0) * HORIZONTAL_SPACING) / 2.0;
        for (i, &id) in ids.iter().enumerate() {
            positions.insert(
                id,
                Position { x: level_start_x + (i as f64) * HORIZONTAL_SPACING, y: START_Y + (*level as f64) * VERTICAL_SPACING },
            );
        }
    }

    for node in &mut workflow.definition.nodes {
        node.position = positions.get(node.id.as_str()).copied();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::model::{GeneratedEdge, GeneratedNode, WorkflowDefinition};
    use std::collections::HashMap as StdHashMap;

    fn node(id: &str) -> GeneratedNode {
        GeneratedNode { id: id.into(), node_type: "action:http".into(), name: id.into(), description: None, config: StdHashMap::new(), position: None }
    }

    fn edge(id: &str, source: &str, target: &str) -> GeneratedEdge {
        GeneratedEdge { id: id.into(), source: source.into(), target: target.into(), label: None }
    }

    #[test]
    fn fan_out_centers_siblings_around_start_x() {
        let mut workflow = GeneratedWorkflow {
            name: "wf".into(),
            description: None,
            definition: WorkflowDefinition {
                nodes: vec![node("n1"), node("n2"), node("n3")],
                edges: vec![edge("e1", "n1", "n2"), edge("e2", "n1", "n3")],
            },
        };
        assign_positions(&mut workflow);

        let pos = |id: &str| workflow.definition.nodes.iter().find(|n| n.id == id).unwrap().position.unwrap();
        assert_eq!(pos("n1"), Position { x: 250.0, y: 50.0 });
        assert_eq!(pos("n2"), Position { x: 100.0, y: 200.0 });
        assert_eq!(pos("n3"), Position { x: 400.0, y: 200.0 });
    }

    #[test]
    fn longest_path_wins_when_a_node_has_multiple_predecessors() {
        let mut workflow = GeneratedWorkflow {
            name: "wf".into(),
            description: None,
            definition: WorkflowDefinition {
                nodes: vec![node("n1"), node("n2"), node("n3"), node("n4")],
                edges: vec![
                    edge("e1", "n1", "n2"),
                    edge("e2", "n2", "n3"),
                    edge("e3", "n1", "n3"),
                    edge("e4", "n3", "n4"),
                ],
            },
        };
        assign_positions(&mut workflow);

        let level_of = |id: &str| workflow.definition.nodes.iter().find(|n| n.id == id).unwrap().position.unwrap().y;
        assert_eq!(level_of("n1"), 50.0);
        assert_eq!(level_of("n2"), 200.0);
        assert_eq!(level_of("n3"), 350.0);
        assert_eq!(level_of("n4"), 500.0);
    }

    #[test]
    fn single_node_lands_at_the_start_position() {
        let mut workflow =
            GeneratedWorkflow { name: "wf".into(), description: None, definition: WorkflowDefinition { nodes: vec![node("n1")], edges: vec![] } };
        assign_positions(&mut workflow);
        assert_eq!(workflow.definition.nodes[0].position.unwrap(), Position { x: 250.0, y: 50.0 });
    }
}
