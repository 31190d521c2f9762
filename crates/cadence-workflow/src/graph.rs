use std::collections::HashMap;

use cadence_config::StepDef;

/// Dependency graph used to reject cycles.
///
/// Edges run from a dependency to the step that depends on it. Adjacency
/// lists keep declaration order so the reported cycle is reproducible.
#[derive(Debug, Clone)]
pub(crate) struct Graph {
  /// Adjacency list: step_id -> list of downstream step_ids.
  adjacency: HashMap<String, Vec<String>>,
}

impl Graph {
  pub fn new(steps: &[StepDef]) -> Self {
    let mut adjacency: HashMap<String, Vec<String>> = HashMap::new();

    for step in steps {
      adjacency.entry(step.step_id.clone()).or_default();
    }
    for step in steps {
      for dep in &step.depends_on {
        adjacency
          .entry(dep.clone())
          .or_default()
          .push(step.step_id.clone());
      }
    }

    Self { adjacency }
  }

  /// Get steps that directly depend on the given step.
  pub fn downstream(&self, step_id: &str) -> &[String] {
    self
      .adjacency
      .get(step_id)
      .map(|v| v.as_slice())
      .unwrap_or(&[])
  }

  /// Find a dependency cycle, returned as the step ids along it with the
  /// first id repeated at the end.
  pub fn find_cycle(&self, order: &[String]) -> Option<Vec<String>> {
    #[derive(Clone, Copy, PartialEq)]
    enum Color {
      White,
      Gray,
      Black,
    }

    fn dfs<'a>(
      node: &'a str,
      graph: &'a Graph,
      color: &mut HashMap<&'a str, Color>,
      stack: &mut Vec<&'a str>,
    ) -> Option<Vec<String>> {
      color.insert(node, Color::Gray);
      stack.push(node);

      for next in graph.downstream(node) {
        match color.get(next.as_str()).copied().unwrap_or(Color::White) {
          Color::Gray => {
            // Back edge: the cycle is the stack suffix starting at `next`.
            let start = stack.iter().position(|s| *s == next.as_str()).unwrap_or(0);
            let mut path: Vec<String> = stack[start..].iter().map(|s| s.to_string()).collect();
            path.push(next.clone());
            return Some(path);
          }
          Color::White => {
            if let Some(path) = dfs(next.as_str(), graph, color, stack) {
              return Some(path);
            }
          }
          Color::Black => {}
        }
      }

      stack.pop();
      color.insert(node, Color::Black);
      None
    }

    let mut color: HashMap<&str, Color> = HashMap::new();
    let mut stack = Vec::new();

    for step_id in order {
      if color.get(step_id.as_str()).copied().unwrap_or(Color::White) == Color::White {
        if let Some(path) = dfs(step_id.as_str(), self, &mut color, &mut stack) {
          return Some(path);
        }
      }
    }

    None
  }
}
