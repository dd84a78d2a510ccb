use crate::models::cluster::Usage;
use crate::quantity::{parse_cpu, parse_memory};

/// Header, one data row, trailing empty line.
const EXPECTED_LINES: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopKind {
    Pod,
    Node,
}

impl TopKind {
    pub fn as_arg(&self) -> &'static str {
        match self {
            Self::Pod => "pod",
            Self::Node => "node",
        }
    }

    /// (cpu, memory) column positions for an accepted row width.
    ///
    /// pod:  `NAME CPU(cores) MEMORY(bytes)`
    /// node: `NAME CPU(cores) CPU% MEMORY(bytes) MEMORY%`
    fn columns(&self, tokens: usize) -> Option<(usize, usize)> {
        match (self, tokens) {
            (Self::Pod, 3 | 5) => Some((1, 2)),
            (Self::Node, 3) => Some((1, 2)),
            (Self::Node, 5) => Some((1, 3)),
            _ => None,
        }
    }
}

/// Parse `kubectl top <kind> <name>` output. Any deviation from the expected
/// shape gives `None` rather than a guess.
pub fn parse_top(text: &str, kind: TopKind) -> Option<Usage> {
    let lines: Vec<&str> = text.split('\n').collect();
    if lines.len() != EXPECTED_LINES {
        return None;
    }

    let tokens: Vec<&str> = lines[1].split_whitespace().collect();
    let (cpu_col, mem_col) = kind.columns(tokens.len())?;

    let cpu = parse_cpu(tokens[cpu_col])?;
    let memory = parse_memory(tokens[mem_col])?;
    Some(Usage {
        cpu: Some(cpu),
        memory: Some(memory),
    })
}
