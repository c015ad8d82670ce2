use serde::{Serialize, Serializer};

/// The kind of node stored in the graph.
///
/// Program languages use the first seven kinds; the HCL dialect contributes
/// one kind per block type. The storage layer persists the `as_str` form, so
/// these strings are part of the on-disk contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeKind {
    File,
    Function,
    Method,
    Class,
    Interface,
    Type,
    ArrowFunction,
    // HCL block kinds.
    Resource,
    Data,
    Variable,
    Module,
    Output,
    Locals,
    Terraform,
    Provider,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::File => "file",
            NodeKind::Function => "function",
            NodeKind::Method => "method",
            NodeKind::Class => "class",
            NodeKind::Interface => "interface",
            NodeKind::Type => "type",
            NodeKind::ArrowFunction => "arrow function",
            NodeKind::Resource => "resource",
            NodeKind::Data => "data",
            NodeKind::Variable => "variable",
            NodeKind::Module => "module",
            NodeKind::Output => "output",
            NodeKind::Locals => "locals",
            NodeKind::Terraform => "terraform",
            NodeKind::Provider => "provider",
        }
    }

    pub fn from_str(s: &str) -> Option<NodeKind> {
        Some(match s {
            "file" => NodeKind::File,
            "function" => NodeKind::Function,
            "method" => NodeKind::Method,
            "class" => NodeKind::Class,
            "interface" => NodeKind::Interface,
            "type" => NodeKind::Type,
            "arrow function" => NodeKind::ArrowFunction,
            "resource" => NodeKind::Resource,
            "data" => NodeKind::Data,
            "variable" => NodeKind::Variable,
            "module" => NodeKind::Module,
            "output" => NodeKind::Output,
            "locals" => NodeKind::Locals,
            "terraform" => NodeKind::Terraform,
            "provider" => NodeKind::Provider,
            _ => return None,
        })
    }

    /// Map an HCL block type to its node kind. Unknown block types (nested
    /// `lifecycle`, `ingress`, …) are not materialized as nodes.
    pub fn from_hcl_block(block_type: &str) -> Option<NodeKind> {
        Some(match block_type {
            "resource" => NodeKind::Resource,
            "data" => NodeKind::Data,
            "variable" => NodeKind::Variable,
            "module" => NodeKind::Module,
            "output" => NodeKind::Output,
            "locals" => NodeKind::Locals,
            "terraform" => NodeKind::Terraform,
            "provider" => NodeKind::Provider,
            _ => return None,
        })
    }

    /// Kinds the call resolver searches when ranking call targets.
    pub fn is_call_target(&self) -> bool {
        matches!(
            self,
            NodeKind::Function | NodeKind::Method | NodeKind::Class | NodeKind::Interface
        )
    }
}

impl Serialize for NodeKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// The kind of directed edge between two nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeKind {
    /// File -> file: the source file imports from the target file.
    Imports,
    /// File -> file: a type-only import (`import type { X }`).
    ImportsType,
    /// File -> file: an `export ... from` statement.
    Reexports,
    /// Caller node -> callee node, confidence-scored.
    Calls,
    /// Class -> superclass.
    Extends,
    /// Class -> interface (or class, for interface-typed heritage).
    Implements,
}

impl EdgeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeKind::Imports => "imports",
            EdgeKind::ImportsType => "imports-type",
            EdgeKind::Reexports => "reexports",
            EdgeKind::Calls => "calls",
            EdgeKind::Extends => "extends",
            EdgeKind::Implements => "implements",
        }
    }

    pub fn from_str(s: &str) -> Option<EdgeKind> {
        Some(match s {
            "imports" => EdgeKind::Imports,
            "imports-type" => EdgeKind::ImportsType,
            "reexports" => EdgeKind::Reexports,
            "calls" => EdgeKind::Calls,
            "extends" => EdgeKind::Extends,
            "implements" => EdgeKind::Implements,
            _ => return None,
        })
    }
}

impl Serialize for EdgeKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// A node row as persisted in storage.
///
/// File nodes use `line = 0` and `end_line = None`; all other nodes carry the
/// 1-indexed span of their definition.
#[derive(Debug, Clone, Serialize)]
pub struct NodeRow {
    pub id: i64,
    pub name: String,
    pub kind: NodeKind,
    pub file: String,
    pub line: u32,
    pub end_line: Option<u32>,
}

/// An edge row as persisted in storage.
#[derive(Debug, Clone, Serialize)]
pub struct EdgeRow {
    pub id: i64,
    pub source_id: i64,
    pub target_id: i64,
    pub kind: EdgeKind,
    pub confidence: f64,
    pub dynamic: bool,
}
