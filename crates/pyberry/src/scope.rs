//! Declaration and container-kind tracking.
//!
//! Berry requires `var` on the first assignment to a local, and method
//! names depend on the receiver's container type. The tracker answers both
//! questions during the single emission pass: which assignments declare,
//! and what kind of container a dotted path was last bound to.

use crate::ast::{Constant, Expr};
use crate::mappings::MappingTable;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Container type of a binding, as far as assignments reveal it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContainerKind {
    Sequence,
    Mapping,
    ByteBuffer,
    #[default]
    Unknown,
}

impl ContainerKind {
    /// Kind named by a Berry class (or a typing alias).
    pub fn from_class_name(name: &str) -> Self {
        match name {
            "list" | "List" => ContainerKind::Sequence,
            "map" | "Dict" => ContainerKind::Mapping,
            "bytes" => ContainerKind::ByteBuffer,
            _ => ContainerKind::Unknown,
        }
    }

    /// Berry class whose method table applies, if any.
    pub fn class_name(self) -> Option<&'static str> {
        match self {
            ContainerKind::Sequence => Some("list"),
            ContainerKind::Mapping => Some("map"),
            ContainerKind::ByteBuffer => Some("bytes"),
            ContainerKind::Unknown => None,
        }
    }
}

/// Whether an assignment must declare its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Binding {
    Declare,
    Assign,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    Module,
    Class,
    Function,
}

/// How bodies map to declaration frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScopeMode {
    /// One frame per module, class and function body.
    #[default]
    Lexical,
    /// A single table for the whole file.
    Flat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScopeEntry {
    pub declared: bool,
    pub kind: ContainerKind,
}

#[derive(Debug)]
struct Frame {
    kind: FrameKind,
    entries: HashMap<String, ScopeEntry>,
}

impl Frame {
    fn new(kind: FrameKind) -> Self {
        Self {
            kind,
            entries: HashMap::new(),
        }
    }
}

/// Per-run scope state. Never shared between translations.
#[derive(Debug)]
pub struct ScopeTracker {
    mode: ScopeMode,
    frames: Vec<Frame>,
    functions: HashSet<String>,
}

impl Default for ScopeTracker {
    fn default() -> Self {
        Self::new(ScopeMode::default())
    }
}

impl ScopeTracker {
    pub fn new(mode: ScopeMode) -> Self {
        Self {
            mode,
            frames: vec![Frame::new(FrameKind::Module)],
            functions: HashSet::new(),
        }
    }

    pub fn mode(&self) -> ScopeMode {
        self.mode
    }

    pub fn push(&mut self, kind: FrameKind) {
        if self.mode == ScopeMode::Lexical {
            self.frames.push(Frame::new(kind));
        }
    }

    pub fn pop(&mut self) {
        if self.mode == ScopeMode::Lexical && self.frames.len() > 1 {
            self.frames.pop();
        }
    }

    fn current(&mut self) -> &mut Frame {
        let last = self.frames.len() - 1;
        &mut self.frames[last]
    }

    /// Frame that owns `self.<field>` entries: the nearest class body.
    fn field_frame(&mut self) -> &mut Frame {
        let index = self
            .frames
            .iter()
            .rposition(|frame| frame.kind == FrameKind::Class)
            .unwrap_or(self.frames.len() - 1);
        &mut self.frames[index]
    }

    /// Record an assignment to `target` and report whether it declares.
    ///
    /// Only bare names can declare, and only once per frame. Attribute
    /// paths record their kind but always assign.
    pub fn declare_or_assign(&mut self, target: &Expr, kind: ContainerKind) -> Binding {
        match target {
            Expr::Name(id) => {
                let entry = self.current().entries.entry(id.clone()).or_default();
                entry.kind = kind;
                if entry.declared {
                    Binding::Assign
                } else {
                    entry.declared = true;
                    Binding::Declare
                }
            }
            Expr::Attribute { .. } => {
                if let Some(path) = target.dotted_path() {
                    self.record_kind(&path, kind);
                }
                Binding::Assign
            }
            _ => Binding::Assign,
        }
    }

    /// Mark a name declared without emitting anything, e.g. a parameter.
    pub fn declare(&mut self, name: &str, kind: ContainerKind) {
        self.current().entries.insert(
            name.to_string(),
            ScopeEntry {
                declared: true,
                kind,
            },
        );
    }

    /// Record the container kind of a dotted path.
    pub fn record_kind(&mut self, path: &str, kind: ContainerKind) {
        let frame = if path.starts_with("self.") {
            self.field_frame()
        } else {
            self.current()
        };
        frame.entries.entry(path.to_string()).or_default().kind = kind;
    }

    /// Last recorded kind of `path`, searching outward from the current frame.
    pub fn lookup_kind(&self, path: &str) -> ContainerKind {
        self.lookup(path).map_or(ContainerKind::Unknown, |entry| entry.kind)
    }

    pub fn lookup(&self, path: &str) -> Option<ScopeEntry> {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.entries.get(path).copied())
    }

    pub fn is_declared_here(&self, name: &str) -> bool {
        self.frames
            .last()
            .and_then(|frame| frame.entries.get(name))
            .is_some_and(|entry| entry.declared)
    }

    pub fn define_function(&mut self, name: &str) {
        self.functions.insert(name.to_string());
    }

    pub fn is_known_function(&self, name: &str) -> bool {
        self.functions.contains(name)
    }
}

/// Container kind produced by evaluating `expr`, if it is evident.
pub fn infer_container_kind(expr: &Expr, table: &MappingTable) -> ContainerKind {
    match expr {
        Expr::List(_) => ContainerKind::Sequence,
        Expr::Dict(_) => ContainerKind::Mapping,
        Expr::Constant(Constant::Bytes(_)) => ContainerKind::ByteBuffer,
        Expr::Call { func, .. } => match func.as_ref() {
            Expr::Name(name) if table.is_container_class(name) => {
                ContainerKind::from_class_name(table.resolve_class_name(name))
            }
            _ => ContainerKind::Unknown,
        },
        _ => ContainerKind::Unknown,
    }
}

/// Container kind named by a type annotation such as `list` or `dict[str, int]`.
pub fn annotation_kind(annotation: &Expr, table: &MappingTable) -> ContainerKind {
    match annotation {
        Expr::Name(name) => ContainerKind::from_class_name(table.resolve_class_name(name)),
        Expr::Subscript { value, .. } => annotation_kind(value, table),
        Expr::Attribute { attr, .. } => ContainerKind::from_class_name(attr),
        _ => ContainerKind::Unknown,
    }
}
