//! Overlay annotations showing recognized equations.

use kurbo::Point;
use serde::{Deserialize, Serialize};

/// Unique identifier for an annotation. Never reused within a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnnotationId(pub u64);

impl std::fmt::Display for AnnotationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A positioned, draggable rendering of one recognition result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    id: AnnotationId,
    /// Delimited math source, e.g. `\(x + 2 = 7\)`.
    content: String,
    /// Top-left corner in canvas-local CSS pixels.
    position: Point,
}

impl Annotation {
    pub fn id(&self) -> AnnotationId {
        self.id
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn position(&self) -> Point {
        self.position
    }
}

/// Format an expression/result pair as an inline math string.
pub fn format_equation(expr: &str, result: &str) -> String {
    format!("\\({} = {}\\)", expr, result)
}

/// Ordered collection of annotations; render order is insertion order.
#[derive(Debug, Clone, Default)]
pub struct AnnotationStore {
    items: Vec<Annotation>,
    next_id: u64,
}

impl AnnotationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a new annotation and return a copy of it.
    pub fn add(&mut self, content: impl Into<String>, position: Point) -> Annotation {
        self.next_id += 1;
        let annotation = Annotation {
            id: AnnotationId(self.next_id),
            content: content.into(),
            position,
        };
        self.items.push(annotation.clone());
        annotation
    }

    /// Move an annotation. Returns false when `id` is unknown.
    pub fn update_position(&mut self, id: AnnotationId, position: Point) -> bool {
        match self.items.iter_mut().find(|a| a.id == id) {
            Some(annotation) => {
                annotation.position = position;
                true
            }
            None => false,
        }
    }

    /// Look up an annotation by id.
    pub fn get(&self, id: AnnotationId) -> Option<&Annotation> {
        self.items.iter().find(|a| a.id == id)
    }

    /// Remove every annotation. Ids keep counting up.
    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Current annotations in render order.
    pub fn all(&self) -> &[Annotation] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
