//! Fixed project folder templates.
//!
//! Templates are built once when the resolver is constructed and shared as
//! `Arc<FolderTemplate>`; nothing mutates them afterwards.

use crate::error::RoutingError;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Root-level folder every template carries for files nobody could place.
pub const FALLBACK_FOLDER: &str = "Da Classificare";

pub const TEMPLATE_BREVE: &str = "BREVE";
pub const TEMPLATE_COMPLETO: &str = "COMPLETO";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FolderNode {
    pub label: String,
    pub children: Vec<FolderNode>,
}

impl FolderNode {
    fn leaf(label: &str) -> Self {
        Self {
            label: label.to_string(),
            children: Vec::new(),
        }
    }

    fn branch(label: &str, children: &[&str]) -> Self {
        Self {
            label: label.to_string(),
            children: children.iter().map(|c| FolderNode::leaf(c)).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FolderTemplate {
    pub id: String,
    pub label: String,
    pub folders: Vec<FolderNode>,
}

impl FolderTemplate {
    /// True when `path` walks existing folders starting at the root.
    pub fn contains(&self, path: &[String]) -> bool {
        if path.is_empty() {
            return false;
        }
        let mut level = &self.folders;
        for label in path {
            match level.iter().find(|n| &n.label == label) {
                Some(node) => level = &node.children,
                None => return false,
            }
        }
        true
    }

    /// Every folder path, depth-first, parents before children.
    pub fn folder_paths(&self) -> Vec<Vec<String>> {
        let mut out = Vec::new();
        collect(&self.folders, &mut Vec::new(), &mut out, false);
        out
    }

    pub fn leaf_paths(&self) -> Vec<Vec<String>> {
        let mut out = Vec::new();
        collect(&self.folders, &mut Vec::new(), &mut out, true);
        out
    }

    pub fn fallback_path(&self) -> Vec<String> {
        vec![FALLBACK_FOLDER.to_string()]
    }
}

fn collect(
    nodes: &[FolderNode],
    prefix: &mut Vec<String>,
    out: &mut Vec<Vec<String>>,
    leaves_only: bool,
) {
    for node in nodes {
        prefix.push(node.label.clone());
        if !leaves_only || node.children.is_empty() {
            out.push(prefix.clone());
        }
        collect(&node.children, prefix, out, leaves_only);
        prefix.pop();
    }
}

fn breve() -> FolderTemplate {
    FolderTemplate {
        id: TEMPLATE_BREVE.to_string(),
        label: "Progetto breve".to_string(),
        folders: vec![
            FolderNode::branch("Amministrativo", &["Fatture", "Preventivi"]),
            FolderNode::branch("Progettazione", &["Disegni", "Relazioni"]),
            FolderNode::leaf("Foto"),
            FolderNode::leaf("Corrispondenza"),
            FolderNode::leaf(FALLBACK_FOLDER),
        ],
    }
}

fn completo() -> FolderTemplate {
    FolderTemplate {
        id: TEMPLATE_COMPLETO.to_string(),
        label: "Progetto completo".to_string(),
        folders: vec![
            FolderNode::branch("Amministrativo", &["Fatture", "Preventivi", "Ordini"]),
            FolderNode::branch("Contabilita", &["Prima Nota", "Estratti Conto"]),
            FolderNode::branch("Contratti", &["Appalto", "Consulenze"]),
            FolderNode::branch("Progettazione", &["Disegni", "Relazioni", "Computi"]),
            FolderNode::branch("Cantiere", &["Verbali", "Sicurezza"]),
            FolderNode::leaf("Foto"),
            FolderNode::leaf("Permessi"),
            FolderNode::branch("Corrispondenza", &["Email", "Lettere"]),
            FolderNode::leaf(FALLBACK_FOLDER),
        ],
    }
}

/// Maps template ids to their trees. Cheap to clone.
#[derive(Debug, Clone)]
pub struct TemplateResolver {
    templates: Arc<BTreeMap<String, Arc<FolderTemplate>>>,
}

impl Default for TemplateResolver {
    fn default() -> Self {
        Self::builtin()
    }
}

impl TemplateResolver {
    pub fn builtin() -> Self {
        let templates = [breve(), completo()]
            .into_iter()
            .map(|t| {
                debug_assert!(t.contains(&t.fallback_path()));
                (t.id.clone(), Arc::new(t))
            })
            .collect();
        Self {
            templates: Arc::new(templates),
        }
    }

    pub fn resolve(&self, template_id: &str) -> Result<Arc<FolderTemplate>, RoutingError> {
        self.templates
            .get(template_id)
            .cloned()
            .ok_or_else(|| RoutingError::UnknownTemplate(template_id.to_string()))
    }

    pub fn ids(&self) -> Vec<String> {
        self.templates.keys().cloned().collect()
    }
}
