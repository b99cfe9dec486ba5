//! Plain-language summary of a model diff
//!
//! The first line tallies whole entities removed or added and attribute
//! changes per kind. Detail lines follow, one per removed or added entity and
//! one per changed term.

use std::collections::BTreeMap;

use super::result::{AnnotatedKey, Changes, KindDiff, ModelDiff};
use crate::model::{EntityId, Model, PropKey, TermKey, Triplet};

#[derive(Clone, Copy, PartialEq, Eq)]
enum Action {
    Removed,
    Added,
}

impl Action {
    fn as_str(self) -> &'static str {
        match self {
            Self::Removed => "removed",
            Self::Added => "added",
        }
    }

    fn title(self) -> &'static str {
        match self {
            Self::Removed => "Removed",
            Self::Added => "Added",
        }
    }
}

/// Entity keys that can be described in a summary line
trait SummaryKey: Ord {
    /// Singular kind label used in tallies
    const LABEL: &'static str;

    fn detail(&self) -> String;

    /// The keyed entity in `model`, when it can carry annotations
    fn entity(&self, model: &Model) -> Option<EntityId>;

    fn as_term(&self) -> Option<&TermKey> {
        None
    }
}

impl SummaryKey for String {
    const LABEL: &'static str = "node";

    fn detail(&self) -> String {
        format!("'{}'", self)
    }

    fn entity(&self, model: &Model) -> Option<EntityId> {
        model.node_id(self).map(EntityId::Node)
    }
}

impl SummaryKey for Triplet {
    const LABEL: &'static str = "edge";

    fn detail(&self) -> String {
        format!("'{}' with src: '{}' and dst: '{}'", self.handle, self.src, self.dst)
    }

    fn entity(&self, model: &Model) -> Option<EntityId> {
        model.edge_id(self).map(EntityId::Edge)
    }
}

impl SummaryKey for PropKey {
    const LABEL: &'static str = "prop";

    fn detail(&self) -> String {
        format!("'{}' with parent: '{}'", self.handle, self.owner.handle())
    }

    fn entity(&self, model: &Model) -> Option<EntityId> {
        model.prop_id(self).map(EntityId::Property)
    }
}

impl SummaryKey for TermKey {
    const LABEL: &'static str = "term";

    fn detail(&self) -> String {
        format!("'{}' with origin: '{}'", self.name, self.origin)
    }

    fn entity(&self, _model: &Model) -> Option<EntityId> {
        None
    }

    fn as_term(&self) -> Option<&TermKey> {
        Some(self)
    }
}

fn annotated_detail(key: &AnnotatedKey) -> (&'static str, String) {
    match key {
        AnnotatedKey::Node(k) => (String::LABEL, k.detail()),
        AnnotatedKey::Edge(k) => (Triplet::LABEL, k.detail()),
        AnnotatedKey::Prop(k) => (PropKey::LABEL, k.detail()),
        AnnotatedKey::Term(k) => (TermKey::LABEL, k.detail()),
    }
}

struct Summarizer<'d, 'a> {
    diff: &'d ModelDiff<'a>,
    old: &'a Model,
    new: &'a Model,
    tallies: Vec<String>,
    changed: Vec<String>,
    details: Vec<String>,
}

pub(crate) fn summarize(diff: &ModelDiff<'_>, old: &Model, new: &Model) -> Option<String> {
    if diff.is_empty() {
        return None;
    }
    let mut s = Summarizer {
        diff,
        old,
        new,
        tallies: Vec::new(),
        changed: Vec::new(),
        details: Vec::new(),
    };
    s.kind(diff.nodes.as_ref());
    s.kind(diff.edges.as_ref());
    s.kind(diff.props.as_ref());
    s.kind(diff.terms.as_ref());
    s.changed_terms();

    let mut overall = s.tallies;
    overall.extend(s.changed);
    Some(format!("{}\n{}", overall.join("; "), s.details.join("\n")))
}

impl<'d, 'a> Summarizer<'d, 'a> {
    fn kind<K: SummaryKey>(&mut self, kind: Option<&KindDiff<'_, K>>) {
        let Some(kind) = kind else { return };
        for (action, items) in [(Action::Removed, &kind.removed), (Action::Added, &kind.added)] {
            let Some(items) = items else { continue };
            self.tallies
                .push(format!("{} {}(s) {}", items.len(), K::LABEL, action.as_str()));
            for key in items.keys() {
                let mut line = format!("- {} {}: {}", action.title(), K::LABEL, key.detail());
                line.push_str(&self.annotation_note(key, action));
                self.details.push(line);
            }
        }
        if let Some(changed) = &kind.changed {
            let attrs: usize = changed.values().map(BTreeMap::len).sum();
            if !changed.is_empty() && attrs > 0 {
                self.changed
                    .push(format!("{} attribute(s) changed for {} {}(s)", attrs, changed.len(), K::LABEL));
            }
        }
    }

    /// What a removed or added entity is annotated by, or for a term, what
    /// it annotates
    fn annotation_note<K: SummaryKey>(&self, key: &K, action: Action) -> String {
        let model = match action {
            Action::Removed => self.old,
            Action::Added => self.new,
        };
        if let Some(entity) = key.entity(model) {
            let terms = model.annotations(entity);
            if terms.is_empty() {
                return String::new();
            }
            let annotations: Vec<String> = terms
                .into_iter()
                .map(|id| {
                    let term = model.term(id);
                    format!(
                        "'{}' with origin '{}'",
                        term.value,
                        term.origin_name.as_deref().unwrap_or_default()
                    )
                })
                .collect();
            let label = model.entity_ref(entity).kind().label();
            return format!(". {} annotated by: {}", capitalize(label), annotations.join(", "));
        }
        self.annotates(key, action, "")
    }

    /// " which annotates <kind>: <detail>" when the term key appears on the
    /// given side of a recorded annotation change
    fn annotates<K: SummaryKey>(&self, key: &K, action: Action, suffix: &str) -> String {
        let Some(term) = key.as_term() else {
            return String::new();
        };
        for (entity, change) in self.diff.annotations() {
            let side = match action {
                Action::Removed => &change.removed,
                Action::Added => &change.added,
            };
            if side.contains(term) {
                let (label, detail) = annotated_detail(entity);
                return format!(" which annotates {}: {}{}", label, detail, suffix);
            }
        }
        String::new()
    }

    fn changed_terms(&mut self) {
        let Some(changed) = self.diff.terms.as_ref().and_then(|t| t.changed.as_ref()) else {
            return;
        };
        for (key, changes) in changed {
            let mut line = format!("- Changed {}: {}", TermKey::LABEL, key.detail());
            line.push_str(&self.annotates(key, Action::Added, &change_detail(changes)));
            self.details.push(line);
        }
    }
}

fn change_detail(changes: &Changes<'_>) -> String {
    changes
        .iter()
        .map(|(attr, change)| {
            let side = |v: &Option<super::DiffValue<'_>>| {
                v.as_ref().map_or_else(|| "None".to_string(), |v| v.to_string())
            };
            format!(
                ". Attribute: '{}' updated from '{}' to '{}'",
                attr,
                side(&change.removed),
                side(&change.added)
            )
        })
        .collect()
}

fn capitalize(label: &str) -> String {
    let mut chars = label.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use crate::diff::{diff_models, DiffOptions};
    use crate::loader::MdfSource;
    use crate::mdf::{MdfReader, ReaderOptions};
    use crate::model::Model;

    fn build(yaml: &str) -> Model {
        let mut reader = MdfReader::new(ReaderOptions::default());
        reader.load(&[MdfSource::text("test.yml", yaml)]).unwrap();
        reader.create_model().unwrap();
        reader.into_model().unwrap()
    }

    const OLD: &str = "\
Handle: test
Nodes:
  case:
    Props: [case_id]
Relationships: {}
PropDefinitions:
  case_id:
    Type: string
";

    fn summary(old: &str, new: &str) -> String {
        let a = build(old);
        let b = build(new);
        let options = DiffOptions {
            include_summary: true,
            ..Default::default()
        };
        diff_models(&a, &b, &options).unwrap().summary.unwrap()
    }

    #[test]
    fn test_added_node_with_annotation() {
        let new = OLD.replace(
            "Relationships",
            "  study:\n    Term:\n      - Value: Study\n        Origin: NCIt\nRelationships",
        );
        let text = summary(OLD, &new);
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("1 node(s) added; 1 term(s) added"));
        assert_eq!(
            lines.next(),
            Some("- Added node: 'study'. Node annotated by: 'Study' with origin 'NCIt'")
        );
        assert_eq!(lines.next(), Some("- Added term: 'study' with origin: 'NCIt'"));
    }

    #[test]
    fn test_term_annotating_common_node() {
        let new = OLD.replace(
            "    Props: [case_id]\n",
            "    Props: [case_id]\n    Term:\n      - Value: Case\n        Origin: caDSR\n",
        );
        let text = summary(OLD, &new);
        assert!(text.starts_with("1 term(s) added; 1 attribute(s) changed for 1 node(s)\n"));
        assert!(text.contains("- Added term: 'case' with origin: 'caDSR' which annotates node: 'case'"));
    }

    #[test]
    fn test_removed_prop_detail() {
        let new = OLD.replace("    Props: [case_id]\n", "    Props: []\n");
        let text = summary(OLD, &new);
        assert!(text.contains("1 prop(s) removed"));
        assert!(text.contains("- Removed prop: 'case_id' with parent: 'case'"));
    }
}
