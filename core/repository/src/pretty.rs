use std::fmt::Write;

use rustc_hash::FxHashSet;
use tdl_nodes::{ChildLabel, NodeId};

use crate::repository::NodeRepository;

const LINE_WIDTH: usize = 78;

impl NodeRepository {
    /// Indented dump of the subtree under `id`, one node per line.
    ///
    /// Each line holds the child label, `name(class)` and the start of the
    /// init record. Step-children are labelled `(n)`. A node already on the
    /// current path is printed without descending again.
    #[must_use]
    pub fn print_tree(&self, id: NodeId) -> String {
        let mut out = String::new();
        let mut path = FxHashSet::default();
        self.print_node(&mut out, Some(id), "", 0, &mut path);
        out
    }

    fn print_node(
        &self,
        out: &mut String,
        id: Option<NodeId>,
        label: &str,
        offset: usize,
        path: &mut FxHashSet<NodeId>,
    ) {
        let mut header = " ".repeat(offset);
        if !label.is_empty() {
            header.push_str(label);
            header.push_str(": ");
        }
        let Some((id, slot)) = id.and_then(|id| self.get(id).map(|slot| (id, slot))) else {
            header.push_str("None");
            let _ = writeln!(out, "{header}");
            return;
        };
        let _ = write!(
            header,
            "{}({})",
            slot.name,
            slot.classname.as_deref().unwrap_or("None")
        );
        let record = slot
            .init_record
            .as_ref()
            .map_or_else(|| "None".to_string(), ToString::to_string);
        let room = LINE_WIDTH.saturating_sub(header.chars().count());
        let record = if room > 0 {
            record.chars().take(room).collect::<String>()
        } else {
            record
        };
        let _ = writeln!(out, "{header}: {record}");
        if !path.insert(id) {
            return;
        }
        for (label, child) in &slot.children {
            self.print_node(out, child.as_stub(), &label.to_string(), offset + 2, path);
        }
        for (label, child) in &slot.stepchildren {
            let label = match label {
                ChildLabel::Index(index) => format!("({index})"),
                ChildLabel::Key(key) => format!("({key})"),
            };
            self.print_node(out, child.as_stub(), &label, offset + 2, path);
        }
        path.remove(&id);
    }
}
