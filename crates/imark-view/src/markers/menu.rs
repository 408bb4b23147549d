use std::collections::HashSet;

use imark_protocol::MenuEntry;
use tracing::warn;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MenuItem {
    pub id: u32,
    pub title: String,
    pub children: Vec<MenuItem>,
}

impl MenuItem {
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    fn find(&self, id: u32) -> Option<&MenuItem> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|child| child.find(id))
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MenuSelection {
    pub entry_id: u32,
    pub control_name: String,
}

/// Context menu of one interactive marker.
#[derive(Clone, Debug)]
pub struct Menu {
    roots: Vec<MenuItem>,
    open_for: Option<String>,
}

impl Menu {
    /// Builds the entry tree; `None` when the marker has no entries.
    pub fn from_entries(entries: &[MenuEntry]) -> Option<Self> {
        if entries.is_empty() {
            return None;
        }
        let known: HashSet<u32> = entries.iter().map(|entry| entry.id).collect();
        for orphan in entries
            .iter()
            .filter(|entry| entry.parent_id != 0 && !known.contains(&entry.parent_id))
        {
            warn!(
                id = orphan.id,
                parent_id = orphan.parent_id,
                "menu entry refers to a missing parent"
            );
        }
        let mut visited = HashSet::new();
        let roots = build_level(entries, 0, &mut visited);
        Some(Self {
            roots,
            open_for: None,
        })
    }

    pub fn roots(&self) -> &[MenuItem] {
        &self.roots
    }

    pub fn find(&self, id: u32) -> Option<&MenuItem> {
        self.roots.iter().find_map(|item| item.find(id))
    }

    pub fn show(&mut self, control_name: &str) {
        self.open_for = Some(control_name.to_string());
    }

    pub fn hide(&mut self) {
        self.open_for = None;
    }

    /// Control the menu was opened from, while it is open.
    pub fn open_for(&self) -> Option<&str> {
        self.open_for.as_deref()
    }

    /// Picks a leaf entry of the open menu and closes it. Entries with
    /// children only expand, and nothing happens while the menu is closed.
    pub fn select(&mut self, entry_id: u32) -> Option<MenuSelection> {
        self.open_for.as_ref()?;
        if !self.find(entry_id)?.is_leaf() {
            return None;
        }
        let control_name = self.open_for.take()?;
        Some(MenuSelection {
            entry_id,
            control_name,
        })
    }
}

fn build_level(entries: &[MenuEntry], parent: u32, visited: &mut HashSet<u32>) -> Vec<MenuItem> {
    let mut items = Vec::new();
    for entry in entries.iter().filter(|entry| entry.parent_id == parent) {
        if !visited.insert(entry.id) {
            continue;
        }
        items.push(MenuItem {
            id: entry.id,
            title: entry.title.clone(),
            children: build_level(entries, entry.id, visited),
        });
    }
    items
}
