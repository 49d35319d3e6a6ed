//! One table panel per resource kind.

use lxdview_core::{ResourceCollection, ResourceKind, ResourceRow};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Paragraph, Row, Table},
};

use super::PanelState;

/// Table of the latest published collection with a cursor.
pub struct ResourcePanel<T> {
    collection: ResourceCollection<T>,
    /// Whether any collection has been received yet.
    loaded: bool,
    selected: usize,
}

impl<T: ResourceRow> ResourcePanel<T> {
    pub fn new() -> Self {
        Self {
            collection: ResourceCollection::default(),
            loaded: false,
            selected: 0,
        }
    }

    pub fn kind(&self) -> ResourceKind {
        T::KIND
    }

    /// Replace the shown collection, keeping the cursor in range.
    pub fn update(&mut self, collection: ResourceCollection<T>) {
        self.collection = collection;
        self.loaded = true;
        self.selected = self.selected.min(self.collection.len().saturating_sub(1));
    }

    pub fn items(&self) -> &[T] {
        &self.collection.items
    }

    pub fn is_stale(&self) -> bool {
        self.collection.stale
    }

    pub fn selected(&self) -> usize {
        self.selected
    }

    pub fn title(&self) -> String {
        let stale = if self.collection.stale { " [stale]" } else { "" };
        format!(" {} ({}){stale} ", T::KIND.title(), self.collection.len())
    }

    pub fn render(&self, frame: &mut Frame, area: Rect) {
        let border_style = if self.collection.stale {
            Style::default().fg(Color::Yellow)
        } else {
            Style::default()
        };
        let block = Block::default()
            .title(self.title())
            .borders(Borders::ALL)
            .border_style(border_style);

        if self.collection.is_empty() {
            let text = if self.loaded {
                format!("  (no {})", T::KIND.title().to_lowercase())
            } else {
                "  (loading...)".to_string()
            };
            let empty = Paragraph::new(text)
                .style(Style::default().fg(Color::DarkGray))
                .block(block);
            frame.render_widget(empty, area);
            return;
        }

        // Header row plus borders.
        let visible_height = area.height.saturating_sub(3) as usize;
        let skip = (self.selected + 1).saturating_sub(visible_height);

        let rows: Vec<Row> = self
            .collection
            .items
            .iter()
            .enumerate()
            .skip(skip)
            .take(visible_height)
            .map(|(i, item)| {
                let row = Row::new(item.cells());
                if i == self.selected {
                    row.style(Style::default().add_modifier(Modifier::REVERSED))
                } else {
                    row
                }
            })
            .collect();

        let widths: Vec<Constraint> = T::HEADERS.iter().map(|_| Constraint::Fill(1)).collect();
        let table = Table::new(rows, widths)
            .header(
                Row::new(T::HEADERS.iter().copied())
                    .style(Style::default().add_modifier(Modifier::BOLD)),
            )
            .block(block);
        frame.render_widget(table, area);
    }
}

impl<T: ResourceRow> Default for ResourcePanel<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: ResourceRow> PanelState for ResourcePanel<T> {
    fn scroll_down(&mut self, n: usize) {
        let last = self.collection.len().saturating_sub(1);
        self.selected = (self.selected + n).min(last);
    }

    fn scroll_up(&mut self, n: usize) {
        self.selected = self.selected.saturating_sub(n);
    }

    fn scroll_to_top(&mut self) {
        self.selected = 0;
    }

    fn scroll_to_bottom(&mut self) {
        self.selected = self.collection.len().saturating_sub(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lxdview_core::{Image, Instance, Network, StoragePool};
    use pretty_assertions::assert_eq;
    use ratatui::backend::TestBackend;

    fn instances(names: &[&str]) -> ResourceCollection<Instance> {
        ResourceCollection::fresh(
            names
                .iter()
                .map(|n| Instance {
                    name: n.to_string(),
                    status: "Running".to_string(),
                })
                .collect(),
        )
    }

    #[test]
    fn test_title_shows_count_and_stale_marker() {
        let mut panel = ResourcePanel::<Instance>::new();
        assert_eq!(panel.title(), " Instances (0) ");

        let mut collection = instances(&["web", "db"]);
        panel.update(collection.clone());
        assert_eq!(panel.title(), " Instances (2) ");

        collection.stale = true;
        panel.update(collection);
        assert!(panel.is_stale());
        assert_eq!(panel.title(), " Instances (2) [stale] ");
    }

    #[test]
    fn test_cursor_clamped_when_collection_shrinks() {
        let mut panel = ResourcePanel::<Instance>::new();
        panel.update(instances(&["a", "b", "c", "d"]));
        panel.scroll_to_bottom();
        assert_eq!(panel.selected(), 3);

        panel.update(instances(&["a"]));
        assert_eq!(panel.selected(), 0);
    }

    #[test]
    fn test_scroll_stays_in_range() {
        let mut panel = ResourcePanel::<StoragePool>::new();
        panel.scroll_down(5);
        assert_eq!(panel.selected(), 0);

        panel.update(ResourceCollection::fresh(vec![
            StoragePool { name: "default".to_string() },
            StoragePool { name: "fast".to_string() },
        ]));
        panel.scroll_down(10);
        assert_eq!(panel.selected(), 1);
        panel.scroll_up(10);
        assert_eq!(panel.selected(), 0);
    }

    #[test]
    fn test_kind_follows_row_type() {
        assert_eq!(ResourcePanel::<Image>::new().kind(), ResourceKind::Images);
        assert_eq!(ResourcePanel::<Network>::new().kind(), ResourceKind::Networks);
        assert_eq!(
            ResourcePanel::<StoragePool>::new().title(),
            " Storage Pools (0) "
        );
    }

    #[test]
    fn test_render_lists_rows() {
        let mut panel = ResourcePanel::<Instance>::new();
        panel.update(instances(&["web"]));

        let mut terminal = Terminal::new(TestBackend::new(40, 6)).unwrap();
        terminal.draw(|frame| panel.render(frame, frame.area())).unwrap();

        let buffer = terminal.backend().buffer();
        let text: String = buffer.content().iter().map(|c| c.symbol()).collect();
        assert!(text.contains("Instances (1)"));
        assert!(text.contains("NAME"));
        assert!(text.contains("web"));
        assert!(text.contains("Running"));
    }
}
