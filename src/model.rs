#[derive(Debug, Clone, PartialEq, Default)]
pub struct Item {
    pub title: String,
    pub url: String,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Feed {
    pub title: String,
    pub items: Vec<Item>,
}

impl Feed {
    /// Restore newest-first order; items sharing a timestamp keep document order.
    pub fn sort_newest_first(&mut self) {
        self.items.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
    }
}
